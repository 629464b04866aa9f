//! Problem catalog boundary.
//!
//! Catalog storage is an external concern; the server only needs lookup.
//! The seeded in-memory catalog ships a small fixed problem set so the
//! server runs standalone.

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::Result;

/// One test case: named input parameters and the expected output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub input: Value,
    pub output: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub id: String,
    pub title: String,
    pub difficulty: String,
    pub description: String,
    #[serde(rename = "test_cases")]
    pub test_cases: Vec<TestCase>,
}

/// Compact listing entry for the problem index route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemSummary {
    pub id: String,
    pub title: String,
    pub difficulty: String,
}

#[async_trait]
pub trait ProblemCatalog: Send + Sync {
    async fn list(&self) -> Result<Vec<ProblemSummary>>;
    async fn find_by_title(&self, title: &str) -> Result<Option<Problem>>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Problem>>;
}

/// In-memory catalog seeded with the stock problem set
pub struct SeededCatalog {
    problems: Vec<Problem>,
}

impl SeededCatalog {
    pub fn new() -> Self {
        Self {
            problems: seed_problems(),
        }
    }
}

impl Default for SeededCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProblemCatalog for SeededCatalog {
    async fn list(&self) -> Result<Vec<ProblemSummary>> {
        Ok(self
            .problems
            .iter()
            .map(|p| ProblemSummary {
                id: p.id.clone(),
                title: p.title.clone(),
                difficulty: p.difficulty.clone(),
            })
            .collect())
    }

    async fn find_by_title(&self, title: &str) -> Result<Option<Problem>> {
        Ok(self.problems.iter().find(|p| p.title == title).cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Problem>> {
        Ok(self.problems.iter().find(|p| p.id == id).cloned())
    }
}

fn problem_id() -> String {
    let mut rng = rand::thread_rng();
    (0..24)
        .map(|_| format!("{:x}", rng.gen_range(0..16)))
        .collect()
}

fn seed_problems() -> Vec<Problem> {
    let raw = [
        (
            "Two Sum",
            "Easy",
            "Given an array of integers nums and an integer target, return indices of the two numbers such that they add up to target.",
            json!([
                {"input": {"nums": [2, 7, 11, 15], "target": 9}, "output": [0, 1]},
                {"input": {"nums": [3, 2, 4], "target": 6}, "output": [1, 2]}
            ]),
        ),
        (
            "Reverse String",
            "Easy",
            "Write a function that reverses a string. The input string is given as an array of characters s.",
            json!([
                {"input": {"s": ["h", "e", "l", "l", "o"]}, "output": ["o", "l", "l", "e", "h"]},
                {"input": {"s": ["H", "a", "n", "n", "a", "h"]}, "output": ["h", "a", "n", "n", "a", "H"]}
            ]),
        ),
        (
            "Valid Parentheses",
            "Easy",
            "Given a string s containing just the characters '(', ')', '{', '}', '[' and ']', determine if the input string is valid.",
            json!([
                {"input": {"s": "()"}, "output": true},
                {"input": {"s": "([)]"}, "output": false}
            ]),
        ),
        (
            "Climbing Stairs",
            "Easy",
            "You are climbing a staircase. It takes n steps to reach the top. Each time you can climb 1 or 2 steps.",
            json!([
                {"input": {"n": 2}, "output": 2},
                {"input": {"n": 3}, "output": 3}
            ]),
        ),
        (
            "Maximum Subarray",
            "Medium",
            "Given an integer array nums, find the contiguous subarray with the largest sum.",
            json!([
                {"input": {"nums": [-2, 1, -3, 4, -1, 2, 1, -5, 4]}, "output": 6},
                {"input": {"nums": [1]}, "output": 1}
            ]),
        ),
        (
            "Longest Substring Without Repeating Characters",
            "Medium",
            "Given a string s, find the length of the longest substring without repeating characters.",
            json!([
                {"input": {"s": "abcabcbb"}, "output": 3},
                {"input": {"s": "bbbbb"}, "output": 1}
            ]),
        ),
    ];

    raw.into_iter()
        .map(|(title, difficulty, description, cases)| Problem {
            id: problem_id(),
            title: title.to_string(),
            difficulty: difficulty.to_string(),
            description: description.to_string(),
            test_cases: serde_json::from_value(cases).expect("seed test cases are well-formed"),
        })
        .collect()
}
