use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::process::Command;
use tokio::time::timeout;

use crate::config::EvaluatorConfig;
use crate::error::{DuelError, Result};
use crate::problems::{Problem, TestCase};

/// How many test cases a plain (non-submit) run exercises
const PREVIEW_CASE_COUNT: usize = 3;

/// A code execution request from a client
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionRequest {
    pub code: String,
    pub problem_title: String,
    pub user_id: String,
    #[serde(default)]
    pub room_code: Option<String>,
    #[serde(default)]
    pub is_submit: bool,
}

/// Structured outcome of a run. Timeout, runtime and parse failures are
/// data, not crashes, so the client can render "error" differently from
/// "wrong answer" — and none of them ever count as a pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Verdict {
    Pass {
        #[serde(rename = "allPassed")]
        all_passed: bool,
        #[serde(rename = "passedCount")]
        passed_count: usize,
        #[serde(rename = "totalCount")]
        total_count: usize,
    },
    Fail {
        #[serde(rename = "allPassed")]
        all_passed: bool,
        #[serde(rename = "failedAtIndex")]
        failed_at: usize,
        #[serde(rename = "totalCount")]
        total_count: usize,
        #[serde(rename = "passedCountBeforeFailure")]
        passed_before: usize,
        input: Value,
        #[serde(rename = "expectedOutput")]
        expected: Value,
        #[serde(rename = "actualOutput", skip_serializing_if = "Option::is_none")]
        actual: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Error {
        message: String,
    },
}

impl Verdict {
    pub fn all_passed(&self) -> bool {
        matches!(self, Verdict::Pass { .. })
    }

    fn pass(passed: usize, total: usize) -> Self {
        Verdict::Pass {
            all_passed: true,
            passed_count: passed,
            total_count: total,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Verdict::Error {
            message: message.into(),
        }
    }
}

/// Raw JSON printed by the runner script inside the sandbox
#[derive(Debug, Deserialize)]
struct RunnerOutput {
    passed: bool,
    #[serde(default)]
    passed_tests: usize,
    #[serde(default)]
    total_tests: usize,
    #[serde(default)]
    failed_at: Option<usize>,
    #[serde(default)]
    input: Option<Value>,
    #[serde(default)]
    expected: Option<Value>,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Executes submitted code against a problem's test cases inside the
/// sandbox container, under a hard wall-clock timeout.
pub struct CodeEvaluator {
    config: EvaluatorConfig,
}

impl CodeEvaluator {
    pub fn new(config: EvaluatorConfig) -> Self {
        Self { config }
    }

    /// Check that the sandbox container is up. Called once at startup so
    /// a missing container is loud, not a per-request surprise.
    pub async fn check_sandbox(&self) -> bool {
        let result = Command::new("docker")
            .args([
                "ps",
                "--filter",
                &format!("name={}", self.config.container),
                "--format",
                "{{.Status}}",
            ])
            .output()
            .await;

        match result {
            Ok(output) if output.status.success() => {
                let up = String::from_utf8_lossy(&output.stdout).contains("Up");
                if up {
                    tracing::info!(container = %self.config.container, "Sandbox container is running");
                } else {
                    tracing::warn!(container = %self.config.container, "Sandbox container is not running");
                }
                up
            }
            _ => {
                tracing::warn!(container = %self.config.container, "Unable to query docker");
                false
            }
        }
    }

    /// Run `request.code` against the problem's test cases. Non-submit
    /// runs only exercise the first few cases; submits run them all.
    pub async fn evaluate(&self, request: &ExecutionRequest, problem: &Problem) -> Result<Verdict> {
        let cases: Vec<TestCase> = if request.is_submit {
            problem.test_cases.clone()
        } else {
            problem
                .test_cases
                .iter()
                .take(PREVIEW_CASE_COUNT)
                .cloned()
                .collect()
        };

        let script = build_runner_script(&request.code, &cases, &problem.title)?;
        let script_name = format!("runner_{}.py", scratch_suffix());
        let host_path = format!("{}/{}", self.config.scratch_dir, script_name);
        let container_path = format!("{}/{}", self.config.container_scratch_dir, script_name);

        tokio::fs::create_dir_all(&self.config.scratch_dir)
            .await
            .map_err(|e| DuelError::internal(format!("Failed to create scratch dir: {e}")))?;
        tokio::fs::write(&host_path, &script)
            .await
            .map_err(|e| DuelError::internal(format!("Failed to write runner script: {e}")))?;

        tracing::debug!(
            problem = %problem.title,
            user_id = %request.user_id,
            cases = cases.len(),
            is_submit = request.is_submit,
            "Executing code in sandbox"
        );

        // kill_on_drop so a timed-out run reaps the `docker exec` client
        // instead of leaving it (and its stdio pipes) behind
        let run = Command::new("docker")
            .args(["exec", &self.config.container, "python", &container_path])
            .kill_on_drop(true)
            .output();
        let outcome = timeout(self.config.timeout(), run).await;

        // Best-effort cleanup; a stale scratch file is not worth failing over
        if let Err(e) = tokio::fs::remove_file(&host_path).await {
            tracing::warn!(error = %e, path = %host_path, "Failed to clean up runner script");
        }

        let output = match outcome {
            Err(_) => {
                tracing::warn!(problem = %problem.title, "Code execution timed out");
                return Ok(Verdict::error(format!(
                    "Code execution timed out ({} seconds)",
                    self.config.timeout_secs
                )));
            }
            Ok(Err(_)) => {
                return Err(DuelError::SandboxUnavailable(self.config.container.clone()));
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let trimmed: String = stderr.chars().take(500).collect();
            return Ok(Verdict::error(format!("Runtime error: {trimmed}")));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();
        if stdout.is_empty() {
            return Ok(Verdict::error("No output from code execution"));
        }

        match serde_json::from_str::<RunnerOutput>(stdout) {
            Ok(raw) => Ok(verdict_from_runner(raw)),
            Err(_) => {
                let head: String = stdout.chars().take(200).collect();
                Ok(Verdict::error(format!("Invalid runner output: {head}")))
            }
        }
    }
}

fn verdict_from_runner(raw: RunnerOutput) -> Verdict {
    if raw.passed {
        return Verdict::pass(raw.passed_tests, raw.total_tests);
    }

    Verdict::Fail {
        all_passed: false,
        failed_at: raw.failed_at.unwrap_or(0),
        total_count: raw.total_tests,
        passed_before: raw.passed_tests,
        input: raw.input.unwrap_or(Value::Null),
        expected: raw.expected.unwrap_or(Value::Null),
        actual: raw.output,
        error: raw.error,
    }
}

fn scratch_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..8)
        .map(|_| format!("{:x}", rng.gen_range(0..16)))
        .collect()
}

/// Known entry-point names for the stock problems; anything else falls
/// back to the first `def` in the submission.
fn entry_point(code: &str, problem_title: &str) -> String {
    let known = match problem_title {
        "Two Sum" => Some("twoSum"),
        "Reverse String" => Some("reverseString"),
        "Valid Parentheses" => Some("isValid"),
        "Merge Two Sorted Lists" => Some("mergeTwoLists"),
        "Maximum Subarray" => Some("maxSubArray"),
        "Climbing Stairs" => Some("climbStairs"),
        "Search in Rotated Sorted Array" => Some("search"),
        "Longest Substring Without Repeating Characters" => Some("lengthOfLongestSubstring"),
        "Container With Most Water" => Some("maxArea"),
        "Median of Two Sorted Arrays" => Some("findMedianSortedArrays"),
        _ => None,
    };
    if let Some(name) = known {
        return name.to_string();
    }

    for line in code.lines() {
        let line = line.trim_start();
        if let Some(rest) = line.strip_prefix("def ") {
            if let Some(name) = rest.split('(').next() {
                return name.trim().to_string();
            }
        }
    }

    "solve".to_string()
}

/// Assemble the Python script the sandbox runs: the user's code followed
/// by a harness that calls the entry point per test case, stopping at the
/// first failure and printing a single JSON result line.
fn build_runner_script(code: &str, cases: &[TestCase], problem_title: &str) -> Result<String> {
    let func_name = entry_point(code, problem_title);
    let cases_json = serde_json::to_string(cases)?;

    Ok(format!(
        r#"import json
import sys
from collections import defaultdict, deque, Counter, OrderedDict
from typing import List, Dict, Set, Optional, Tuple

{code}

test_cases = json.loads({cases_json:?})
total_cases = len(test_cases)
passed = 0

for i, case in enumerate(test_cases):
    input_data = case["input"]
    expected = case["output"]
    try:
        if isinstance(input_data, dict):
            actual = {func_name}(**input_data)
        else:
            actual = {func_name}(input_data)
    except Exception as e:
        print(json.dumps({{
            "passed": False,
            "failed_at": i + 1,
            "total_tests": total_cases,
            "input": input_data,
            "expected": expected,
            "output": None,
            "error": str(e),
            "passed_tests": passed,
        }}, default=str))
        sys.exit(0)

    if actual != expected:
        print(json.dumps({{
            "passed": False,
            "failed_at": i + 1,
            "total_tests": total_cases,
            "input": input_data,
            "expected": expected,
            "output": actual,
            "passed_tests": passed,
        }}, default=str))
        sys.exit(0)

    passed += 1

print(json.dumps({{
    "passed": True,
    "all_passed": True,
    "passed_tests": passed,
    "total_tests": total_cases,
}}, default=str))
"#
    ))
}
