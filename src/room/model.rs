use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Length of the shareable room code
pub const ROOM_CODE_LEN: usize = 6;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// A participant embedded in a room document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub score: i64,
    /// Absent until the room starts, then false until the player finishes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(rename = "completedAt", skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Player {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            score: 0,
            completed: None,
            completed_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed.unwrap_or(false)
    }
}

/// The central room document. Never physically deleted: rooms are
/// soft-deactivated by flipping `active` to false.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    /// Opaque identity, stable for the room's lifetime (distinct from `code`)
    pub id: String,
    /// Short shareable code, unique among currently-active rooms
    pub code: String,
    #[serde(rename = "problemId")]
    pub problem_id: String,
    #[serde(rename = "hostId")]
    pub host_id: String,
    /// Insertion order is join order; player ids are unique within a room
    pub players: Vec<Player>,
    pub started: bool,
    pub active: bool,
    #[serde(rename = "gameCompleted")]
    pub game_completed: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Room {
    /// Fresh lobby room with the host as its only player. The caller is
    /// responsible for ensuring `code` is unique among active rooms.
    pub fn new_lobby(
        code: String,
        problem_id: impl Into<String>,
        host_id: impl Into<String>,
        host_name: impl Into<String>,
    ) -> Self {
        let host_id = host_id.into();
        Self {
            id: generate_room_id(),
            code,
            problem_id: problem_id.into(),
            host_id: host_id.clone(),
            players: vec![Player::new(host_id, host_name)],
            started: false,
            active: true,
            game_completed: false,
            created_at: Utc::now(),
        }
    }

    pub fn has_player(&self, player_id: &str) -> bool {
        self.players.iter().any(|p| p.id == player_id)
    }

    pub fn is_host(&self, player_id: &str) -> bool {
        self.host_id == player_id
    }
}

/// Generate an opaque room identity
fn generate_room_id() -> String {
    let mut rng = rand::thread_rng();
    (0..24)
        .map(|_| format!("{:x}", rng.gen_range(0..16)))
        .collect()
}

/// Generate a candidate room code. Uniqueness among active rooms is
/// enforced by the caller's retry loop, not here.
pub fn generate_room_code() -> String {
    let mut rng = rand::thread_rng();
    (0..ROOM_CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}
