use thiserror::Error;

/// Custom error types for the coding-duel server
#[derive(Debug, Error)]
pub enum DuelError {
    /// Room lifecycle errors
    #[error("Room {0} not found")]
    RoomNotFound(String),

    #[error("Room {0} is no longer active")]
    RoomClosed(String),

    #[error("Room {0} has already started")]
    RoomStarted(String),

    #[error("Only the host can perform this action on room {0}")]
    NotHost(String),

    /// Problem catalog errors
    #[error("Problem {0} not found")]
    ProblemNotFound(String),

    /// Evaluator errors
    #[error("Code execution timed out after {0} seconds")]
    EvaluatorTimeout(u64),

    #[error("Sandbox container {0} is not available")]
    SandboxUnavailable(String),

    /// Serialization errors
    #[error("Failed to serialize message: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// Storage errors
    #[error("Store error: {0}")]
    Store(String),

    /// Generic errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Convenience type alias for Results using DuelError
pub type Result<T> = std::result::Result<T, DuelError>;

impl DuelError {
    /// Helper to create Internal errors with context
    pub fn internal(msg: impl Into<String>) -> Self {
        DuelError::Internal(msg.into())
    }

    /// Helper to create Store errors with context
    pub fn store(msg: impl Into<String>) -> Self {
        DuelError::Store(msg.into())
    }

    /// HTTP status code this error should surface as
    pub fn status(&self) -> warp::http::StatusCode {
        use warp::http::StatusCode;
        match self {
            DuelError::RoomNotFound(_) | DuelError::ProblemNotFound(_) => StatusCode::NOT_FOUND,
            DuelError::NotHost(_) => StatusCode::FORBIDDEN,
            DuelError::RoomClosed(_) | DuelError::RoomStarted(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl warp::reject::Reject for DuelError {}

/// Recover handler mapping DuelError rejections to JSON error replies
pub async fn handle_rejection(
    err: warp::Rejection,
) -> std::result::Result<impl warp::Reply, warp::Rejection> {
    if let Some(duel_err) = err.find::<DuelError>() {
        let status = duel_err.status();
        let body = warp::reply::json(&serde_json::json!({
            "error": duel_err.to_string()
        }));
        return Ok(warp::reply::with_status(body, status));
    }

    Err(err)
}
