//! Event bus error types.

use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("circuit breaker open, publish refused")]
    CircuitOpen,

    #[error("claim lost: {0}")]
    ClaimLost(String),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueueError {
    pub fn claim_lost(msg: impl Into<String>) -> Self {
        Self::ClaimLost(msg.into())
    }
}
