//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("job failed: {0}")]
    JobFailed(String),

    #[error("claim lost")]
    ClaimLost,

    #[error("segment upload hard-failed after retries: {0}")]
    SegmentHardFailed(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("coordinator request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("media error: {0}")]
    Media(#[from] vlog_media::MediaError),

    #[error("event bus error: {0}")]
    Queue(#[from] vlog_queue::QueueError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Whether this failure should count against the job's retry budget
    /// (vs. being treated as a local-only, non-attributable error).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WorkerError::Http(_) | WorkerError::Media(_) | WorkerError::Queue(_) | WorkerError::SegmentHardFailed(_)
        )
    }
}
