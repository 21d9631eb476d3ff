//! Catalog error types.

use thiserror::Error;

/// Result type for Catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors that can occur during Catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("claim lost: {0}")]
    ClaimLost(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("constraint violated: {0}")]
    ConstraintViolation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),
}

impl CatalogError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn claim_lost(what: impl Into<String>) -> Self {
        Self::ClaimLost(what.into())
    }

    pub fn validation(what: impl Into<String>) -> Self {
        Self::Validation(what.into())
    }

    pub fn config_error(what: impl Into<String>) -> Self {
        Self::Config(what.into())
    }

    /// True for errors worth retrying with backoff at the caller
    /// (deadlocks, connection resets); false for anything that will
    /// fail again identically (constraint violations, not-found).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::PoolTimedOut)
            | Self::Database(sqlx::Error::PoolClosed)
            | Self::Database(sqlx::Error::Io(_)) => true,
            Self::Database(sqlx::Error::Database(db_err)) => {
                // Postgres deadlock_detected / serialization_failure
                matches!(db_err.code().as_deref(), Some("40P01") | Some("40001"))
            }
            _ => false,
        }
    }
}
