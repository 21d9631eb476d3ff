//! CLI error kind and its mapping to the exit codes named in §6.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Transport(String),

    #[error("{status}: {detail}")]
    Api { status: u16, detail: String },

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// `1` for transport/server errors, `2` for validation failures.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Validation(_) => 2,
            _ => 1,
        }
    }
}

impl From<reqwest::Error> for CliError {
    fn from(e: reqwest::Error) -> Self {
        CliError::Transport(e.to_string())
    }
}

impl From<vlog_catalog::CatalogError> for CliError {
    fn from(e: vlog_catalog::CatalogError) -> Self {
        match e {
            vlog_catalog::CatalogError::Validation(msg) | vlog_catalog::CatalogError::ConstraintViolation(msg) => {
                CliError::Validation(msg)
            }
            other => CliError::Transport(other.to_string()),
        }
    }
}
