//! Coordinator error type (§7): one place where internal errors become HTTP
//! responses, with a sanitizer that keeps filesystem paths, SQL constraint
//! names, and other internals out of what callers see.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("authentication required")]
    AuthRequired,

    #[error("access denied")]
    AuthDenied,

    #[error("rate limited")]
    RateLimited,

    #[error("claim lost: {0}")]
    ClaimLost(String),

    #[error("storage unavailable")]
    StorageUnavailable,

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Catalog(#[from] vlog_catalog::CatalogError),

    #[error(transparent)]
    Storage(#[from] vlog_storage::StorageError),

    #[error(transparent)]
    Queue(#[from] vlog_queue::QueueError),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::AuthRequired => StatusCode::UNAUTHORIZED,
            ApiError::AuthDenied => StatusCode::FORBIDDEN,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ClaimLost(_) => StatusCode::CONFLICT,
            ApiError::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) | ApiError::Queue(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Catalog(e) => catalog_status(e),
            ApiError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// User-safe detail string. Everything that isn't already a known,
    /// user-facing variant gets logged with its real message and replaced
    /// with a generic one here.
    fn detail(&self) -> String {
        match self {
            ApiError::NotFound(msg) => msg.clone(),
            ApiError::Validation(msg) => msg.clone(),
            ApiError::AuthRequired => "authentication required".to_string(),
            ApiError::AuthDenied => "access denied".to_string(),
            ApiError::RateLimited => "rate limited, slow down".to_string(),
            ApiError::ClaimLost(_) => "claim no longer held".to_string(),
            ApiError::StorageUnavailable => "storage temporarily unavailable".to_string(),
            ApiError::Catalog(e) => match e {
                vlog_catalog::CatalogError::NotFound(msg) => msg.clone(),
                vlog_catalog::CatalogError::AlreadyExists(msg) => msg.clone(),
                vlog_catalog::CatalogError::Validation(msg) => msg.clone(),
                vlog_catalog::CatalogError::ClaimLost(_) => "claim no longer held".to_string(),
                _ => {
                    warn!(error = %e, "internal catalog error");
                    "an internal error occurred".to_string()
                }
            },
            ApiError::Internal(msg) => {
                warn!(error = %msg, "internal error");
                "an internal error occurred".to_string()
            }
            ApiError::Storage(e) => {
                warn!(error = %e, "storage error");
                "storage temporarily unavailable".to_string()
            }
            ApiError::Queue(e) => {
                warn!(error = %e, "queue error");
                "an internal error occurred".to_string()
            }
        }
    }
}

fn catalog_status(e: &vlog_catalog::CatalogError) -> StatusCode {
    match e {
        vlog_catalog::CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
        vlog_catalog::CatalogError::AlreadyExists(_) => StatusCode::CONFLICT,
        vlog_catalog::CatalogError::ClaimLost(_) => StatusCode::CONFLICT,
        vlog_catalog::CatalogError::Validation(_) | vlog_catalog::CatalogError::ConstraintViolation(_) => {
            StatusCode::BAD_REQUEST
        }
        vlog_catalog::CatalogError::Database(_)
        | vlog_catalog::CatalogError::Migration(_)
        | vlog_catalog::CatalogError::Serialization(_)
        | vlog_catalog::CatalogError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = self.detail();
        let body = ErrorBody { detail, error: status.canonical_reason().unwrap_or("error").to_lowercase() };

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::TOO_MANY_REQUESTS {
            response.headers_mut().insert("Retry-After", "1".parse().unwrap());
        }
        if status == StatusCode::SERVICE_UNAVAILABLE {
            response.headers_mut().insert("Retry-After", "30".parse().unwrap());
        }
        response
    }
}
