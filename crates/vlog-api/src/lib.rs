//! Coordinator: the Axum HTTP API server binding the public, worker, and
//! admin surfaces to the Catalog, object storage, and event bus.
//!
//! This crate provides:
//! - Public read-only video/progress endpoints and HLS/CMAF static serving
//! - The Worker API (registration, heartbeat, claim, progress, upload, finalize)
//! - The admin surface (video/worker/settings management, audit log)
//! - Rate limiting, security headers, and Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod reaper;
pub mod routes;
pub mod security;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use reaper::spawn_reaper;
pub use routes::create_router;
pub use state::AppState;
