//! Postgres-backed Catalog.
//!
//! The Catalog is the single source of truth for videos, transcoding jobs,
//! worker registrations, API keys, admin sessions, settings, and deployment
//! events. Every other component (Coordinator, Worker Agent, CLI) reaches
//! the database only through the repositories exposed here.
//!
//! ## Modules
//! - `pool` - connection pool setup and migration runner
//! - `error` - error types and transient-error classification
//! - `retry` - retry-with-backoff wrapper for transient storage errors
//! - `metrics` - Prometheus metrics collection
//! - `videos` - Video repository
//! - `jobs` - Job repository (claim/heartbeat/complete/fail/reap)
//! - `workers` - Worker registry
//! - `api_keys` - API key issuance and verification
//! - `quality_progress` - per-quality sub-progress of a Job
//! - `segments` - streaming segment metadata
//! - `sessions` - Admin session repository
//! - `settings` - Typed settings service with env fallback
//! - `deployment_events` - Deployment event log
//! - `audit_log` - best-effort audit log writer

pub mod api_keys;
pub mod audit_log;
pub mod deployment_events;
pub mod error;
pub mod jobs;
pub mod metrics;
pub mod pool;
pub mod quality_progress;
pub mod retry;
pub mod segments;
pub mod sessions;
pub mod settings;
pub mod videos;
pub mod workers;

pub use api_keys::ApiKeyRepository;
pub use audit_log::AuditLogRepository;
pub use deployment_events::DeploymentEventRepository;
pub use error::{CatalogError, CatalogResult};
pub use jobs::JobRepository;
pub use pool::{connect, CatalogConfig};
pub use quality_progress::QualityProgressRepository;
pub use retry::{with_retry, RetryConfig};
pub use segments::SegmentRepository;
pub use sessions::SessionRepository;
pub use settings::SettingsService;
pub use videos::VideoRepository;
pub use workers::WorkerRepository;
