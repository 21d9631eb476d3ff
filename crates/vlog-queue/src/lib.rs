//! Redis-backed event bus (§4.2).
//!
//! This crate provides:
//! - A typed publish/subscribe surface over three channel families
//!   (`progress:*`, operator views, worker command/response pairs)
//! - A circuit breaker guarding the bus substrate with exponential backoff
//!   and jitter
//! - A durable claim-stream tier that gives the Coordinator's reaper a
//!   second, independent view of in-flight claims, reconciled against the
//!   Catalog (which remains authoritative)

pub mod bus;
pub mod circuit_breaker;
pub mod claim_stream;
pub mod error;
pub mod event;

pub use bus::EventBus;
pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use claim_stream::{ClaimStream, PendingClaim};
pub use error::{QueueError, QueueResult};
pub use event::{
    progress_channel, worker_commands_channel, worker_response_channel, EventRecord, WorkerCommandKind,
    JOBS_COMPLETED_CHANNEL, JOBS_FAILED_CHANNEL, PROGRESS_ALL_CHANNEL, WORKERS_COMMANDS_CHANNEL, WORKERS_STATUS_CHANNEL,
};
