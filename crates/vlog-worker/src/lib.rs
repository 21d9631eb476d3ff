#![deny(unreachable_patterns)]
//! Worker Agent: claims transcoding jobs from the Coordinator, drives the
//! Transcoding Executor, and streams segments through the Segment Pipeline.
//!
//! This crate provides:
//! - `CoordinatorClient`, the worker-side HTTP client for the worker API
//! - The Segment Pipeline's Watcher/Uploader halves
//! - The command listener (pending vs. immediate worker commands)
//! - The Worker Agent's claim/execute/heartbeat lifecycle

pub mod agent;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod identity;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod retry;
pub mod uploader;
pub mod watcher;

pub use agent::WorkerAgent;
pub use client::CoordinatorClient;
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use identity::WorkerIdentity;
pub use logging::JobLogger;
