//! Shared data models for the vlog backend.
//!
//! This crate provides Serde-serializable types for:
//! - The Video/Job/QualityProgress data model and the claim/lease state machine
//! - The Worker registry, API keys, and admin sessions
//! - The Settings service and deployment-event audit trail
//! - Streaming segment metadata
//! - Admin audit log entries

pub mod admin_session;
pub mod api_key;
pub mod audit;
pub mod deployment_event;
pub mod ids;
pub mod job;
pub mod quality_progress;
pub mod segment;
pub mod setting;
pub mod slug;
pub mod video;
pub mod worker;

pub use admin_session::{AdminSession, SESSION_TOKEN_MIN_ENTROPY_BYTES};
pub use api_key::{ApiKey, HashVersion, KEY_PREFIX_LEN};
pub use audit::{truncate_string, AuditAction, AuditLogEntry, AUDIT_ERROR_MAX_LEN, AUDIT_USER_AGENT_MAX_LEN};
pub use deployment_event::{DeploymentEvent, DeploymentEventType};
pub use ids::{ApiKeyId, DeploymentEventId, JobId, VideoId, WorkerId};
pub use job::{state_of, Job, JobState};
pub use quality_progress::{QualityProgress, QualityStatus};
pub use segment::{SegmentMeta, UploadSegmentResult};
pub use setting::{Setting, SettingConstraints, SettingValue};
pub use slug::{is_valid_slug, MAX_SLUG_LENGTH};
pub use video::{Codec, Quality, StreamingFormat, Video, VideoStatus};
pub use worker::{Worker, WorkerStatus, WorkerType, MAX_BOUNDED_RECORD_BYTES};
