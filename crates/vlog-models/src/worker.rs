//! Worker registry entity.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{JobId, WorkerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkerType {
    Local,
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Active,
    Idle,
    Busy,
    Offline,
    Disabled,
}

/// Maximum serialized size of [`Worker::capabilities`] / [`Worker::metadata`], in bytes.
pub const MAX_BOUNDED_RECORD_BYTES: usize = 10 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Worker {
    pub worker_id: WorkerId,
    pub worker_name: String,
    pub worker_type: WorkerType,
    pub registered_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    pub status: WorkerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_job_id: Option<JobId>,
    #[serde(default)]
    pub capabilities: HashMap<String, Value>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl Worker {
    pub fn is_stale(&self, now: DateTime<Utc>, offline_after: chrono::Duration) -> bool {
        now - self.last_heartbeat > offline_after
    }
}
