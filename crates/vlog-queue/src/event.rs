//! Typed records for the three pub/sub channel families (§4.2, §6).
//!
//! Every record carries at minimum `{type, timestamp}`; subscribers that
//! only care about a subset of variants can still deserialize and match on
//! `type` before deciding what to do with the rest of the payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vlog_models::ids::{JobId, VideoId, WorkerId};

/// `progress:{video_id}` and `progress:all`.
pub fn progress_channel(video_id: VideoId) -> String {
    format!("progress:{video_id}")
}

pub const PROGRESS_ALL_CHANNEL: &str = "progress:all";

/// Operator views.
pub const WORKERS_STATUS_CHANNEL: &str = "workers:status";
pub const JOBS_COMPLETED_CHANNEL: &str = "jobs:completed";
pub const JOBS_FAILED_CHANNEL: &str = "jobs:failed";

/// Per-worker and broadcast control.
pub fn worker_commands_channel(worker_id: WorkerId) -> String {
    format!("worker:{worker_id}:commands")
}

pub const WORKERS_COMMANDS_CHANNEL: &str = "workers:commands";

/// Correlated reply channel for a single request.
pub fn worker_response_channel(worker_id: WorkerId, request_id: &str) -> String {
    format!("worker:{worker_id}:response:{request_id}")
}

/// Commands a worker agent can receive on its command channels (§4.4).
///
/// `Restart`/`Stop`/`Update` are queued and drained between jobs;
/// `GetLogs`/`GetMetrics` reply immediately on the correlated response
/// channel without affecting the claim loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerCommandKind {
    Restart,
    Stop,
    Update,
    GetLogs,
    GetMetrics,
}

impl WorkerCommandKind {
    /// `true` for commands the agent must queue and run only between jobs.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Restart | Self::Stop | Self::Update)
    }
}

/// Records published on the typed pub/sub channel families.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventRecord {
    /// Fine-grained transcode status, published on both `progress:{video_id}`
    /// and `progress:all`.
    ProgressUpdate {
        timestamp: DateTime<Utc>,
        video_id: VideoId,
        job_id: JobId,
        #[serde(skip_serializing_if = "Option::is_none")]
        current_step: Option<String>,
        progress_percent: u8,
    },
    /// Worker heartbeat/status change, published on `workers:status`.
    WorkerStatus {
        timestamp: DateTime<Utc>,
        worker_id: WorkerId,
        status: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        current_job_id: Option<JobId>,
    },
    /// Published on `jobs:completed`.
    JobCompleted {
        timestamp: DateTime<Utc>,
        job_id: JobId,
        video_id: VideoId,
    },
    /// Published on `jobs:failed`.
    JobFailed {
        timestamp: DateTime<Utc>,
        job_id: JobId,
        video_id: VideoId,
        error: String,
        will_retry: bool,
    },
    /// Published to `worker:{id}:commands` or the `workers:commands`
    /// broadcast channel.
    WorkerCommand {
        timestamp: DateTime<Utc>,
        request_id: String,
        command: WorkerCommandKind,
    },
    /// Published on the correlated `worker:{id}:response:{request_id}`
    /// channel in reply to an immediate command.
    WorkerCommandResponse {
        timestamp: DateTime<Utc>,
        request_id: String,
        worker_id: WorkerId,
        payload: serde_json::Value,
    },
}

impl EventRecord {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::ProgressUpdate { timestamp, .. }
            | Self::WorkerStatus { timestamp, .. }
            | Self::JobCompleted { timestamp, .. }
            | Self::JobFailed { timestamp, .. }
            | Self::WorkerCommand { timestamp, .. }
            | Self::WorkerCommandResponse { timestamp, .. } => *timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_update_round_trips_with_type_tag() {
        let record = EventRecord::ProgressUpdate {
            timestamp: Utc::now(),
            video_id: VideoId::new(),
            job_id: JobId::new(),
            current_step: Some("transcode:720p".into()),
            progress_percent: 42,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"type\":\"progress_update\""));
        let decoded: EventRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.timestamp(), record.timestamp());
    }

    #[test]
    fn pending_commands_are_queued_not_immediate() {
        assert!(WorkerCommandKind::Restart.is_pending());
        assert!(WorkerCommandKind::Stop.is_pending());
        assert!(WorkerCommandKind::Update.is_pending());
        assert!(!WorkerCommandKind::GetLogs.is_pending());
        assert!(!WorkerCommandKind::GetMetrics.is_pending());
    }

    #[test]
    fn channel_names_match_the_contract() {
        let video_id = VideoId::new();
        let worker_id = WorkerId::new();
        assert_eq!(progress_channel(video_id), format!("progress:{video_id}"));
        assert_eq!(worker_commands_channel(worker_id), format!("worker:{worker_id}:commands"));
        assert_eq!(
            worker_response_channel(worker_id, "req-1"),
            format!("worker:{worker_id}:response:req-1")
        );
    }
}
