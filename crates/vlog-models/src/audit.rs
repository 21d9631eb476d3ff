//! Append-only audit log entries for mutating admin actions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Categorizes a mutating admin action for the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    VideoUpload,
    VideoUpdate,
    VideoDelete,
    VideoRestore,
    VideoRetry,
    VideoRetranscode,
    JobRetry,
    TranscodingStart,
    TranscodingComplete,
    TranscodingFailed,
    WorkerRegister,
    WorkerRevoke,
    WorkerDisable,
    WorkerEnable,
    WorkerDelete,
    WorkerRestart,
    WorkerUpdate,
    SettingsChange,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VideoUpload => "video_upload",
            Self::VideoUpdate => "video_update",
            Self::VideoDelete => "video_delete",
            Self::VideoRestore => "video_restore",
            Self::VideoRetry => "video_retry",
            Self::VideoRetranscode => "video_retranscode",
            Self::JobRetry => "job_retry",
            Self::TranscodingStart => "transcoding_start",
            Self::TranscodingComplete => "transcoding_complete",
            Self::TranscodingFailed => "transcoding_failed",
            Self::WorkerRegister => "worker_register",
            Self::WorkerRevoke => "worker_revoke",
            Self::WorkerDisable => "worker_disable",
            Self::WorkerEnable => "worker_enable",
            Self::WorkerDelete => "worker_delete",
            Self::WorkerRestart => "worker_restart",
            Self::WorkerUpdate => "worker_update",
            Self::SettingsChange => "settings_change",
        }
    }
}

/// Maximum lengths enforced before persisting ([4.3]).
pub const AUDIT_USER_AGENT_MAX_LEN: usize = 200;
pub const AUDIT_ERROR_MAX_LEN: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AuditLogEntry {
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    /// Truncated to [`AUDIT_USER_AGENT_MAX_LEN`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub resource_type: String,
    pub resource_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    #[serde(default)]
    pub details: Value,
    pub success: bool,
    /// Truncated to [`AUDIT_ERROR_MAX_LEN`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub request_id: String,
}

/// Truncate a string to at most `max_len` bytes, respecting char boundaries.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "héllo world";
        let truncated = truncate_string(s, 3);
        assert!(truncated.len() <= 3);
    }

    #[test]
    fn truncate_is_noop_when_short() {
        assert_eq!(truncate_string("short", 500), "short");
    }
}
