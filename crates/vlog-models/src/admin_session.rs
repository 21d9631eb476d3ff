//! Server-side session for the operator UI.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Minimum entropy, in bytes, of a session token before base64url encoding.
pub const SESSION_TOKEN_MIN_ENTROPY_BYTES: usize = 48;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AdminSession {
    /// Opaque, base64url-encoded token. Never logged or echoed back.
    #[serde(skip_serializing)]
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl AdminSession {
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}
