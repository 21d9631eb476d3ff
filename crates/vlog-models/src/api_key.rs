//! Worker API key credential.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ids::{ApiKeyId, WorkerId};

/// Hashing scheme used for `key_hash`, kept explicit so legacy rows remain
/// verifiable after the default scheme changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[repr(i16)]
pub enum HashVersion {
    /// Legacy SHA-256, kept valid until the key is rotated.
    Sha256Legacy = 1,
    /// Current default.
    Argon2id = 2,
}

impl HashVersion {
    pub fn from_i16(v: i16) -> Option<Self> {
        match v {
            1 => Some(Self::Sha256Legacy),
            2 => Some(Self::Argon2id),
            _ => None,
        }
    }
}

/// Length of the plaintext-visible lookup prefix.
pub const KEY_PREFIX_LEN: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ApiKey {
    pub id: ApiKeyId,
    pub worker_id: WorkerId,
    pub key_hash: String,
    pub key_prefix: String,
    pub hash_version: HashVersion,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

impl ApiKey {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at.map(|e| e > now).unwrap_or(true)
    }
}
