//! Upload unit in the streaming segment pipeline.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ids::VideoId;
use crate::video::Quality;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SegmentMeta {
    pub video_id: VideoId,
    pub quality: Quality,
    pub filename: String,
    pub size_bytes: u64,
    /// Declared SHA-256, as lowercase hex, computed by the uploader.
    pub declared_sha256: String,
}

/// Server-side verdict returned by `upload_segment`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UploadSegmentResult {
    pub checksum_verified: bool,
}
