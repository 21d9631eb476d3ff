//! Per-variant sub-progress of a Job.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ids::JobId;
use crate::video::Quality;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum QualityStatus {
    Pending,
    InProgress,
    Uploading,
    Uploaded,
    Completed,
    Failed,
    Skipped,
}

impl QualityStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QualityProgress {
    pub job_id: JobId,
    pub quality: Quality,
    pub status: QualityStatus,
    pub progress_percent: u8,
    pub segments_total: u32,
    pub segments_completed: u32,
}

impl QualityProgress {
    pub fn new(job_id: JobId, quality: Quality) -> Self {
        Self {
            job_id,
            quality,
            status: QualityStatus::Pending,
            progress_percent: 0,
            segments_total: 0,
            segments_completed: 0,
        }
    }
}
