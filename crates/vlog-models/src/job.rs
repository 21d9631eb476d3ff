//! Job entity and the claim/lease state machine.
//!
//! The state is not stored as an enum column; it is derived from a handful
//! of nullable timestamp/counter fields on [`Job`]. [`state_of`] is the one
//! place that derivation happens, so the Catalog's SQL predicates and the
//! in-memory classification can never drift apart (see the crate-level
//! state machine tests and the Catalog's own predicate builders, which are
//! asserted symmetric).

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ids::{JobId, VideoId, WorkerId};

/// One transcoding attempt for a Video.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    pub id: JobId,
    pub video_id: VideoId,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    pub progress_percent: u8,

    pub attempt_number: u32,
    pub max_attempts: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checkpoint: Option<DateTime<Utc>>,

    /// Currently claiming worker; `None` unless [`Job::claimed_at`] is also set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<WorkerId>,

    /// The worker that most recently held the claim, kept after the claim
    /// itself is cleared (retry, completion). Used to attribute soft
    /// failures (§4.3 Reaper, step 3) to the right worker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_by_worker_id: Option<WorkerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_by_worker_name: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The job's derived state. Mutually exclusive and exhaustive for any
/// fixed `now` — see [`state_of`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Unclaimed,
    Claimed,
    Expired,
    Completed,
    Failed,
    Retrying,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unclaimed => "unclaimed",
            Self::Claimed => "claimed",
            Self::Expired => "expired",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Retrying => "retrying",
        }
    }

    /// `true` for states `claim_next_job` may pick up.
    pub fn is_claimable(&self) -> bool {
        matches!(self, Self::Unclaimed | Self::Retrying)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Pure classifier matching the Catalog's SQL `WHERE` predicates exactly.
///
/// Evaluation order: COMPLETED → FAILED → CLAIMED → EXPIRED → RETRYING →
/// UNCLAIMED. The order matters because some predicates would otherwise
/// overlap (e.g. a completed job whose `last_error` was set by a prior
/// attempt before it ultimately succeeded).
pub fn state_of(job: &Job, now: DateTime<Utc>) -> JobState {
    if job.completed_at.is_some() {
        return JobState::Completed;
    }
    if job.last_error.is_some() && job.attempt_number >= job.max_attempts {
        return JobState::Failed;
    }
    if let (Some(_claimed_at), Some(expires_at)) = (job.claimed_at, job.claim_expires_at) {
        if expires_at > now {
            return JobState::Claimed;
        }
        return JobState::Expired;
    }
    if job.last_error.is_some() && job.attempt_number < job.max_attempts && job.claimed_at.is_none() {
        return JobState::Retrying;
    }
    JobState::Unclaimed
}

impl Job {
    pub fn state(&self, now: DateTime<Utc>) -> JobState {
        state_of(self, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn base_job(now: DateTime<Utc>) -> Job {
        Job {
            id: JobId::new(),
            video_id: VideoId::new(),
            claimed_at: None,
            claim_expires_at: None,
            completed_at: None,
            current_step: None,
            progress_percent: 0,
            attempt_number: 1,
            max_attempts: 3,
            last_error: None,
            last_checkpoint: None,
            worker_id: None,
            processed_by_worker_id: None,
            processed_by_worker_name: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn unclaimed_by_default() {
        let now = Utc::now();
        assert_eq!(state_of(&base_job(now), now), JobState::Unclaimed);
    }

    #[test]
    fn claimed_while_lease_is_live() {
        let now = Utc::now();
        let mut job = base_job(now);
        job.claimed_at = Some(now);
        job.claim_expires_at = Some(now + Duration::seconds(30));
        assert_eq!(state_of(&job, now), JobState::Claimed);
    }

    #[test]
    fn expiry_at_exactly_now_is_expired_not_claimed() {
        let now = Utc::now();
        let mut job = base_job(now);
        job.claimed_at = Some(now - Duration::seconds(30));
        job.claim_expires_at = Some(now);
        assert_eq!(state_of(&job, now), JobState::Expired);
    }

    #[test]
    fn retrying_after_clearing_a_non_terminal_failure() {
        let now = Utc::now();
        let mut job = base_job(now);
        job.last_error = Some("transient".into());
        job.attempt_number = 1;
        job.max_attempts = 3;
        assert_eq!(state_of(&job, now), JobState::Retrying);
    }

    #[test]
    fn failed_once_attempts_exhausted() {
        let now = Utc::now();
        let mut job = base_job(now);
        job.last_error = Some("boom".into());
        job.attempt_number = 3;
        job.max_attempts = 3;
        assert_eq!(state_of(&job, now), JobState::Failed);
    }

    #[test]
    fn completed_wins_over_a_stale_last_error() {
        let now = Utc::now();
        let mut job = base_job(now);
        job.last_error = Some("earlier attempt failed".into());
        job.attempt_number = 2;
        job.max_attempts = 3;
        job.completed_at = Some(now);
        assert_eq!(state_of(&job, now), JobState::Completed);
    }

    #[test]
    fn claimable_set_matches_spec() {
        assert!(JobState::Unclaimed.is_claimable());
        assert!(JobState::Retrying.is_claimable());
        assert!(!JobState::Claimed.is_claimable());
        assert!(!JobState::Expired.is_claimable());
        assert!(!JobState::Completed.is_claimable());
        assert!(!JobState::Failed.is_claimable());
    }
}
