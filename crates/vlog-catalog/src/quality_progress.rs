//! Per-quality sub-progress repository, keyed by `(job_id, quality)`.

use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use vlog_models::ids::JobId;
use vlog_models::quality_progress::{QualityProgress, QualityStatus};
use vlog_models::video::Quality;

use crate::error::{CatalogError, CatalogResult};

pub struct QualityProgressRepository {
    pool: PgPool,
}

#[derive(FromRow)]
struct QualityProgressRow {
    job_id: Uuid,
    quality: String,
    status: String,
    progress_percent: i16,
    segments_total: i32,
    segments_completed: i32,
}

fn status_str(status: QualityStatus) -> &'static str {
    match status {
        QualityStatus::Pending => "pending",
        QualityStatus::InProgress => "in_progress",
        QualityStatus::Uploading => "uploading",
        QualityStatus::Uploaded => "uploaded",
        QualityStatus::Completed => "completed",
        QualityStatus::Failed => "failed",
        QualityStatus::Skipped => "skipped",
    }
}

fn parse_status(s: &str) -> CatalogResult<QualityStatus> {
    match s {
        "pending" => Ok(QualityStatus::Pending),
        "in_progress" => Ok(QualityStatus::InProgress),
        "uploading" => Ok(QualityStatus::Uploading),
        "uploaded" => Ok(QualityStatus::Uploaded),
        "completed" => Ok(QualityStatus::Completed),
        "failed" => Ok(QualityStatus::Failed),
        "skipped" => Ok(QualityStatus::Skipped),
        other => Err(CatalogError::ConstraintViolation(format!("unknown quality status: {other}"))),
    }
}

impl QualityProgressRow {
    fn into_progress(self) -> CatalogResult<QualityProgress> {
        let quality = Quality::parse(&self.quality)
            .ok_or_else(|| CatalogError::ConstraintViolation(format!("unknown quality: {}", self.quality)))?;
        Ok(QualityProgress {
            job_id: JobId::from(self.job_id),
            quality,
            status: parse_status(&self.status)?,
            progress_percent: self.progress_percent as u8,
            segments_total: self.segments_total as u32,
            segments_completed: self.segments_completed as u32,
        })
    }
}

impl QualityProgressRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure(&self, job_id: JobId, quality: Quality) -> CatalogResult<()> {
        sqlx::query(
            "INSERT INTO quality_progress (job_id, quality) VALUES ($1, $2) \
             ON CONFLICT (job_id, quality) DO NOTHING",
        )
        .bind(job_id.as_uuid())
        .bind(quality.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update(
        &self,
        job_id: JobId,
        quality: Quality,
        status: QualityStatus,
        segments_completed: u32,
        segments_total: u32,
    ) -> CatalogResult<()> {
        let progress_percent = if segments_total == 0 {
            0
        } else {
            ((segments_completed as f64 / segments_total as f64) * 100.0).round() as i16
        };
        sqlx::query(
            "UPDATE quality_progress SET status = $1, progress_percent = $2, \
             segments_total = $3, segments_completed = $4 WHERE job_id = $5 AND quality = $6",
        )
        .bind(status_str(status))
        .bind(progress_percent)
        .bind(segments_total as i32)
        .bind(segments_completed as i32)
        .bind(job_id.as_uuid())
        .bind(quality.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_for_job(&self, job_id: JobId) -> CatalogResult<Vec<QualityProgress>> {
        let rows: Vec<QualityProgressRow> = sqlx::query_as(
            "SELECT job_id, quality, status, progress_percent, segments_total, segments_completed \
             FROM quality_progress WHERE job_id = $1",
        )
        .bind(job_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(QualityProgressRow::into_progress).collect()
    }

    /// True if at least one quality reached `completed` at or above
    /// `min_quality` — the resolved CMAF-finalization rule (§9).
    pub async fn has_ready_quality(&self, job_id: JobId, min_quality: Quality) -> CatalogResult<bool> {
        let progress = self.list_for_job(job_id).await?;
        Ok(progress
            .iter()
            .any(|p| p.status == QualityStatus::Completed && p.quality >= min_quality))
    }

    /// True once every quality for the job has reached a terminal
    /// per-quality state (completed, failed, or skipped).
    pub async fn all_settled(&self, job_id: JobId) -> CatalogResult<bool> {
        let progress = self.list_for_job(job_id).await?;
        Ok(!progress.is_empty() && progress.iter().all(|p| p.status.is_terminal()))
    }
}
