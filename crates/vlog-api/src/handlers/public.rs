//! Public read-only surface (§6): video listing, lookup, and progress.
//!
//! No Category domain model exists in the Catalog - videos are addressed
//! flatly by slug. `/api/categories` and `/api/categories/{slug}` are kept
//! in the route table for wire-contract parity but answer with an empty
//! collection and a 404 respectively, rather than fabricating a grouping
//! concept the data model doesn't have.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use vlog_models::job::state_of;
use vlog_models::video::Video;

use crate::error::{ApiError, ApiResult};
use crate::security::validate_slug;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ListVideosQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

pub async fn list_videos(State(state): State<AppState>, Query(q): Query<ListVideosQuery>) -> ApiResult<Json<Vec<Video>>> {
    let limit = q.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = q.offset.unwrap_or(0).max(0);
    let videos = state.videos.list_active(limit, offset).await?;
    Ok(Json(videos))
}

pub async fn get_video(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<Json<Video>> {
    validate_slug(&slug)?;
    let video = state.videos.get_by_slug(&slug).await?;
    Ok(Json(video))
}

#[derive(Serialize)]
pub struct QualityProgressView {
    name: String,
    status: &'static str,
    progress: u8,
}

#[derive(Serialize)]
pub struct ProgressResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_step: Option<String>,
    progress_percent: u8,
    qualities: Vec<QualityProgressView>,
    attempt: u32,
    max_attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    started_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_error: Option<String>,
}

pub async fn get_progress(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<Json<ProgressResponse>> {
    validate_slug(&slug)?;
    let video = state.videos.get_by_slug(&slug).await?;
    let job = state.jobs.get_latest_for_video(video.id).await?;
    let qualities = state.quality_progress.list_for_job(job.id).await?;

    let qualities = qualities
        .into_iter()
        .map(|q| QualityProgressView {
            name: q.quality.as_str().to_string(),
            status: quality_status_str(q.status),
            progress: q.progress_percent,
        })
        .collect();

    Ok(Json(ProgressResponse {
        status: state_of(&job, chrono::Utc::now()).as_str(),
        current_step: job.current_step,
        progress_percent: job.progress_percent,
        qualities,
        attempt: job.attempt_number,
        max_attempts: job.max_attempts,
        started_at: job.claimed_at,
        last_error: job.last_error,
    }))
}

fn quality_status_str(status: vlog_models::quality_progress::QualityStatus) -> &'static str {
    use vlog_models::quality_progress::QualityStatus;
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

#[derive(Serialize)]
pub struct CategoryResponse {
    slug: String,
    title: String,
}

/// No Category model exists; the collection is always empty.
pub async fn list_categories() -> Json<Vec<CategoryResponse>> {
    Json(Vec::new())
}

pub async fn get_category(Path(slug): Path<String>) -> ApiResult<Json<CategoryResponse>> {
    Err(ApiError::not_found(format!("category {slug}")))
}
