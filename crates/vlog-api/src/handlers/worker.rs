//! Worker API (§6): registration, heartbeat, claim, source download,
//! progress, segment upload, finalize, complete, fail.
//!
//! DTOs here mirror `vlog-worker`'s `CoordinatorClient` wire contract
//! exactly; the two crates never share a dependency on each other, so the
//! shapes are kept in sync by hand rather than imported.

use std::collections::HashMap;

use axum::extract::{Extension, Multipart, Path, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use vlog_models::audit::{AuditAction, AuditLogEntry};
use vlog_models::ids::{JobId, VideoId};
use vlog_models::job::Job;
use vlog_models::quality_progress::QualityStatus;
use vlog_models::segment::UploadSegmentResult;
use vlog_models::video::Quality;
use vlog_models::worker::{WorkerStatus, WorkerType};

use crate::auth::WorkerAuth;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RegisterRequest {
    worker_name: Option<String>,
    worker_type: WorkerType,
    #[serde(default)]
    capabilities: Option<HashMap<String, Value>>,
    #[serde(default)]
    metadata: Option<HashMap<String, Value>>,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    worker_id: String,
    api_key: String,
}

pub async fn register(
    State(state): State<AppState>,
    Extension(request_id): Extension<String>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Json<RegisterResponse>> {
    let worker_name = req.worker_name.unwrap_or_else(|| format!("worker-{}", &uuid::Uuid::new_v4().to_string()[..8]));
    let new_worker = vlog_catalog::workers::NewWorker {
        worker_name,
        worker_type: req.worker_type,
        capabilities: req.capabilities.unwrap_or_default(),
        metadata: req.metadata.unwrap_or_default(),
    };
    let worker_id = state.workers.register(new_worker).await?;
    let issued = state.api_keys.issue(worker_id, None).await?;

    state
        .audit
        .record(AuditLogEntry {
            timestamp: Utc::now(),
            action: AuditAction::WorkerRegister,
            client_ip: None,
            user_agent: None,
            resource_type: "worker".to_string(),
            resource_id: worker_id.to_string(),
            resource_name: None,
            details: Value::Null,
            success: true,
            error: None,
            request_id,
        })
        .await;

    Ok(Json(RegisterResponse { worker_id: worker_id.to_string(), api_key: issued.plaintext }))
}

#[derive(Deserialize)]
pub struct HeartbeatRequest {
    status: String,
    #[serde(default)]
    metadata: Option<HashMap<String, Value>>,
}

#[derive(Serialize)]
pub struct HeartbeatResponse {
    server_time: chrono::DateTime<Utc>,
    next_heartbeat_by: chrono::DateTime<Utc>,
}

pub async fn heartbeat(
    State(state): State<AppState>,
    WorkerAuth { worker_id }: WorkerAuth,
    Json(req): Json<HeartbeatRequest>,
) -> ApiResult<Json<HeartbeatResponse>> {
    let status = parse_worker_status(&req.status)?;
    let now = Utc::now();
    state.workers.heartbeat(worker_id, status, req.metadata, now).await?;

    let record = vlog_queue::EventRecord::WorkerStatus {
        timestamp: now,
        worker_id,
        status: req.status,
        current_job_id: None,
    };
    state.bus.publish(vlog_queue::WORKERS_STATUS_CHANNEL, &record).await;

    Ok(Json(HeartbeatResponse { server_time: now, next_heartbeat_by: now + chrono::Duration::seconds(60) }))
}

fn parse_worker_status(s: &str) -> ApiResult<WorkerStatus> {
    match s {
        "active" => Ok(WorkerStatus::Active),
        "idle" => Ok(WorkerStatus::Idle),
        "busy" => Ok(WorkerStatus::Busy),
        "offline" => Ok(WorkerStatus::Offline),
        other => Err(ApiError::validation(format!("unknown worker status: {other}"))),
    }
}

/// `claim`'s two possible outcomes, untagged so the worker client can
/// distinguish them on shape alone.
#[derive(Serialize)]
#[serde(untagged)]
pub enum ClaimResponse {
    Job(Job),
    NoWork { message: String },
}

pub async fn claim(State(state): State<AppState>, WorkerAuth { worker_id }: WorkerAuth) -> ApiResult<Json<ClaimResponse>> {
    let now = Utc::now();
    let job = state.jobs.claim_next_job(worker_id, state.config.claim_lease, now).await?;

    let Some(job) = job else {
        return Ok(Json(ClaimResponse::NoWork { message: "no claimable job".to_string() }));
    };

    state.workers.set_current_job(worker_id, Some(job.id)).await?;
    crate::metrics::record_job_claimed();

    Ok(Json(ClaimResponse::Job(job)))
}

pub async fn download_source(
    State(state): State<AppState>,
    WorkerAuth { .. }: WorkerAuth,
    Path(video_id): Path<VideoId>,
) -> ApiResult<Vec<u8>> {
    let key = vlog_storage::operations::source_key(video_id);
    let bytes = state.storage.download_bytes(&key).await.map_err(|e| match e {
        vlog_storage::StorageError::NotFound(_) => ApiError::not_found("source not uploaded"),
        other => {
            tracing::warn!(error = %other, %video_id, "source download failed");
            ApiError::StorageUnavailable
        }
    })?;
    Ok(bytes)
}

#[derive(Deserialize)]
pub struct ProgressRequest {
    current_step: String,
    progress_percent: u8,
    #[serde(default)]
    quality_progress: Option<Value>,
}

pub async fn progress(
    State(state): State<AppState>,
    WorkerAuth { worker_id }: WorkerAuth,
    Path(job_id): Path<JobId>,
    Json(req): Json<ProgressRequest>,
) -> ApiResult<()> {
    let now = Utc::now();
    state.jobs.update_progress(job_id, worker_id, &req.current_step, req.progress_percent, now).await?;

    let job = state.jobs.get(job_id).await?;
    let record = vlog_queue::EventRecord::ProgressUpdate {
        timestamp: now,
        video_id: job.video_id,
        job_id,
        current_step: Some(req.current_step),
        progress_percent: req.progress_percent,
    };
    state.bus.publish(&vlog_queue::progress_channel(job.video_id), &record).await;
    state.bus.publish(vlog_queue::PROGRESS_ALL_CHANNEL, &record).await;

    Ok(())
}

/// Extracts the numeric sequence from a segment filename such as
/// `seg-00012.ts`. Playlist/manifest files have no sequence.
fn sequence_from_filename(filename: &str) -> Option<i32> {
    let digits: String = filename.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

fn is_manifest_filename(filename: &str) -> bool {
    filename.ends_with(".m3u8")
}

pub async fn upload_segment(
    State(state): State<AppState>,
    WorkerAuth { .. }: WorkerAuth,
    Path(video_id): Path<VideoId>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadSegmentResult>> {
    let mut quality: Option<Quality> = None;
    let mut filename: Option<String> = None;
    let mut declared_sha256: Option<String> = None;
    let mut bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::validation(e.to_string()))? {
        match field.name().unwrap_or_default() {
            "quality" => {
                let text = field.text().await.map_err(|e| ApiError::validation(e.to_string()))?;
                quality = Some(Quality::parse(&text).ok_or_else(|| ApiError::validation("unknown quality"))?);
            }
            "filename" => filename = Some(field.text().await.map_err(|e| ApiError::validation(e.to_string()))?),
            "sha256" => declared_sha256 = Some(field.text().await.map_err(|e| ApiError::validation(e.to_string()))?),
            "bytes" => bytes = Some(field.bytes().await.map_err(|e| ApiError::validation(e.to_string()))?.to_vec()),
            _ => {}
        }
    }

    let quality = quality.ok_or_else(|| ApiError::validation("missing quality field"))?;
    let filename = filename.ok_or_else(|| ApiError::validation("missing filename field"))?;
    let declared_sha256 = declared_sha256.ok_or_else(|| ApiError::validation("missing sha256 field"))?;
    let bytes = bytes.ok_or_else(|| ApiError::validation("missing bytes field"))?;

    let checksum_verified = vlog_catalog::segments::verify_checksum(&bytes, &declared_sha256);
    if !checksum_verified {
        return Ok(Json(UploadSegmentResult { checksum_verified: false }));
    }

    let byte_size = bytes.len() as i64;
    if is_manifest_filename(&filename) {
        state.storage.upload_playlist(video_id, quality, &filename, bytes).await?;
    } else {
        let key = state.storage.upload_segment(video_id, quality, &filename, bytes).await?;
        let sequence = sequence_from_filename(&filename).ok_or_else(|| ApiError::validation("filename has no sequence"))?;
        state.segments.record(video_id, quality, sequence, &key, byte_size, 0.0, &declared_sha256).await?;
    }

    Ok(Json(UploadSegmentResult { checksum_verified: true }))
}

#[derive(Deserialize)]
pub struct FinalizeRequest {
    segment_count: u32,
    #[allow(dead_code)]
    manifest_sha256: String,
}

#[derive(Serialize)]
pub struct FinalizeResponse {
    complete: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    missing_segments: Vec<String>,
}

pub async fn finalize(
    State(state): State<AppState>,
    WorkerAuth { .. }: WorkerAuth,
    Path((video_id, quality)): Path<(VideoId, String)>,
    Json(req): Json<FinalizeRequest>,
) -> ApiResult<Json<FinalizeResponse>> {
    let quality = Quality::parse(&quality).ok_or_else(|| ApiError::validation("unknown quality"))?;

    let missing = state.segments.missing_sequences(video_id, quality, req.segment_count as i64).await?;
    let complete = missing.is_empty();

    let video = state.videos.get_by_id(video_id).await?;
    let job = state.jobs.get_latest_for_video(video.id).await?;
    state.quality_progress.ensure(job.id, quality).await?;
    state
        .quality_progress
        .update(
            job.id,
            quality,
            if complete { QualityStatus::Completed } else { QualityStatus::Failed },
            req.segment_count - missing.len() as u32,
            req.segment_count,
        )
        .await?;

    Ok(Json(FinalizeResponse {
        complete,
        missing_segments: missing.into_iter().map(|s| s.to_string()).collect(),
    }))
}

#[derive(Deserialize)]
pub struct CompleteRequest {
    qualities: Vec<String>,
    duration: Option<f64>,
    source_width: Option<u32>,
    source_height: Option<u32>,
}

pub async fn complete(
    State(state): State<AppState>,
    WorkerAuth { worker_id }: WorkerAuth,
    Path(job_id): Path<JobId>,
    Json(req): Json<CompleteRequest>,
) -> ApiResult<()> {
    let job = state.jobs.get(job_id).await?;
    let min_quality = state
        .settings
        .get_or_env(
            "transcode.min_ready_quality",
            "MIN_READY_QUALITY",
            |v| match v {
                vlog_models::setting::SettingValue::Enum(s) | vlog_models::setting::SettingValue::String(s) => {
                    Quality::parse(s)
                }
                _ => None,
            },
            Quality::parse,
            Quality::P480,
        )
        .await;

    let qualities_ready = req
        .qualities
        .iter()
        .filter_map(|q| Quality::parse(q))
        .any(|q| q >= min_quality);

    let now = Utc::now();
    state.jobs.complete_job(job_id, worker_id, qualities_ready, now).await?;
    state.workers.set_current_job(worker_id, None).await?;

    if let (Some(duration), Some(width), Some(height)) = (req.duration, req.source_width, req.source_height) {
        state
            .videos
            .set_probed_metadata(job.video_id, duration, width, height, vlog_models::video::Codec::H264)
            .await?;
    }

    crate::metrics::record_job_completed();

    let record = vlog_queue::EventRecord::JobCompleted { timestamp: now, job_id, video_id: job.video_id };
    state.bus.publish(vlog_queue::JOBS_COMPLETED_CHANNEL, &record).await;

    Ok(())
}

#[derive(Deserialize)]
pub struct FailRequest {
    error_message: String,
    retry: bool,
}

pub async fn fail(
    State(state): State<AppState>,
    WorkerAuth { worker_id }: WorkerAuth,
    Path(job_id): Path<JobId>,
    Json(req): Json<FailRequest>,
) -> ApiResult<()> {
    let job = state.jobs.get(job_id).await?;
    state.jobs.fail_job(job_id, worker_id, &req.error_message, req.retry).await?;
    state.workers.set_current_job(worker_id, None).await?;
    crate::metrics::record_job_failed();

    let record = vlog_queue::EventRecord::JobFailed {
        timestamp: Utc::now(),
        job_id,
        video_id: job.video_id,
        error: req.error_message,
        will_retry: req.retry,
    };
    state.bus.publish(vlog_queue::JOBS_FAILED_CHANNEL, &record).await;

    Ok(())
}
