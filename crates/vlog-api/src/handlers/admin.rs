//! Admin surface (§6, §4.3, §4.9): video CRUD, job retry/retranscode, worker
//! management, settings CRUD, audit query, and session login.
//!
//! Every mutating handler here writes a best-effort audit entry after the
//! action succeeds; a failure to append that entry never fails the action
//! itself (see [`vlog_catalog::AuditLogRepository::record`]).

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::{ConnectInfo, Extension, Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use subtle::ConstantTimeEq;

use vlog_models::audit::{AuditAction, AuditLogEntry};
use vlog_models::ids::{JobId, VideoId, WorkerId};
use vlog_models::setting::{Setting, SettingValue};
use vlog_models::video::{StreamingFormat, Video, VideoStatus};
use vlog_models::worker::Worker;

use crate::auth::{AdminAuth, ADMIN_SESSION_COOKIE};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

fn client_ip(addr: Option<&SocketAddr>, headers: &HeaderMap, trusted_proxies: &[std::net::IpAddr]) -> Option<String> {
    let peer = addr.map(|a| a.ip());
    if let Some(peer_ip) = peer {
        if trusted_proxies.contains(&peer_ip) {
            if let Some(forwarded) = headers.get("X-Forwarded-For").and_then(|v| v.to_str().ok()) {
                if let Some(first) = forwarded.split(',').next() {
                    if let Ok(ip) = first.trim().parse::<std::net::IpAddr>() {
                        return Some(ip.to_string());
                    }
                }
            }
        }
    }
    peer.map(|ip| ip.to_string())
}

fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers.get(axum::http::header::USER_AGENT).and_then(|v| v.to_str().ok()).map(|s| s.to_string())
}

#[allow(clippy::too_many_arguments)]
async fn audit(
    state: &AppState,
    request_id: &str,
    action: AuditAction,
    resource_type: &str,
    resource_id: impl Into<String>,
    resource_name: Option<String>,
    details: Value,
    success: bool,
    error: Option<String>,
    client_ip: Option<String>,
    user_agent: Option<String>,
) {
    state
        .audit
        .record(AuditLogEntry {
            timestamp: Utc::now(),
            action,
            client_ip,
            user_agent,
            resource_type: resource_type.to_string(),
            resource_id: resource_id.into(),
            resource_name,
            details,
            success,
            error,
            request_id: request_id.to_string(),
        })
        .await;
}

// --- Login -----------------------------------------------------------------

#[derive(Deserialize)]
pub struct LoginRequest {
    secret: String,
}

/// Exchanges the shared admin secret for a session cookie. Requires the
/// secret be configured; there is no other way to mint a first session.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> ApiResult<(CookieJar, Json<Value>)> {
    let configured = state.config.admin_secret.as_ref().ok_or(ApiError::AuthRequired)?;
    if !req.secret.as_bytes().ct_eq(configured.as_bytes()).into() {
        return Err(ApiError::AuthRequired);
    }

    let ua = user_agent(&headers);
    let issued = state
        .sessions
        .create(chrono::Duration::from_std(state.config.session_lifetime).unwrap_or(chrono::Duration::hours(12)), None, ua.as_deref(), Utc::now())
        .await?;

    let mut cookie = Cookie::new(ADMIN_SESSION_COOKIE, issued.token);
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Strict);
    cookie.set_secure(state.config.is_production());
    cookie.set_path("/");

    Ok((jar.add(cookie), Json(json!({ "expires_at": issued.expires_at }))))
}

// --- Video CRUD --------------------------------------------------------------

#[derive(Deserialize)]
pub struct CreateVideoRequest {
    slug: String,
    title: String,
    #[serde(default)]
    streaming_format: Option<StreamingFormat>,
}

pub async fn create_video(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Extension(request_id): Extension<String>,
    headers: HeaderMap,
    addr: Option<ConnectInfo<SocketAddr>>,
    Json(req): Json<CreateVideoRequest>,
) -> ApiResult<Json<Video>> {
    let streaming_format = req.streaming_format.unwrap_or(StreamingFormat::HlsTs);

    let result = state
        .videos
        .create_video(vlog_catalog::videos::NewVideo { slug: req.slug.clone(), title: req.title.clone(), streaming_format })
        .await;

    let ip = client_ip(addr.as_ref().map(|c| &c.0), &headers, &state.config.trusted_proxies);
    let ua = user_agent(&headers);

    match result {
        Ok(video_id) => {
            audit(
                &state,
                &request_id,
                AuditAction::VideoUpload,
                "video",
                video_id.to_string(),
                Some(req.slug.clone()),
                json!({ "title": req.title }),
                true,
                None,
                ip,
                ua,
            )
            .await;
            let video = state.videos.get_by_id(video_id).await?;
            Ok(Json(video))
        }
        Err(e) => {
            audit(
                &state,
                &request_id,
                AuditAction::VideoUpload,
                "video",
                req.slug.clone(),
                Some(req.slug),
                Value::Null,
                false,
                Some(e.to_string()),
                ip,
                ua,
            )
            .await;
            Err(e.into())
        }
    }
}

#[derive(Deserialize)]
pub struct ListVideosQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

pub async fn list_videos(State(state): State<AppState>, _admin: AdminAuth, Query(q): Query<ListVideosQuery>) -> ApiResult<Json<Vec<Video>>> {
    let limit = q.limit.unwrap_or(50).clamp(1, 500);
    let offset = q.offset.unwrap_or(0).max(0);
    Ok(Json(state.videos.list_active(limit, offset).await?))
}

pub async fn get_video(State(state): State<AppState>, _admin: AdminAuth, Path(video_id): Path<VideoId>) -> ApiResult<Json<Video>> {
    Ok(Json(state.videos.get_by_id(video_id).await?))
}

pub async fn delete_video(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Extension(request_id): Extension<String>,
    headers: HeaderMap,
    addr: Option<ConnectInfo<SocketAddr>>,
    Path(video_id): Path<VideoId>,
) -> ApiResult<()> {
    state.videos.soft_delete(video_id).await?;

    if let Err(e) = state.storage.delete_video_files(video_id).await {
        tracing::warn!(error = %e, %video_id, "failed to delete storage objects for deleted video");
    }

    audit(
        &state,
        &request_id,
        AuditAction::VideoDelete,
        "video",
        video_id.to_string(),
        None,
        Value::Null,
        true,
        None,
        client_ip(addr.as_ref().map(|c| &c.0), &headers, &state.config.trusted_proxies),
        user_agent(&headers),
    )
    .await;

    Ok(())
}

pub async fn restore_video(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Extension(request_id): Extension<String>,
    headers: HeaderMap,
    addr: Option<ConnectInfo<SocketAddr>>,
    Path(video_id): Path<VideoId>,
) -> ApiResult<()> {
    state.videos.restore(video_id).await?;

    audit(
        &state,
        &request_id,
        AuditAction::VideoRestore,
        "video",
        video_id.to_string(),
        None,
        Value::Null,
        true,
        None,
        client_ip(addr.as_ref().map(|c| &c.0), &headers, &state.config.trusted_proxies),
        user_agent(&headers),
    )
    .await;

    Ok(())
}

pub async fn retry_video(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Extension(request_id): Extension<String>,
    headers: HeaderMap,
    addr: Option<ConnectInfo<SocketAddr>>,
    Path(video_id): Path<VideoId>,
) -> ApiResult<()> {
    let job = state.jobs.get_latest_for_video(video_id).await?;
    state.jobs.retry_job(job.id).await?;

    audit(
        &state,
        &request_id,
        AuditAction::JobRetry,
        "job",
        job.id.to_string(),
        Some(video_id.to_string()),
        Value::Null,
        true,
        None,
        client_ip(addr.as_ref().map(|c| &c.0), &headers, &state.config.trusted_proxies),
        user_agent(&headers),
    )
    .await;

    Ok(())
}

#[derive(Serialize)]
pub struct RetranscodeResponse {
    job_id: JobId,
}

pub async fn retranscode_video(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Extension(request_id): Extension<String>,
    headers: HeaderMap,
    addr: Option<ConnectInfo<SocketAddr>>,
    Path(video_id): Path<VideoId>,
) -> ApiResult<Json<RetranscodeResponse>> {
    let video = state.videos.get_by_id(video_id).await?;
    let job_id = state.jobs.create_job(video_id, 3).await?;
    state.videos.set_status(video_id, VideoStatus::Pending).await?;

    audit(
        &state,
        &request_id,
        AuditAction::VideoRetranscode,
        "video",
        video_id.to_string(),
        Some(video.slug),
        json!({ "job_id": job_id.to_string() }),
        true,
        None,
        client_ip(addr.as_ref().map(|c| &c.0), &headers, &state.config.trusted_proxies),
        user_agent(&headers),
    )
    .await;

    Ok(Json(RetranscodeResponse { job_id }))
}

// --- Worker management --------------------------------------------------------

pub async fn list_workers(State(state): State<AppState>, _admin: AdminAuth) -> ApiResult<Json<Vec<Worker>>> {
    Ok(Json(state.workers.list().await?))
}

pub async fn get_worker(State(state): State<AppState>, _admin: AdminAuth, Path(worker_id): Path<WorkerId>) -> ApiResult<Json<Worker>> {
    Ok(Json(state.workers.get(worker_id).await?))
}

pub async fn revoke_worker(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Extension(request_id): Extension<String>,
    headers: HeaderMap,
    addr: Option<ConnectInfo<SocketAddr>>,
    Path(worker_id): Path<WorkerId>,
) -> ApiResult<()> {
    state.workers.revoke(worker_id).await?;

    audit(
        &state,
        &request_id,
        AuditAction::WorkerRevoke,
        "worker",
        worker_id.to_string(),
        None,
        Value::Null,
        true,
        None,
        client_ip(addr.as_ref().map(|c| &c.0), &headers, &state.config.trusted_proxies),
        user_agent(&headers),
    )
    .await;

    Ok(())
}

async fn send_worker_command(
    state: &AppState,
    worker_id: WorkerId,
    request_id: &str,
    kind: vlog_queue::WorkerCommandKind,
) -> bool {
    let record = vlog_queue::EventRecord::WorkerCommand { timestamp: Utc::now(), request_id: request_id.to_string(), command: kind };
    state.bus.publish(&vlog_queue::worker_commands_channel(worker_id), &record).await
}

pub async fn restart_worker(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Extension(request_id): Extension<String>,
    headers: HeaderMap,
    addr: Option<ConnectInfo<SocketAddr>>,
    Path(worker_id): Path<WorkerId>,
) -> ApiResult<()> {
    state.workers.get(worker_id).await?;
    let delivered = send_worker_command(&state, worker_id, &request_id, vlog_queue::WorkerCommandKind::Restart).await;

    audit(
        &state,
        &request_id,
        AuditAction::WorkerRestart,
        "worker",
        worker_id.to_string(),
        None,
        json!({ "delivered": delivered }),
        delivered,
        None,
        client_ip(addr.as_ref().map(|c| &c.0), &headers, &state.config.trusted_proxies),
        user_agent(&headers),
    )
    .await;

    Ok(())
}

pub async fn update_worker(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Extension(request_id): Extension<String>,
    headers: HeaderMap,
    addr: Option<ConnectInfo<SocketAddr>>,
    Path(worker_id): Path<WorkerId>,
) -> ApiResult<()> {
    state.workers.get(worker_id).await?;
    let delivered = send_worker_command(&state, worker_id, &request_id, vlog_queue::WorkerCommandKind::Update).await;

    audit(
        &state,
        &request_id,
        AuditAction::WorkerUpdate,
        "worker",
        worker_id.to_string(),
        None,
        json!({ "delivered": delivered }),
        delivered,
        None,
        client_ip(addr.as_ref().map(|c| &c.0), &headers, &state.config.trusted_proxies),
        user_agent(&headers),
    )
    .await;

    Ok(())
}

const IMMEDIATE_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

async fn await_immediate_command(
    state: &AppState,
    worker_id: WorkerId,
    kind: vlog_queue::WorkerCommandKind,
) -> ApiResult<Value> {
    state.workers.get(worker_id).await?;
    let request_id = uuid::Uuid::new_v4().to_string();
    let response_channel = vlog_queue::worker_response_channel(worker_id, &request_id);

    let mut stream = state.bus.listen(&response_channel).await?;
    send_worker_command(state, worker_id, &request_id, kind).await;

    match tokio::time::timeout(IMMEDIATE_COMMAND_TIMEOUT, stream.next()).await {
        Ok(Some(vlog_queue::EventRecord::WorkerCommandResponse { payload, .. })) => Ok(payload),
        _ => Err(ApiError::validation("worker did not respond in time")),
    }
}

pub async fn worker_logs(State(state): State<AppState>, _admin: AdminAuth, Path(worker_id): Path<WorkerId>) -> ApiResult<Json<Value>> {
    Ok(Json(await_immediate_command(&state, worker_id, vlog_queue::WorkerCommandKind::GetLogs).await?))
}

pub async fn worker_metrics(State(state): State<AppState>, _admin: AdminAuth, Path(worker_id): Path<WorkerId>) -> ApiResult<Json<Value>> {
    Ok(Json(await_immediate_command(&state, worker_id, vlog_queue::WorkerCommandKind::GetMetrics).await?))
}

// --- Settings ------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ListSettingsQuery {
    category: String,
}

pub async fn list_settings(State(state): State<AppState>, _admin: AdminAuth, Query(q): Query<ListSettingsQuery>) -> ApiResult<Json<Vec<Setting>>> {
    Ok(Json(state.settings.list_by_category(&q.category).await?))
}

pub async fn get_setting(State(state): State<AppState>, _admin: AdminAuth, Path(key): Path<String>) -> ApiResult<Json<Setting>> {
    Ok(Json(state.settings.get(&key).await?))
}

#[derive(Deserialize)]
pub struct SetSettingRequest {
    value: SettingValue,
}

pub async fn set_setting(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Extension(request_id): Extension<String>,
    headers: HeaderMap,
    addr: Option<ConnectInfo<SocketAddr>>,
    Path(key): Path<String>,
    Json(req): Json<SetSettingRequest>,
) -> ApiResult<Json<Setting>> {
    state.settings.set(&key, req.value.clone(), "admin").await?;
    let setting = state.settings.get(&key).await?;

    audit(
        &state,
        &request_id,
        AuditAction::SettingsChange,
        "setting",
        key,
        None,
        json!({ "new_value": req.value }),
        true,
        None,
        client_ip(addr.as_ref().map(|c| &c.0), &headers, &state.config.trusted_proxies),
        user_agent(&headers),
    )
    .await;

    Ok(Json(setting))
}

// --- Audit query -----------------------------------------------------------------

#[derive(Deserialize)]
pub struct AuditQuery {
    resource_type: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

pub async fn query_audit_log(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Query(q): Query<AuditQuery>,
) -> ApiResult<Json<Vec<AuditLogEntry>>> {
    let limit = q.limit.unwrap_or(100).clamp(1, 1000);
    let offset = q.offset.unwrap_or(0).max(0);
    Ok(Json(state.audit.query(q.resource_type.as_deref(), limit, offset).await?))
}
