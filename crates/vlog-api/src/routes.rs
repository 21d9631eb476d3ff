//! API routes (§6): public, worker, admin, static asset, and health/metrics
//! surfaces, each with its own middleware needs.

use axum::middleware;
use axum::routing::{delete, get, patch, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::handlers::admin::{
    create_video, delete_video, get_setting, get_video, get_worker, list_settings, list_videos, list_workers,
    login, query_audit_log, restart_worker, restore_video, retranscode_video, retry_video, revoke_worker,
    set_setting, update_worker, worker_logs, worker_metrics,
};
use crate::handlers::health::{health, ready};
use crate::handlers::public::{
    get_category, get_progress, get_video as public_get_video, list_categories, list_videos as public_list_videos,
};
use crate::handlers::static_files::serve_asset;
use crate::handlers::worker;
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, rate_limit_middleware, request_id, request_logging, security_headers, RateLimiterCache};
use crate::state::AppState;

/// Builds the full router. `metrics_handle` is `None` when the Prometheus
/// exporter is disabled.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let public_routes = Router::new()
        .route("/api/videos", get(public_list_videos))
        .route("/api/videos/:slug", get(public_get_video))
        .route("/api/videos/:slug/progress", get(get_progress))
        .route("/api/categories", get(list_categories))
        .route("/api/categories/:slug", get(get_category));

    let worker_routes = Router::new()
        .route("/api/worker/register", post(worker::register))
        .route("/api/worker/heartbeat", post(worker::heartbeat))
        .route("/api/worker/claim", post(worker::claim))
        .route("/api/worker/source/:video_id", get(worker::download_source))
        .route("/api/worker/:job_id/progress", post(worker::progress))
        .route("/api/worker/upload-segment/:video_id", post(worker::upload_segment))
        .route("/api/worker/finalize/:video_id/:quality", post(worker::finalize))
        .route("/api/worker/:job_id/complete", post(worker::complete))
        .route("/api/worker/:job_id/fail", post(worker::fail));

    let admin_routes = Router::new()
        .route("/api/admin/login", post(login))
        .route("/api/admin/videos", get(list_videos).post(create_video))
        .route("/api/admin/videos/:video_id", get(get_video).delete(delete_video))
        .route("/api/admin/videos/:video_id/restore", post(restore_video))
        .route("/api/admin/videos/:video_id/retry", post(retry_video))
        .route("/api/admin/videos/:video_id/retranscode", post(retranscode_video))
        .route("/api/admin/workers", get(list_workers))
        .route("/api/admin/workers/:worker_id", get(get_worker).delete(revoke_worker))
        .route("/api/admin/workers/:worker_id/restart", post(restart_worker))
        .route("/api/admin/workers/:worker_id/update", post(update_worker))
        .route("/api/admin/workers/:worker_id/logs", get(worker_logs))
        .route("/api/admin/workers/:worker_id/metrics", get(worker_metrics))
        .route("/api/admin/settings", get(list_settings))
        .route("/api/admin/settings/:key", get(get_setting).patch(set_setting))
        .route("/api/admin/audit-log", get(query_audit_log));

    let static_routes = Router::new().route("/videos/:slug/*tail", get(serve_asset));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    let rate_limiter = std::sync::Arc::new(RateLimiterCache::new(state.config.rate_limit_rps, state.config.trusted_proxies.clone()));

    let rate_limited = Router::new()
        .merge(worker_routes)
        .merge(admin_routes)
        .layer(middleware::from_fn_with_state(rate_limiter, rate_limit_middleware));

    Router::new()
        .merge(public_routes)
        .merge(static_routes)
        .merge(rate_limited)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
