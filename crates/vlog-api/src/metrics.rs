//! Prometheus metrics for the Coordinator.

use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new().install_recorder().expect("failed to install prometheus recorder")
}

pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "vlog_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vlog_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vlog_http_requests_in_flight";
    pub const JOBS_CLAIMED_TOTAL: &str = "vlog_jobs_claimed_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "vlog_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vlog_jobs_failed_total";
    pub const REAPER_CLAIMS_EXPIRED_TOTAL: &str = "vlog_reaper_claims_expired_total";
    pub const REAPER_JOBS_STALE_TOTAL: &str = "vlog_reaper_jobs_stale_total";
    pub const REAPER_WORKERS_OFFLINE_TOTAL: &str = "vlog_reaper_workers_offline_total";
    pub const RATE_LIMIT_HITS_TOTAL: &str = "vlog_rate_limit_hits_total";
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [("method", method.to_string()), ("path", sanitize_path(path)), ("status", status.to_string())];
    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_job_claimed() {
    counter!(names::JOBS_CLAIMED_TOTAL).increment(1);
}

pub fn record_job_completed() {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
}

pub fn record_job_failed() {
    counter!(names::JOBS_FAILED_TOTAL).increment(1);
}

pub fn record_reap(claims_expired: u64, jobs_stale: u64, workers_offline: u64) {
    counter!(names::REAPER_CLAIMS_EXPIRED_TOTAL).increment(claims_expired);
    counter!(names::REAPER_JOBS_STALE_TOTAL).increment(jobs_stale);
    counter!(names::REAPER_WORKERS_OFFLINE_TOTAL).increment(workers_offline);
}

pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Collapses path segments that carry an identifier (UUIDs, slugs) so
/// metric cardinality doesn't grow per-video/per-worker.
fn sanitize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    let mut out = Vec::with_capacity(segments.len());
    for (i, seg) in segments.iter().enumerate() {
        let looks_like_id = seg.len() >= 8
            && (seg.chars().all(|c| c.is_ascii_hexdigit() || c == '-') || i > 0 && matches!(segments[i - 1], "videos" | "worker" | "jobs" | "keys"));
        if looks_like_id && *seg != "videos" && *seg != "worker" {
            out.push(":id");
        } else {
            out.push(seg);
        }
    }
    out.join("/")
}

pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();
    record_http_request(&method, &path, status, duration);

    response
}
