//! Worker metrics collection.
//!
//! Standardized metrics for monitoring claim/execute throughput:
//! - Job outcome counters
//! - Segment upload counters
//! - Per-quality transcode latency

use metrics::{counter, histogram};

pub mod names {
    pub const JOBS_TOTAL: &str = "worker_jobs_total";
    pub const SEGMENTS_UPLOADED_TOTAL: &str = "worker_segments_uploaded_total";
    pub const QUALITY_LATENCY_SECONDS: &str = "worker_quality_latency_seconds";
}

pub fn record_job(outcome: &str) {
    counter!(names::JOBS_TOTAL, "outcome" => outcome.to_string()).increment(1);
}

pub fn record_segments_uploaded(quality: &str, count: u32) {
    counter!(names::SEGMENTS_UPLOADED_TOTAL, "quality" => quality.to_string()).increment(count as u64);
}

pub fn record_quality_latency(quality: &str, latency_secs: f64) {
    histogram!(names::QUALITY_LATENCY_SECONDS, "quality" => quality.to_string()).record(latency_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_are_namespaced() {
        assert!(names::JOBS_TOTAL.starts_with("worker_"));
        assert!(names::SEGMENTS_UPLOADED_TOTAL.starts_with("worker_"));
        assert!(names::QUALITY_LATENCY_SECONDS.starts_with("worker_"));
    }
}
