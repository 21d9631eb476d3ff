//! Worker Agent configuration (§4.4, §4.5).

use std::time::Duration;

/// Worker Agent configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Coordinator base URL (e.g. `https://coordinator.internal`).
    pub coordinator_url: String,
    /// Path to the worker's persisted identity (worker_id + api_key).
    pub identity_path: String,
    /// Work directory for downloaded sources and in-progress segment output.
    pub work_dir: String,
    /// Human-friendly name reported at registration.
    pub worker_name: Option<String>,

    /// Maximum concurrent FFmpeg processes per worker (`max_ffmpeg_processes`).
    pub max_ffmpeg_processes: usize,

    /// Heartbeat interval (`T_hb`).
    pub heartbeat_interval: Duration,
    /// Poll interval between claim attempts when idle (`T_poll`).
    pub claim_poll_interval: Duration,

    /// Segment watcher poll interval (`T_poll_seg`), default ~1s.
    pub segment_poll_interval: Duration,
    /// Stability count before a segment is considered done writing (`N_stable`).
    pub segment_stable_count: u32,
    /// Bounded segment queue capacity between Watcher and Uploader.
    pub segment_queue_capacity: usize,
    /// Maximum re-queue attempts for a segment before it's hard-failed.
    pub max_segment_retries: u32,

    /// Graceful shutdown timeout once SIGTERM/SIGINT is received.
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            coordinator_url: "http://localhost:8080".to_string(),
            identity_path: "/tmp/vlog-worker/identity.json".to_string(),
            work_dir: "/tmp/vlog-worker".to_string(),
            worker_name: None,
            max_ffmpeg_processes: 4,
            heartbeat_interval: Duration::from_secs(15),
            claim_poll_interval: Duration::from_secs(5),
            segment_poll_interval: Duration::from_secs(1),
            segment_stable_count: 2,
            segment_queue_capacity: 10,
            max_segment_retries: 3,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            coordinator_url: std::env::var("VLOG_WORKER_COORDINATOR_URL").unwrap_or(default.coordinator_url),
            identity_path: std::env::var("VLOG_WORKER_IDENTITY_PATH").unwrap_or(default.identity_path),
            work_dir: std::env::var("VLOG_WORKER_WORK_DIR").unwrap_or(default.work_dir),
            worker_name: std::env::var("VLOG_WORKER_NAME").ok(),
            max_ffmpeg_processes: env_parsed("VLOG_WORKER_MAX_FFMPEG_PROCESSES", default.max_ffmpeg_processes),
            heartbeat_interval: Duration::from_secs(env_parsed("VLOG_WORKER_HEARTBEAT_SECS", default.heartbeat_interval.as_secs())),
            claim_poll_interval: Duration::from_secs(env_parsed("VLOG_WORKER_CLAIM_POLL_SECS", default.claim_poll_interval.as_secs())),
            segment_poll_interval: Duration::from_millis(env_parsed(
                "VLOG_WORKER_SEGMENT_POLL_MS",
                default.segment_poll_interval.as_millis() as u64,
            )),
            segment_stable_count: env_parsed("VLOG_WORKER_SEGMENT_STABLE_COUNT", default.segment_stable_count),
            segment_queue_capacity: env_parsed("VLOG_WORKER_SEGMENT_QUEUE_CAPACITY", default.segment_queue_capacity),
            max_segment_retries: env_parsed("VLOG_WORKER_MAX_SEGMENT_RETRIES", default.max_segment_retries),
            shutdown_timeout: Duration::from_secs(env_parsed("VLOG_WORKER_SHUTDOWN_TIMEOUT_SECS", default.shutdown_timeout.as_secs())),
        }
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.segment_stable_count, 2);
        assert_eq!(config.segment_queue_capacity, 10);
        assert_eq!(config.max_segment_retries, 3);
    }
}
