//! Coordinator configuration, loaded once at startup (§10 "Configuration").
//! Catalog, storage, and event-bus connection settings live in their own
//! crates' `*Config::from_env()`; this covers only what the Coordinator
//! itself needs to bootstrap.

use std::net::IpAddr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub rate_limit_rps: u32,
    pub request_timeout: Duration,
    pub max_body_size: usize,
    pub environment: String,
    /// Shared secret accepted via `X-Admin-Secret` as an alternative to a
    /// session cookie (§4.8).
    pub admin_secret: Option<String>,
    pub session_lifetime: Duration,
    pub claim_lease: Duration,
    pub reap_interval: Duration,
    pub stale_after: Duration,
    /// Only `X-Forwarded-For` values from these proxy IPs are trusted for
    /// rate-limiting and audit client IPs.
    pub trusted_proxies: Vec<IpAddr>,
    pub redis_url: String,
    pub metrics_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            request_timeout: Duration::from_secs(30),
            max_body_size: 100 * 1024 * 1024,
            environment: "development".to_string(),
            admin_secret: None,
            session_lifetime: Duration::from_secs(12 * 3600),
            claim_lease: Duration::from_secs(300),
            reap_interval: Duration::from_secs(30),
            stale_after: Duration::from_secs(600),
            trusted_proxies: Vec::new(),
            redis_url: "redis://localhost:6379".to_string(),
            metrics_enabled: true,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(default.host),
            port: std::env::var("API_PORT").ok().and_then(|s| s.parse().ok()).unwrap_or(default.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.cors_origins),
            rate_limit_rps: std::env::var("RATE_LIMIT_RPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.rate_limit_rps),
            request_timeout: std::env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.request_timeout),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(default.environment),
            admin_secret: std::env::var("ADMIN_SECRET").ok().filter(|s| !s.is_empty()),
            session_lifetime: std::env::var("SESSION_LIFETIME_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.session_lifetime),
            claim_lease: std::env::var("CLAIM_LEASE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.claim_lease),
            reap_interval: std::env::var("REAP_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.reap_interval),
            stale_after: std::env::var("STALE_AFTER_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.stale_after),
            trusted_proxies: std::env::var("TRUSTED_PROXIES")
                .map(|s| s.split(',').filter_map(|ip| ip.trim().parse().ok()).collect())
                .unwrap_or(default.trusted_proxies),
            redis_url: std::env::var("REDIS_URL").unwrap_or(default.redis_url),
            metrics_enabled: std::env::var("METRICS_ENABLED").map(|v| v == "true" || v == "1").unwrap_or(default.metrics_enabled),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}
