//! Catalog metrics collection.
//!
//! Standardized metrics for monitoring Catalog operations:
//! - Query counters by operation and outcome
//! - Latency histograms
//! - Retry counters

use metrics::{counter, histogram};

pub mod names {
    pub const QUERIES_TOTAL: &str = "catalog_queries_total";
    pub const RETRIES_TOTAL: &str = "catalog_retries_total";
    pub const LATENCY_SECONDS: &str = "catalog_latency_seconds";
}

/// Record metrics for a completed Catalog query.
pub fn record_query(operation: &str, outcome: &str, latency_ms: f64) {
    counter!(
        names::QUERIES_TOTAL,
        "operation" => operation.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);
}

/// Record a retry attempt.
pub fn record_retry(operation: &str) {
    counter!(
        names::RETRIES_TOTAL,
        "operation" => operation.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_are_namespaced() {
        assert!(names::QUERIES_TOTAL.starts_with("catalog_"));
        assert!(names::RETRIES_TOTAL.starts_with("catalog_"));
        assert!(names::LATENCY_SECONDS.starts_with("catalog_"));
    }
}
