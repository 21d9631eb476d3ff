//! Circuit breaker guarding the bus substrate (§4.2).
//!
//! On three consecutive failures the breaker opens for
//! `min(300s, 30s * 2^(n-3))` with +/-20% jitter; a successful operation
//! while closed or half-open resets the failure counter.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use rand::Rng;

const FAILURE_THRESHOLD: u32 = 3;
const BASE_BACKOFF_SECS: u64 = 30;
const MAX_BACKOFF_SECS: u64 = 300;

#[derive(Clone, Debug, PartialEq)]
pub enum CircuitState {
    Closed,
    Open { opened_at: Instant, reopen_after: Duration },
    HalfOpen,
}

#[derive(Clone)]
pub struct CircuitBreaker {
    state: Arc<RwLock<CircuitState>>,
    consecutive_failures: Arc<RwLock<u32>>,
}

fn backoff_with_jitter(consecutive_failures: u32) -> Duration {
    let raw = BASE_BACKOFF_SECS * 2u64.saturating_pow(consecutive_failures.saturating_sub(FAILURE_THRESHOLD));
    let capped = raw.min(MAX_BACKOFF_SECS) as f64;
    let jitter_frac = rand::rng().random_range(-0.2..=0.2);
    let jittered = (capped * (1.0 + jitter_frac)).max(1.0);
    Duration::from_secs_f64(jittered)
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(CircuitState::Closed)),
            consecutive_failures: Arc::new(RwLock::new(0)),
        }
    }

    /// `true` if the caller may attempt the operation.
    pub fn allow(&self) -> bool {
        let mut state = self.state.write().unwrap();
        match *state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open { opened_at, reopen_after } => {
                if Instant::now().duration_since(opened_at) >= reopen_after {
                    *state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn success(&self) {
        *self.consecutive_failures.write().unwrap() = 0;
        *self.state.write().unwrap() = CircuitState::Closed;
    }

    pub fn failure(&self) {
        let mut failures = self.consecutive_failures.write().unwrap();
        *failures += 1;
        if *failures >= FAILURE_THRESHOLD {
            let reopen_after = backoff_with_jitter(*failures);
            *self.state.write().unwrap() = CircuitState::Open {
                opened_at: Instant::now(),
                reopen_after,
            };
            tracing::warn!(
                consecutive_failures = *failures,
                reopen_after_secs = reopen_after.as_secs_f64(),
                "event bus circuit breaker opened"
            );
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state.read().unwrap().clone()
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_allows_and_stays_closed_on_success() {
        let cb = CircuitBreaker::new();
        assert!(cb.allow());
        cb.success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let cb = CircuitBreaker::new();
        cb.failure();
        cb.failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.failure();
        assert!(matches!(cb.state(), CircuitState::Open { .. }));
        assert!(!cb.allow_without_transition());
    }

    #[test]
    fn backoff_is_capped_and_jittered_within_20_percent() {
        for n in 3..12 {
            let d = backoff_with_jitter(n);
            let uncapped = BASE_BACKOFF_SECS * 2u64.pow(n - 3);
            let expected_center = uncapped.min(MAX_BACKOFF_SECS) as f64;
            assert!(d.as_secs_f64() >= expected_center * 0.8 - 0.5);
            assert!(d.as_secs_f64() <= expected_center * 1.2 + 0.5);
        }
    }

    impl CircuitBreaker {
        /// Test-only peek that doesn't perform the half-open transition.
        fn allow_without_transition(&self) -> bool {
            matches!(*self.state.read().unwrap(), CircuitState::Closed | CircuitState::HalfOpen)
        }
    }
}
