//! The typed pub/sub surface (§4.2).
//!
//! `publish` is fire-and-forget and never blocks a caller on bus trouble: it
//! is guarded by a [`CircuitBreaker`] that opens after three consecutive
//! failures, at which point `publish` returns `false` immediately without
//! attempting the network call. A periodic health check pings the
//! substrate at most every `health_check_interval` and caches the result.

use std::pin::Pin;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use futures_util::{Stream, StreamExt};
use redis::AsyncCommands;
use tracing::{debug, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::error::QueueResult;
use crate::event::EventRecord;

pub struct EventBus {
    client: redis::Client,
    breaker: CircuitBreaker,
    health_check_interval: Duration,
    last_health_check: Mutex<Option<(Instant, bool)>>,
}

impl EventBus {
    pub fn new(redis_url: &str) -> QueueResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            breaker: CircuitBreaker::new(),
            health_check_interval: Duration::from_secs(30),
            last_health_check: Mutex::new(None),
        })
    }

    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    /// Publish a record. Returns `false` (never an error) if the circuit is
    /// open or the publish itself fails — callers must not block on bus
    /// trouble.
    pub async fn publish(&self, channel: &str, record: &EventRecord) -> bool {
        if !self.breaker.allow() {
            debug!(channel, "publish skipped, circuit breaker open");
            return false;
        }

        let payload = match serde_json::to_string(record) {
            Ok(p) => p,
            Err(e) => {
                warn!(channel, error = %e, "failed to serialize event record");
                return false;
            }
        };

        match self.publish_raw(channel, &payload).await {
            Ok(()) => {
                self.breaker.success();
                true
            }
            Err(e) => {
                warn!(channel, error = %e, "event bus publish failed");
                self.breaker.failure();
                false
            }
        }
    }

    async fn publish_raw(&self, channel: &str, payload: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.publish::<_, _, ()>(channel, payload).await?;
        Ok(())
    }

    /// Pings the substrate, caching the result for `health_check_interval`
    /// so concurrent callers collapse into a single real probe.
    pub async fn health_check(&self) -> bool {
        if let Some((checked_at, healthy)) = *self.last_health_check.lock().unwrap() {
            if checked_at.elapsed() < self.health_check_interval {
                return healthy;
            }
        }

        let healthy = match self.client.get_multiplexed_async_connection().await {
            Ok(mut conn) => redis::cmd("PING").query_async::<String>(&mut conn).await.is_ok(),
            Err(_) => false,
        };

        *self.last_health_check.lock().unwrap() = Some((Instant::now(), healthy));
        healthy
    }

    /// Subscribes to a single channel or, when `channel_or_pattern`
    /// contains a glob character, a pattern spanning multiple channels.
    /// Yields parsed [`EventRecord`]s only: subscribe/unsubscribe
    /// acknowledgements and non-JSON payloads are silently skipped.
    pub async fn listen(
        &self,
        channel_or_pattern: &str,
    ) -> QueueResult<Pin<Box<dyn Stream<Item = EventRecord> + Send>>> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        let is_pattern = channel_or_pattern.contains(['*', '?', '[']);

        if is_pattern {
            pubsub.psubscribe(channel_or_pattern).await?;
        } else {
            pubsub.subscribe(channel_or_pattern).await?;
        }

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            let payload: String = msg.get_payload().ok()?;
            serde_json::from_str::<EventRecord>(&payload).ok()
        });

        Ok(Box::pin(stream))
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}
