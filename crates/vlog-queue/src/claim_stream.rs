//! The durable claim-stream tier (§4.2, "Durability tier").
//!
//! `claim_next_job` in `vlog-catalog` is the authoritative source of truth
//! for which Job a worker holds; this module gives the dispatcher a second,
//! independent view of the same fact via a Redis Streams consumer group, so
//! the reaper can detect in-flight work the substrate still shows pending
//! even if the Catalog's own `claim_expires_at` bookkeeping and the bus ever
//! diverge (substrate restart, partial write). The Catalog remains
//! authoritative; this stream is reconciliation input, never a second
//! dispatch path.

use redis::AsyncCommands;
use tracing::{debug, info};
use uuid::Uuid;
use vlog_models::ids::{JobId, WorkerId};

use crate::error::QueueResult;

/// One durable claim-stream entry: a Job dispatched to a Worker.
#[derive(Debug, Clone)]
pub struct PendingClaim {
    pub message_id: String,
    pub job_id: JobId,
    pub worker_id: WorkerId,
    pub idle_ms: u64,
}

pub struct ClaimStream {
    client: redis::Client,
    stream_name: String,
    consumer_group: String,
}

impl ClaimStream {
    pub fn new(redis_url: &str, stream_name: impl Into<String>, consumer_group: impl Into<String>) -> QueueResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            stream_name: stream_name.into(),
            consumer_group: consumer_group.into(),
        })
    }

    /// Creates the consumer group if it does not already exist.
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.stream_name)
            .arg(&self.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!(group = %self.consumer_group, "created claim-stream consumer group"),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(group = %self.consumer_group, "claim-stream consumer group already exists");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(())
    }

    /// Records a dispatch: a Job has just been claimed by a Worker
    /// according to the Catalog. Called immediately after a successful
    /// `claim_next_job`.
    pub async fn record_claim(&self, job_id: JobId, worker_id: WorkerId) -> QueueResult<String> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let message_id: String = redis::cmd("XADD")
            .arg(&self.stream_name)
            .arg("*")
            .arg("job_id")
            .arg(job_id.to_string())
            .arg("worker_id")
            .arg(worker_id.to_string())
            .query_async(&mut conn)
            .await?;

        Ok(message_id)
    }

    /// Acknowledges a claim that the Catalog has since resolved (completed,
    /// failed, or reaped), removing its stream entry.
    pub async fn ack(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        redis::cmd("XACK")
            .arg(&self.stream_name)
            .arg(&self.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;
        redis::cmd("XDEL")
            .arg(&self.stream_name)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        Ok(())
    }

    /// Lists entries the consumer group still shows pending, for the
    /// reaper to cross-check against the Catalog's own EXPIRED set.
    pub async fn pending(&self, count: usize) -> QueueResult<Vec<PendingClaim>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let pending_count: usize = redis::cmd("XPENDING")
            .arg(&self.stream_name)
            .arg(&self.consumer_group)
            .query_async(&mut conn)
            .await
            .map(|reply: redis::streams::StreamPendingReply| reply.count())
            .unwrap_or(0);

        if pending_count == 0 {
            return Ok(Vec::new());
        }

        let details: Vec<Vec<redis::Value>> = redis::cmd("XPENDING")
            .arg(&self.stream_name)
            .arg(&self.consumer_group)
            .arg("-")
            .arg("+")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        let mut claims = Vec::new();
        for detail in details {
            if detail.len() < 4 {
                continue;
            }
            let (Some(redis::Value::BulkString(id_bytes)), Some(redis::Value::Int(idle_ms))) =
                (detail.get(0), detail.get(2))
            else {
                continue;
            };
            let Ok(message_id) = String::from_utf8(id_bytes.clone()) else {
                continue;
            };

            let fields: Vec<(String, String)> = redis::cmd("XRANGE")
                .arg(&self.stream_name)
                .arg(&message_id)
                .arg(&message_id)
                .query_async::<Vec<(String, Vec<(String, String)>)>>(&mut conn)
                .await
                .ok()
                .and_then(|mut rows| rows.pop())
                .map(|(_, fields)| fields)
                .unwrap_or_default();

            let job_id = fields.iter().find(|(k, _)| k == "job_id").and_then(|(_, v)| v.parse::<Uuid>().ok());
            let worker_id = fields.iter().find(|(k, _)| k == "worker_id").and_then(|(_, v)| v.parse::<Uuid>().ok());

            if let (Some(job_id), Some(worker_id)) = (job_id, worker_id) {
                claims.push(PendingClaim {
                    message_id,
                    job_id: JobId::from(job_id),
                    worker_id: WorkerId::from(worker_id),
                    idle_ms: *idle_ms as u64,
                });
            }
        }

        Ok(claims)
    }

    /// Transfers ownership of stale pending entries to `consumer_name`,
    /// used when the reaper wants to mark them as handled by itself before
    /// acking.
    pub async fn reclaim(&self, consumer_name: &str, message_ids: &[String], min_idle_ms: u64) -> QueueResult<()> {
        if message_ids.is_empty() {
            return Ok(());
        }
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let mut cmd = redis::cmd("XCLAIM");
        cmd.arg(&self.stream_name).arg(&self.consumer_group).arg(consumer_name).arg(min_idle_ms);
        for id in message_ids {
            cmd.arg(id);
        }
        cmd.arg("JUSTID");
        let _: redis::Value = cmd.query_async(&mut conn).await?;

        Ok(())
    }
}
