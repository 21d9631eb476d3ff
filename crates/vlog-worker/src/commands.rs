//! Worker command listener (§4.4): subscribes to the worker's own command
//! channel and the broadcast channel, dispatching `restart`/`stop`/`update`
//! to a pending queue drained between jobs, and replying to
//! `get_logs`/`get_metrics` immediately without touching the claim loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use futures_util::StreamExt;
use tokio::sync::Mutex;
use tracing::{info, warn};
use vlog_queue::{
    worker_commands_channel, worker_response_channel, EventBus, EventRecord, WorkerCommandKind, WORKERS_COMMANDS_CHANNEL,
};
use vlog_models::ids::WorkerId;

/// Commands queued for execution between jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingCommand {
    Restart,
    Stop,
    Update,
}

#[derive(Default)]
pub struct PendingQueue {
    inner: Mutex<Vec<PendingCommand>>,
}

impl PendingQueue {
    pub async fn push(&self, cmd: PendingCommand) {
        self.inner.lock().await.push(cmd);
    }

    /// Takes the next queued command, if any, clearing it from the queue.
    pub async fn pop(&self) -> Option<PendingCommand> {
        self.inner.lock().await.pop()
    }
}

/// Runs until the bus subscription ends (bus circuit open / process shutdown).
/// `stop_flag` is set when a `stop` command is observed, so the main loop
/// can check it without draining the pending queue itself.
pub async fn listen(
    bus: Arc<EventBus>,
    worker_id: WorkerId,
    pending: Arc<PendingQueue>,
    stop_flag: Arc<AtomicBool>,
) {
    let own_channel = worker_commands_channel(worker_id);
    let streams = tokio::join!(bus.listen(&own_channel), bus.listen(WORKERS_COMMANDS_CHANNEL));

    let (own_stream, broadcast_stream) = match streams {
        (Ok(a), Ok(b)) => (a, b),
        (Err(e), _) | (_, Err(e)) => {
            warn!(error = %e, "command listener failed to subscribe");
            return;
        }
    };

    let mut merged = futures_util::stream::select(own_stream, broadcast_stream);
    while let Some(record) = merged.next().await {
        if let EventRecord::WorkerCommand { request_id, command, .. } = record {
            handle(&bus, worker_id, request_id, command, &pending, &stop_flag).await;
        }
    }
}

async fn handle(
    bus: &EventBus,
    worker_id: WorkerId,
    request_id: String,
    command: WorkerCommandKind,
    pending: &PendingQueue,
    stop_flag: &AtomicBool,
) {
    if command.is_pending() {
        let mapped = match command {
            WorkerCommandKind::Restart => PendingCommand::Restart,
            WorkerCommandKind::Stop => PendingCommand::Stop,
            WorkerCommandKind::Update => PendingCommand::Update,
            _ => unreachable!("is_pending() only true for these three"),
        };
        if mapped == PendingCommand::Stop {
            stop_flag.store(true, Ordering::SeqCst);
        }
        info!(?mapped, "queued command for between-jobs execution");
        pending.push(mapped).await;
        return;
    }

    let payload = match command {
        WorkerCommandKind::GetLogs => serde_json::json!({ "logs": [] }),
        WorkerCommandKind::GetMetrics => serde_json::json!({ "status": "ok" }),
        _ => unreachable!("handled above"),
    };

    let response = EventRecord::WorkerCommandResponse {
        timestamp: Utc::now(),
        request_id: request_id.clone(),
        worker_id,
        payload,
    };
    bus.publish(&worker_response_channel(worker_id, &request_id), &response).await;
}
