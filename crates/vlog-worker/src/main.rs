//! Worker Agent binary.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vlog_queue::EventBus;
use vlog_worker::{WorkerAgent, WorkerConfig};

#[tokio::main]
async fn main() {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("failed to install rustls crypto provider");

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive("vlog=info".parse().unwrap()))
        .init();

    info!("starting vlog-worker");

    let config = WorkerConfig::from_env();
    info!(?config, "worker config loaded");

    let redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    let bus = match EventBus::new(&redis_url) {
        Ok(bus) => Some(Arc::new(bus)),
        Err(e) => {
            warn!(error = %e, "event bus unavailable, worker commands will not be received");
            None
        }
    };

    let agent = WorkerAgent::new(config, bus);
    let shutdown = agent.shutdown_handle();

    let signal_task = tokio::spawn(async move {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
        info!("shutdown signal received");
        shutdown.store(true, std::sync::atomic::Ordering::SeqCst);
    });

    if let Err(e) = agent.run().await {
        error!(error = %e, "worker agent exited with error");
        std::process::exit(1);
    }

    signal_task.abort();
    info!("worker shutdown complete");
}
