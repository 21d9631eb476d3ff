//! Periodic Catalog reaper (§4.3): expired claims, stalled jobs, and workers
//! that stopped heartbeating are all swept on a fixed interval rather than
//! detected inline, so a crashed worker never permanently wedges a Job.

use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::metrics;
use crate::state::AppState;

pub fn spawn_reaper(state: AppState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(state.config.reap_interval);
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            ticker.tick().await;
            run_once(&state).await;
        }
    })
}

async fn run_once(state: &AppState) {
    let now = Utc::now();
    let stale_after = Duration::from_std(state.config.stale_after).unwrap_or(Duration::seconds(600));
    let offline_after = stale_after;

    let claims_expired = match state.jobs.reap_expired_claims(now).await {
        Ok(n) => n,
        Err(e) => {
            warn!(error = %e, "reap_expired_claims failed");
            0
        }
    };
    let jobs_stale = match state.jobs.reap_stale_jobs(now, stale_after).await {
        Ok(n) => n,
        Err(e) => {
            warn!(error = %e, "reap_stale_jobs failed");
            0
        }
    };
    let workers_offline = match state.workers.mark_stale_offline(now, offline_after).await {
        Ok(n) => n,
        Err(e) => {
            warn!(error = %e, "mark_stale_offline failed");
            0
        }
    };

    metrics::record_reap(claims_expired, jobs_stale, workers_offline);

    if claims_expired > 0 || jobs_stale > 0 || workers_offline > 0 {
        info!(claims_expired, jobs_stale, workers_offline, "reaper swept");
    }
}
