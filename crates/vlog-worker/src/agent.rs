//! Worker Agent (§4.4): identity bootstrap, heartbeat loop, command
//! listener, and the main claim-execute-sleep loop, with cooperative
//! shutdown on SIGTERM/SIGINT.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{error, info, warn};
use vlog_media::{TranscodingConfig, EncodeTask};
use vlog_models::ids::WorkerId;
use vlog_models::job::Job;
use vlog_models::video::{Codec, Quality};
use vlog_models::worker::WorkerType;
use vlog_queue::EventBus;

use crate::client::{ClaimResponse, CompleteRequest, CoordinatorClient, FailRequest, HeartbeatRequest, ProgressRequest, RegisterRequest};
use crate::commands::{self, PendingCommand, PendingQueue};
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::identity::{self, WorkerIdentity};
use crate::pipeline::run_quality_pipeline;

/// The full quality ladder offered to `plan()`; the Executor itself never
/// upscales past the source, so requesting all of them is always safe.
const FULL_LADDER: &[Quality] = &[
    Quality::P360,
    Quality::P480,
    Quality::P720,
    Quality::P1080,
    Quality::P1440,
    Quality::P2160,
];

pub struct WorkerAgent {
    config: WorkerConfig,
    client: CoordinatorClient,
    bus: Option<Arc<EventBus>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerAgent {
    pub fn new(config: WorkerConfig, bus: Option<Arc<EventBus>>) -> Self {
        let client = CoordinatorClient::new(config.coordinator_url.clone());
        Self {
            config,
            client,
            bus,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Runs forever until `shutdown` is set, either externally or by a
    /// `stop` command from the bus.
    pub async fn run(&self) -> WorkerResult<()> {
        let identity = self.bootstrap_identity().await?;
        let worker_id = WorkerId::from(
            uuid::Uuid::parse_str(&identity.worker_id).map_err(|e| WorkerError::config_error(e.to_string()))?,
        );

        let pending = Arc::new(PendingQueue::default());
        let mut handles = Vec::new();

        if let Some(bus) = self.bus.clone() {
            let pending = pending.clone();
            let shutdown = self.shutdown.clone();
            handles.push(tokio::spawn(commands::listen(bus, worker_id, pending, shutdown)));
        }

        {
            let client = self.client.clone();
            let api_key = identity.api_key.clone();
            let heartbeat_interval = self.config.heartbeat_interval;
            let shutdown = self.shutdown.clone();
            handles.push(tokio::spawn(async move {
                heartbeat_loop(client, api_key, heartbeat_interval, shutdown).await;
            }));
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_ffmpeg_processes));

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                info!("shutdown requested, draining before exit");
                break;
            }

            if let Some(cmd) = pending.pop().await {
                self.run_pending_command(cmd).await;
                if self.shutdown.load(Ordering::SeqCst) {
                    break;
                }
            }

            match self.client.claim(&identity.api_key).await {
                Ok(ClaimResponse::Job(job)) => {
                    if let Err(err) = self.execute_job(&identity, job, semaphore.clone()).await {
                        warn!(error = %err, "job execution failed");
                    }
                }
                Ok(ClaimResponse::NoWork { .. }) => {
                    sleep(self.config.claim_poll_interval).await;
                }
                Err(err) => {
                    warn!(error = %err, "claim request failed");
                    sleep(self.config.claim_poll_interval).await;
                }
            }
        }

        for handle in handles {
            handle.abort();
        }
        Ok(())
    }

    async fn bootstrap_identity(&self) -> WorkerResult<WorkerIdentity> {
        if let Some(identity) = identity::load(&self.config.identity_path).await? {
            return Ok(identity);
        }

        let req = RegisterRequest {
            worker_name: self.config.worker_name.clone(),
            worker_type: WorkerType::Local,
            capabilities: None,
            metadata: None,
        };
        let resp = self.client.register(&req).await?;
        let identity = WorkerIdentity {
            worker_id: resp.worker_id,
            api_key: resp.api_key,
        };
        identity::save(&self.config.identity_path, &identity).await?;
        Ok(identity)
    }

    async fn run_pending_command(&self, cmd: PendingCommand) {
        match cmd {
            PendingCommand::Stop => {
                info!("processing queued stop command");
                self.shutdown.store(true, Ordering::SeqCst);
            }
            PendingCommand::Restart => {
                info!("processing queued restart command");
                self.shutdown.store(true, Ordering::SeqCst);
            }
            PendingCommand::Update => {
                info!("processing queued update command (no-op placeholder for a self-update mechanism)");
            }
        }
    }

    async fn execute_job(&self, identity: &WorkerIdentity, job: Job, semaphore: Arc<Semaphore>) -> WorkerResult<()> {
        let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");

        let job_id = job.id.to_string();
        let video_id = job.video_id;
        let workdir = std::path::Path::new(&self.config.work_dir).join(&job_id);
        std::fs::create_dir_all(&workdir)?;

        let source_path = workdir.join("source.bin");
        self.client.download_source(&identity.api_key, &video_id.to_string(), &source_path).await?;

        let video_meta = vlog_media::probe_video(&source_path).await?;
        let transcode_config = TranscodingConfig {
            segment_duration_secs: 6,
            codec: Codec::H264,
            min_ready_quality: Quality::P480,
        };
        let tasks: Vec<EncodeTask> = vlog_media::plan(&video_meta, FULL_LADDER, &transcode_config, &source_path);

        let mut completed_qualities = Vec::new();
        let mut any_completed = false;

        for task in tasks {
            let quality = task.quality;
            let quality_dir = workdir.join(quality.as_str());
            let client = self.client.clone();
            let api_key = identity.api_key.clone();
            let job_id_clone = job_id.clone();

            let progress_client = self.client.clone();
            let progress_api_key = identity.api_key.clone();
            let progress_job_id = job_id.clone();
            let quality_str = quality.as_str().to_string();

            let result = run_quality_pipeline(
                &client,
                &api_key,
                video_id,
                &job_id_clone,
                task,
                quality_dir,
                &self.config,
                move |completed, _bytes| {
                    let req = ProgressRequest {
                        current_step: format!("transcode:{quality_str}"),
                        progress_percent: 0,
                        quality_progress: Some(serde_json::json!({ "segments_completed": completed })),
                    };
                    let progress_client = progress_client.clone();
                    let progress_api_key = progress_api_key.clone();
                    let progress_job_id = progress_job_id.clone();
                    tokio::spawn(async move {
                        let _ = progress_client.post_progress(&progress_api_key, &progress_job_id, &req).await;
                    });
                },
            )
            .await;

            match result {
                Ok(_) => {
                    any_completed = any_completed || quality >= transcode_config.min_ready_quality;
                    completed_qualities.push(quality.as_str().to_string());
                }
                Err(WorkerError::ClaimLost) => return Err(WorkerError::ClaimLost),
                Err(err) => {
                    warn!(quality = %quality.as_str(), error = %err, "quality failed, continuing with remaining qualities");
                }
            }
        }

        let _ = std::fs::remove_dir_all(&workdir);

        if any_completed {
            let req = CompleteRequest {
                qualities: completed_qualities,
                duration: Some(video_meta.duration),
                source_width: Some(video_meta.width),
                source_height: Some(video_meta.height),
            };
            self.client.complete(&identity.api_key, &job_id, &req).await?;
            crate::metrics::record_job("completed");
        } else {
            let req = FailRequest {
                error_message: "no quality reached the minimum ready threshold".to_string(),
                retry: true,
            };
            self.client.fail(&identity.api_key, &job_id, &req).await?;
            crate::metrics::record_job("failed");
        }

        Ok(())
    }
}

async fn heartbeat_loop(client: CoordinatorClient, api_key: String, interval: std::time::Duration, shutdown: Arc<AtomicBool>) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            return;
        }
        let req = HeartbeatRequest {
            status: "idle".to_string(),
            metadata: None,
        };
        if let Err(err) = client.heartbeat(&api_key, &req).await {
            error!(error = %err, "heartbeat failed");
        }
        sleep(interval).await;
    }
}
