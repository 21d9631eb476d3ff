//! Per-quality Segment Pipeline (§4.5): wires the Transcoding Executor, the
//! Watcher, and the Uploader together over a bounded channel, then runs
//! Finalize once transcoding and upload both complete.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tracing::{info, warn};
use vlog_media::{EncodeTask, ExecutorOutcome};
use vlog_models::ids::VideoId;
use vlog_models::quality_progress::{QualityProgress, QualityStatus};

use crate::client::CoordinatorClient;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::uploader::Uploader;
use crate::watcher::Watcher;

pub struct QualityPipelineResult {
    pub progress: QualityProgress,
}

/// Runs the full segment pipeline for a single quality rung: transcode,
/// watch, upload, finalize. The caller is responsible for reporting
/// progress upstream (e.g. to the Coordinator via `post_progress`).
pub async fn run_quality_pipeline(
    client: &CoordinatorClient,
    api_key: &str,
    video_id: VideoId,
    job_id: &str,
    task: EncodeTask,
    workdir: PathBuf,
    config: &WorkerConfig,
    mut on_segment_progress: impl FnMut(u32, u64) + Send + 'static,
) -> WorkerResult<QualityPipelineResult> {
    let quality = task.quality;
    let job_uuid = uuid::Uuid::parse_str(job_id).map_err(|e| WorkerError::job_failed(e.to_string()))?;
    let mut progress = QualityProgress::new(vlog_models::ids::JobId::from(job_uuid), quality);
    progress.status = QualityStatus::InProgress;

    std::fs::create_dir_all(&workdir)?;

    let crashed = Arc::new(AtomicBool::new(false));
    let encode_handle = vlog_media::spawn(&task, &workdir, Box::new(|_p| {})).await?;

    let (tx, rx) = mpsc::channel(config.segment_queue_capacity);
    let mut watcher = Watcher::new(workdir.clone(), quality, config.segment_poll_interval, config.segment_stable_count);

    let uploader = Uploader::new(client.clone(), api_key, video_id, config.max_segment_retries);
    let on_progress: crate::uploader::ProgressFn = Box::new(move |completed, bytes| on_segment_progress(completed, bytes));
    let upload_task = tokio::spawn(async move { uploader.run(rx, on_progress).await });

    let watch_crashed = crashed.clone();
    let watcher_tx = tx.clone();
    let watcher_task = tokio::spawn(async move {
        watcher.run(&watcher_tx, || watch_crashed.load(Ordering::SeqCst)).await;
        watcher
    });

    let outcome = vlog_media::await_exit(encode_handle).await?;
    if matches!(outcome, ExecutorOutcome::Crashed(_)) {
        crashed.store(true, Ordering::SeqCst);
        warn!(quality = %quality.as_str(), ?outcome, "encoder crashed, stopping watcher");
    }

    let mut watcher = watcher_task.await.map_err(|e| WorkerError::job_failed(format!("watcher task panicked: {e}")))?;

    if !matches!(outcome, ExecutorOutcome::Crashed(_)) {
        watcher.flush_remaining(&tx).await;
    }
    // Drop both senders so the uploader's channel closes and `run` returns
    // once the queued segments drain.
    drop(tx);

    let (segments_completed, bytes_uploaded) =
        upload_task.await.map_err(|e| WorkerError::job_failed(format!("uploader task panicked: {e}")))??;

    if matches!(outcome, ExecutorOutcome::Crashed(_)) {
        progress.status = QualityStatus::Failed;
        return Err(WorkerError::job_failed(format!("transcoding crashed for {}", quality.as_str())));
    }

    progress.segments_completed = segments_completed;
    progress.segments_total = segments_completed;
    progress.status = QualityStatus::Uploading;

    let playlist_path = workdir.join("index.m3u8");
    let playlist_bytes = tokio::fs::read(&playlist_path).await?;
    let manifest_sha256 = hex_sha256(&playlist_bytes);

    let result = client
        .upload_segment(api_key, &video_id.to_string(), quality, "index.m3u8", &manifest_sha256, playlist_bytes)
        .await?;
    if !result.checksum_verified {
        return Err(WorkerError::job_failed("playlist checksum mismatch"));
    }

    let finalize = client
        .finalize(api_key, &video_id.to_string(), quality, segments_completed, &manifest_sha256)
        .await?;

    if !finalize.complete {
        progress.status = QualityStatus::Failed;
        return Err(WorkerError::job_failed(format!(
            "finalize incomplete for {}: missing {:?}",
            quality.as_str(),
            finalize.missing_segments
        )));
    }

    progress.status = QualityStatus::Completed;
    progress.progress_percent = 100;
    info!(quality = %quality.as_str(), bytes_uploaded, "quality pipeline complete");

    Ok(QualityPipelineResult { progress })
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
