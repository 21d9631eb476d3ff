//! Segment Pipeline Uploader (§4.5): consumes `Segment`s off the bounded
//! channel, re-stats before reading (a file the Watcher marked stable two
//! polls ago could in principle still be mid-write on a slow filesystem),
//! hashes off-thread, and uploads. A 409 means the claim expired and the
//! whole pipeline must stop; a checksum mismatch is retried up to
//! `max_retries` before hard-failing.

use std::path::PathBuf;

use sha2::{Digest, Sha256};
use tokio::sync::mpsc::Receiver;
use tracing::{info, warn};
use vlog_models::ids::VideoId;

use crate::client::CoordinatorClient;
use crate::error::{WorkerError, WorkerResult};
use crate::watcher::Segment;

pub type ProgressFn = Box<dyn FnMut(u32, u64) + Send>;

pub struct Uploader {
    client: CoordinatorClient,
    api_key: String,
    video_id: VideoId,
    max_retries: u32,
}

impl Uploader {
    pub fn new(client: CoordinatorClient, api_key: impl Into<String>, video_id: VideoId, max_retries: u32) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            video_id,
            max_retries,
        }
    }

    /// Drains `rx` until the channel closes, uploading each segment in turn.
    /// Returns the total (segments_completed, bytes_uploaded) once done, or
    /// an error if the claim was lost or a segment hard-failed.
    pub async fn run(&self, mut rx: Receiver<Segment>, mut on_progress: ProgressFn) -> WorkerResult<(u32, u64)> {
        let mut segments_completed = 0u32;
        let mut bytes_uploaded = 0u64;

        while let Some(segment) = rx.recv().await {
            let size = self.upload_one(&segment).await?;
            segments_completed += 1;
            bytes_uploaded += size;
            on_progress(segments_completed, bytes_uploaded);
        }

        Ok((segments_completed, bytes_uploaded))
    }

    async fn upload_one(&self, segment: &Segment) -> WorkerResult<u64> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.try_upload(segment).await {
                Ok(size) => return Ok(size),
                Err(WorkerError::ClaimLost) => return Err(WorkerError::ClaimLost),
                Err(err) if attempt <= self.max_retries => {
                    warn!(
                        segment = %segment.name,
                        attempt,
                        max_retries = self.max_retries,
                        error = %err,
                        "segment upload failed, retrying"
                    );
                }
                Err(err) => {
                    return Err(WorkerError::SegmentHardFailed(format!(
                        "{} after {} attempts: {err}",
                        segment.name, attempt
                    )));
                }
            }
        }
    }

    async fn try_upload(&self, segment: &Segment) -> WorkerResult<u64> {
        let bytes = read_stable(&segment.path).await?;
        let sha256 = hex_sha256(&bytes);
        let size = bytes.len() as u64;

        let result = self
            .client
            .upload_segment(&self.api_key, &self.video_id.to_string(), segment.quality, &segment.name, &sha256, bytes)
            .await?;

        if !result.checksum_verified {
            return Err(WorkerError::job_failed(format!("checksum mismatch for {}", segment.name)));
        }

        info!(segment = %segment.name, size, "segment uploaded");
        Ok(size)
    }
}

async fn read_stable(path: &PathBuf) -> WorkerResult<Vec<u8>> {
    let _ = tokio::fs::metadata(path).await?;
    let bytes = tokio::task::spawn_blocking({
        let path = path.clone();
        move || std::fs::read(path)
    })
    .await
    .map_err(|e| WorkerError::job_failed(format!("upload read task panicked: {e}")))??;
    Ok(bytes)
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_sha256_matches_known_vector() {
        let digest = hex_sha256(b"abc");
        assert_eq!(digest, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
    }
}
