//! Segment Pipeline Watcher (§4.5): polls a quality's output directory,
//! waits for each file to stop growing, then hands it to the Uploader over
//! a bounded channel. The bounded channel is the pipeline's sole
//! backpressure mechanism — a full queue blocks the Watcher, never the
//! encoder.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc::Sender;
use tokio::time::sleep;
use tracing::{debug, warn};
use vlog_models::video::Quality;

#[derive(Debug, Clone)]
pub struct Segment {
    pub path: PathBuf,
    pub quality: Quality,
    pub name: String,
    pub size: u64,
}

struct Watched {
    size: u64,
    stable_observations: u32,
}

/// Polls `dir` for new, size-stable files and emits them on `tx`. Runs until
/// `should_stop` reports true (encoder crashed) or the channel closes.
///
/// `flush_remaining` relaxes the stability threshold to a single observation
/// once transcoding has finished normally, so the last segment (which never
/// gets a second poll after the encoder exits) isn't stranded.
pub struct Watcher {
    dir: PathBuf,
    quality: Quality,
    poll_interval: Duration,
    stable_count: u32,
    seen: HashMap<String, Watched>,
    emitted: std::collections::HashSet<String>,
}

impl Watcher {
    pub fn new(dir: impl Into<PathBuf>, quality: Quality, poll_interval: Duration, stable_count: u32) -> Self {
        Self {
            dir: dir.into(),
            quality,
            poll_interval,
            stable_count,
            seen: HashMap::new(),
            emitted: std::collections::HashSet::new(),
        }
    }

    /// Runs the poll loop until `should_stop()` returns true. Playlist files
    /// (`.m3u8`) are excluded; they're handled separately at Finalize.
    pub async fn run(&mut self, tx: &Sender<Segment>, mut should_stop: impl FnMut() -> bool) {
        loop {
            if should_stop() {
                debug!(quality = %self.quality.as_str(), "watcher stopping: encoder crashed");
                return;
            }
            if self.scan_once(tx).await.is_none() {
                return;
            }
            sleep(self.poll_interval).await;
        }
    }

    /// Final pass after the encoder exits cleanly: any segment observed at
    /// all but not yet stable-enough is flushed with a relaxed threshold.
    pub async fn flush_remaining(&mut self, tx: &Sender<Segment>) {
        let entries = match list_segment_files(&self.dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(error = %err, "flush_remaining: failed to list directory");
                return;
            }
        };
        for (name, size) in entries {
            if self.emitted.contains(&name) {
                continue;
            }
            let segment = Segment {
                path: self.dir.join(&name),
                quality: self.quality,
                name: name.clone(),
                size,
            };
            if tx.send(segment).await.is_ok() {
                self.emitted.insert(name);
            }
        }
    }

    async fn scan_once(&mut self, tx: &Sender<Segment>) -> Option<()> {
        let entries = match list_segment_files(&self.dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(error = %err, dir = %self.dir.display(), "watcher: failed to list directory");
                return Some(());
            }
        };

        for (name, size) in entries {
            if self.emitted.contains(&name) {
                continue;
            }
            let watched = self.seen.entry(name.clone()).or_insert(Watched {
                size,
                stable_observations: 0,
            });
            if watched.size == size {
                watched.stable_observations += 1;
            } else {
                watched.size = size;
                watched.stable_observations = 1;
            }

            if watched.stable_observations >= self.stable_count {
                let segment = Segment {
                    path: self.dir.join(&name),
                    quality: self.quality,
                    name: name.clone(),
                    size,
                };
                // Backpressure-by-unmark: if the send can't complete within
                // one poll interval, un-mark the file so the next pass
                // retries the send instead of silently dropping it.
                match tokio::time::timeout(self.poll_interval, tx.send(segment)).await {
                    Ok(Ok(())) => {
                        self.emitted.insert(name.clone());
                        self.seen.remove(&name);
                    }
                    Ok(Err(_)) => return None,
                    Err(_) => {
                        watched.stable_observations = self.stable_count;
                    }
                }
            }
        }
        Some(())
    }
}

fn list_segment_files(dir: &Path) -> std::io::Result<Vec<(String, u64)>> {
    let mut out = Vec::new();
    if !dir.exists() {
        return Ok(out);
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n.to_string(),
            None => continue,
        };
        if name.ends_with(".m3u8") {
            continue;
        }
        let size = entry.metadata()?.len();
        out.push((name, size));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn emits_segment_once_stable() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("seg-00001.ts"), b"0123456789").unwrap();

        let mut watcher = Watcher::new(dir.path(), Quality::P720, Duration::from_millis(5), 2);
        let (tx, mut rx) = mpsc::channel(10);

        watcher.scan_once(&tx).await.unwrap();
        assert!(rx.try_recv().is_err(), "should not emit before stability threshold");

        watcher.scan_once(&tx).await.unwrap();
        let segment = rx.try_recv().expect("segment should be emitted once stable");
        assert_eq!(segment.name, "seg-00001.ts");
        assert_eq!(segment.size, 10);
    }

    #[tokio::test]
    async fn growing_file_resets_stability_counter() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seg-00001.ts");
        std::fs::write(&path, b"12345").unwrap();

        let mut watcher = Watcher::new(dir.path(), Quality::P720, Duration::from_millis(5), 2);
        let (tx, mut rx) = mpsc::channel(10);

        watcher.scan_once(&tx).await.unwrap();
        std::fs::write(&path, b"1234567890").unwrap();
        watcher.scan_once(&tx).await.unwrap();
        assert!(rx.try_recv().is_err(), "growth should have reset the counter");

        watcher.scan_once(&tx).await.unwrap();
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn flush_remaining_emits_with_single_observation() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("seg-00009.ts"), b"tail").unwrap();

        let mut watcher = Watcher::new(dir.path(), Quality::P720, Duration::from_millis(5), 2);
        let (tx, mut rx) = mpsc::channel(10);

        watcher.flush_remaining(&tx).await;
        let segment = rx.try_recv().expect("flush should emit the tail segment immediately");
        assert_eq!(segment.name, "seg-00009.ts");
    }

    #[tokio::test]
    async fn playlist_files_are_never_emitted() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.m3u8"), b"#EXTM3U").unwrap();

        let mut watcher = Watcher::new(dir.path(), Quality::P720, Duration::from_millis(5), 1);
        let (tx, mut rx) = mpsc::channel(10);

        watcher.scan_once(&tx).await.unwrap();
        watcher.scan_once(&tx).await.unwrap();
        assert!(rx.try_recv().is_err());
    }
}
