//! Transcoding Executor (§4.6): the worker-side adapter around the external
//! encoder. Derives one task per requested quality, spawns the encoder
//! process, and surfaces its exit as a `Success`/`Crashed` outcome.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};
use vlog_models::video::{Codec, Quality};

use crate::error::{MediaError, MediaResult};
use crate::probe::VideoInfo;
use crate::progress::{FfmpegProgress, ProgressCallback};

/// Height, in pixels, each quality ladder rung targets. Used to skip
/// qualities that would upscale past the source.
fn ladder_height(quality: Quality) -> u32 {
    match quality {
        Quality::P360 => 360,
        Quality::P480 => 480,
        Quality::P720 => 720,
        Quality::P1080 => 1080,
        Quality::P1440 => 1440,
        Quality::P2160 => 2160,
        Quality::Original => u32::MAX,
    }
}

/// Transcoding parameters sourced from the Settings Service's `transcoding`
/// category.
#[derive(Debug, Clone)]
pub struct TranscodingConfig {
    pub segment_duration_secs: u32,
    pub codec: Codec,
    pub min_ready_quality: Quality,
}

/// One quality rung's encode task, derived from a source video's
/// dimensions/duration.
#[derive(Debug, Clone)]
pub struct EncodeTask {
    pub quality: Quality,
    pub source: PathBuf,
    pub target_height: u32,
    pub segment_duration_secs: u32,
    pub codec: Codec,
}

/// Derives one task per requested quality, dropping any that would upscale
/// past the source resolution.
pub fn plan(video_meta: &VideoInfo, requested_qualities: &[Quality], config: &TranscodingConfig, source: impl AsRef<Path>) -> Vec<EncodeTask> {
    let source = source.as_ref().to_path_buf();
    requested_qualities
        .iter()
        .filter(|q| ladder_height(**q) <= video_meta.height || **q == Quality::Original)
        .map(|&quality| EncodeTask {
            quality,
            source: source.clone(),
            target_height: ladder_height(quality).min(video_meta.height),
            segment_duration_secs: config.segment_duration_secs,
            codec: config.codec,
        })
        .collect()
}

fn codec_arg(codec: Codec) -> &'static str {
    match codec {
        Codec::H264 => "libx264",
        Codec::Hevc => "libx265",
        Codec::Av1 => "libsvtav1",
    }
}

/// A running (or already-collected) encoder process.
pub struct EncodeHandle {
    child: tokio::process::Child,
    progress_task: tokio::task::JoinHandle<()>,
}

/// Terminal state of a spawned encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorOutcome {
    Success,
    /// Carries the signal number (if killed by signal) or exit code.
    Crashed(Option<i32>),
}

/// Launches the external encoder for `task`, writing HLS segments and a
/// playlist into `workdir`. Progress lines on stderr are forwarded to
/// `on_progress`; stdout/stderr are logged at `debug`.
pub async fn spawn(task: &EncodeTask, workdir: impl AsRef<Path>, on_progress: ProgressCallback) -> MediaResult<EncodeHandle> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

    let workdir = workdir.as_ref();
    tokio::fs::create_dir_all(workdir).await?;

    let playlist = workdir.join("index.m3u8");
    let segment_pattern = workdir.join("seg-%05d.ts");

    let args = vec![
        "-y".to_string(),
        "-v".to_string(),
        "error".to_string(),
        "-progress".to_string(),
        "pipe:2".to_string(),
        "-i".to_string(),
        task.source.to_string_lossy().to_string(),
        "-vf".to_string(),
        format!("scale=-2:{}", task.target_height),
        "-c:v".to_string(),
        codec_arg(task.codec).to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-f".to_string(),
        "hls".to_string(),
        "-hls_time".to_string(),
        task.segment_duration_secs.to_string(),
        "-hls_segment_filename".to_string(),
        segment_pattern.to_string_lossy().to_string(),
        playlist.to_string_lossy().to_string(),
    ];

    debug!(quality = task.quality.as_str(), "spawning ffmpeg: ffmpeg {}", args.join(" "));

    let mut child = Command::new("ffmpeg")
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stderr = child.stderr.take().expect("stderr not captured");
    let mut reader = BufReader::new(stderr).lines();

    let progress_task = tokio::spawn(async move {
        let mut current = FfmpegProgress::default();
        while let Ok(Some(line)) = reader.next_line().await {
            if let Some(progress) = parse_progress_line(&line, &mut current) {
                on_progress(progress);
            }
        }
    });

    Ok(EncodeHandle { child, progress_task })
}

/// Awaits the handle's process exit and classifies the outcome.
pub async fn await_exit(mut handle: EncodeHandle) -> MediaResult<ExecutorOutcome> {
    let status = handle.child.wait().await?;
    let _ = handle.progress_task.await;

    if status.success() {
        return Ok(ExecutorOutcome::Success);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            warn!(signal, "encoder terminated by signal");
            return Ok(ExecutorOutcome::Crashed(Some(signal)));
        }
    }

    warn!(code = ?status.code(), "encoder exited with non-zero status");
    Ok(ExecutorOutcome::Crashed(status.code()))
}

fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> Option<FfmpegProgress> {
    let line = line.trim();
    let (key, value) = line.split_once('=')?;
    match key {
        "out_time_ms" | "out_time_us" => {
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_ms = if key == "out_time_us" { us / 1000 } else { us };
            }
        }
        "frame" => {
            if let Ok(frame) = value.parse() {
                current.frame = frame;
            }
        }
        "speed" => {
            if value != "N/A" {
                if let Some(speed_str) = value.strip_suffix('x') {
                    if let Ok(speed) = speed_str.parse() {
                        current.speed = speed;
                    }
                }
            }
        }
        "progress" => {
            if value == "end" {
                current.is_complete = true;
            }
            return Some(current.clone());
        }
        _ => {}
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_meta(height: u32) -> VideoInfo {
        VideoInfo {
            duration: 120.0,
            width: height * 16 / 9,
            height,
            fps: 30.0,
            codec: "h264".to_string(),
            size: 0,
            bitrate: 0,
        }
    }

    fn config() -> TranscodingConfig {
        TranscodingConfig {
            segment_duration_secs: 6,
            codec: Codec::H264,
            min_ready_quality: Quality::P480,
        }
    }

    #[test]
    fn plan_drops_qualities_above_source_resolution() {
        let tasks = plan(&video_meta(720), &[Quality::P360, Quality::P720, Quality::P1080], &config(), "in.mp4");
        let qualities: Vec<_> = tasks.iter().map(|t| t.quality).collect();
        assert_eq!(qualities, vec![Quality::P360, Quality::P720]);
    }

    #[test]
    fn plan_never_upscales_target_height() {
        let tasks = plan(&video_meta(720), &[Quality::P720], &config(), "in.mp4");
        assert_eq!(tasks[0].target_height, 720);
    }

    #[test]
    fn original_quality_always_included() {
        let tasks = plan(&video_meta(480), &[Quality::Original], &config(), "in.mp4");
        assert_eq!(tasks.len(), 1);
    }
}
