//! HTTP client for the Coordinator's worker API (§6 Worker API).

use std::collections::HashMap;
use std::path::Path;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use vlog_models::job::Job;
use vlog_models::video::Quality;
use vlog_models::worker::WorkerType;

use crate::error::{WorkerError, WorkerResult};

const API_KEY_HEADER: &str = "X-Worker-API-Key";

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_name: Option<String>,
    pub worker_type: WorkerType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<HashMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterResponse {
    pub worker_id: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatRequest {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatResponse {
    pub server_time: chrono::DateTime<chrono::Utc>,
    pub next_heartbeat_by: chrono::DateTime<chrono::Utc>,
}

/// `claim`'s two possible outcomes: a Job to run, or no work available.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ClaimResponse {
    Job(Job),
    NoWork { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressRequest {
    pub current_step: String,
    pub progress_percent: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_progress: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadSegmentResponse {
    pub checksum_verified: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FinalizeResponse {
    pub complete: bool,
    #[serde(default)]
    pub missing_segments: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompleteRequest {
    pub qualities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_height: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailRequest {
    pub error_message: String,
    pub retry: bool,
}

/// Thin HTTP client over the Coordinator's worker API. Holds no identity
/// state itself; callers pass `api_key` per call so the same client can be
/// used before and after registration.
#[derive(Clone)]
pub struct CoordinatorClient {
    http: Client,
    base_url: String,
}

impl CoordinatorClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// One-time registration. No API key exists yet to authenticate with.
    pub async fn register(&self, req: &RegisterRequest) -> WorkerResult<RegisterResponse> {
        let resp = self.http.post(self.url("/api/worker/register")).json(req).send().await?;
        Ok(resp.error_for_status()?.json().await?)
    }

    pub async fn heartbeat(&self, api_key: &str, req: &HeartbeatRequest) -> WorkerResult<HeartbeatResponse> {
        let resp = self
            .http
            .post(self.url("/api/worker/heartbeat"))
            .header(API_KEY_HEADER, api_key)
            .json(req)
            .send()
            .await?;
        Ok(resp.error_for_status()?.json().await?)
    }

    pub async fn claim(&self, api_key: &str) -> WorkerResult<ClaimResponse> {
        let resp = self
            .http
            .post(self.url("/api/worker/claim"))
            .header(API_KEY_HEADER, api_key)
            .send()
            .await?;
        Ok(resp.error_for_status()?.json().await?)
    }

    /// Streams the source video for `video_id` into `dest`.
    pub async fn download_source(&self, api_key: &str, video_id: &str, dest: impl AsRef<Path>) -> WorkerResult<()> {
        let mut resp = self
            .http
            .get(self.url(&format!("/api/worker/source/{video_id}")))
            .header(API_KEY_HEADER, api_key)
            .send()
            .await?
            .error_for_status()?;

        let mut file = tokio::fs::File::create(dest.as_ref()).await?;
        while let Some(chunk) = resp.chunk().await? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }

    pub async fn post_progress(&self, api_key: &str, job_id: &str, req: &ProgressRequest) -> WorkerResult<()> {
        let resp = self
            .http
            .post(self.url(&format!("/api/worker/{job_id}/progress")))
            .header(API_KEY_HEADER, api_key)
            .json(req)
            .send()
            .await?;
        check_claim_lost(resp.status())?;
        resp.error_for_status()?;
        Ok(())
    }

    pub async fn upload_segment(
        &self,
        api_key: &str,
        video_id: &str,
        quality: Quality,
        filename: &str,
        sha256: &str,
        bytes: Vec<u8>,
    ) -> WorkerResult<UploadSegmentResponse> {
        let form = reqwest::multipart::Form::new()
            .text("quality", quality.as_str())
            .text("filename", filename.to_string())
            .text("sha256", sha256.to_string())
            .part("bytes", reqwest::multipart::Part::bytes(bytes));

        let resp = self
            .http
            .post(self.url(&format!("/api/worker/upload-segment/{video_id}")))
            .header(API_KEY_HEADER, api_key)
            .multipart(form)
            .send()
            .await?;
        check_claim_lost(resp.status())?;
        Ok(resp.error_for_status()?.json().await?)
    }

    pub async fn finalize(
        &self,
        api_key: &str,
        video_id: &str,
        quality: Quality,
        segment_count: u32,
        manifest_sha256: &str,
    ) -> WorkerResult<FinalizeResponse> {
        let body = serde_json::json!({
            "segment_count": segment_count,
            "manifest_sha256": manifest_sha256,
        });
        let resp = self
            .http
            .post(self.url(&format!("/api/worker/finalize/{video_id}/{}", quality.as_str())))
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await?;
        check_claim_lost(resp.status())?;
        Ok(resp.error_for_status()?.json().await?)
    }

    pub async fn complete(&self, api_key: &str, job_id: &str, req: &CompleteRequest) -> WorkerResult<()> {
        let resp = self
            .http
            .post(self.url(&format!("/api/worker/{job_id}/complete")))
            .header(API_KEY_HEADER, api_key)
            .json(req)
            .send()
            .await?;
        resp.error_for_status()?;
        Ok(())
    }

    pub async fn fail(&self, api_key: &str, job_id: &str, req: &FailRequest) -> WorkerResult<()> {
        let resp = self
            .http
            .post(self.url(&format!("/api/worker/{job_id}/fail")))
            .header(API_KEY_HEADER, api_key)
            .json(req)
            .send()
            .await?;
        resp.error_for_status()?;
        Ok(())
    }
}

fn check_claim_lost(status: StatusCode) -> WorkerResult<()> {
    if status == StatusCode::CONFLICT {
        return Err(WorkerError::ClaimLost);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_base_and_path_without_double_slash() {
        let client = CoordinatorClient::new("http://coordinator:8080/");
        assert_eq!(client.url("/api/worker/claim"), "http://coordinator:8080/api/worker/claim");
    }

    #[test]
    fn claim_response_parses_job_variant() {
        let json = r#"{"id":"00000000-0000-0000-0000-000000000001","video_id":"00000000-0000-0000-0000-000000000002","progress_percent":0,"attempt_number":1,"max_attempts":3,"created_at":"2026-01-01T00:00:00Z","updated_at":"2026-01-01T00:00:00Z"}"#;
        let parsed: ClaimResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(parsed, ClaimResponse::Job(_)));
    }

    #[test]
    fn claim_response_parses_no_work_variant() {
        let parsed: ClaimResponse = serde_json::from_str(r#"{"message":"no work"}"#).unwrap();
        assert!(matches!(parsed, ClaimResponse::NoWork { .. }));
    }
}
