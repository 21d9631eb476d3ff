//! Thin reqwest client over the Coordinator's Admin and Public API surfaces.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::CliError;

pub struct CoordinatorClient {
    http: reqwest::Client,
    base_url: String,
    admin_secret: Option<String>,
}

impl CoordinatorClient {
    pub fn new(base_url: String, admin_secret: Option<String>) -> Self {
        Self { http: reqwest::Client::new(), base_url, admin_secret }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, CliError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let detail = resp
            .json::<Value>()
            .await
            .ok()
            .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(|s| s.to_string()))
            .unwrap_or_else(|| "request failed".to_string());
        Err(CliError::Api { status, detail })
    }

    fn with_admin_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.admin_secret {
            Some(secret) => builder.header("X-Admin-Secret", secret),
            None => builder,
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, CliError> {
        let resp = self.with_admin_auth(self.http.get(self.url(path))).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, CliError> {
        let resp = self.with_admin_auth(self.http.post(self.url(path)).json(body)).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn patch_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, CliError> {
        let resp = self.with_admin_auth(self.http.patch(self.url(path)).json(body)).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn delete(&self, path: &str) -> Result<(), CliError> {
        let resp = self.with_admin_auth(self.http.delete(self.url(path))).send().await?;
        Self::check(resp).await?;
        Ok(())
    }

    pub async fn post_empty(&self, path: &str) -> Result<Value, CliError> {
        let resp = self.with_admin_auth(self.http.post(self.url(path))).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }
}
