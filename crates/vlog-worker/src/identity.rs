//! Persisted worker identity (§4.4 step 2): `register` is sent only once;
//! subsequent starts reuse the stored `worker_id`/`api_key`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use crate::error::WorkerResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerIdentity {
    pub worker_id: String,
    pub api_key: String,
}

/// Loads a previously persisted identity, if any.
pub async fn load(path: impl AsRef<Path>) -> WorkerResult<Option<WorkerIdentity>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(path).await?;
    let identity: WorkerIdentity = serde_json::from_slice(&bytes)?;
    Ok(Some(identity))
}

/// Persists a freshly registered identity.
pub async fn save(path: impl AsRef<Path>, identity: &WorkerIdentity) -> WorkerResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec_pretty(identity)?;
    fs::write(path, bytes).await?;
    info!(path = %path.display(), "persisted worker identity");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_yields_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("identity.json");
        assert!(load(&path).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("identity.json");
        let identity = WorkerIdentity {
            worker_id: "w-1".to_string(),
            api_key: "secret".to_string(),
        };
        save(&path, &identity).await.unwrap();
        let loaded = load(&path).await.unwrap().unwrap();
        assert_eq!(loaded.worker_id, "w-1");
        assert_eq!(loaded.api_key, "secret");
    }
}
