//! Segment metadata repository.
//!
//! Payload bytes live in object storage (`vlog-storage`); this repository
//! only persists the references the Catalog needs for playlist assembly
//! and finalize-time segment counting.

use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;
use vlog_models::ids::VideoId;
use vlog_models::video::Quality;

use crate::error::{CatalogError, CatalogResult};

pub struct SegmentRepository {
    pool: PgPool,
}

/// Verifies the server-recomputed SHA-256 against what the uploader
/// declared. A mismatch is never persisted (§8, scenario 4).
pub fn verify_checksum(bytes: &[u8], declared_sha256: &str) -> bool {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let computed = hex::encode(hasher.finalize());
    computed.eq_ignore_ascii_case(declared_sha256)
}

impl SegmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Records one verified segment. Idempotent on
    /// `(video_id, quality, sequence)`: a repeat upload with the same
    /// coordinates updates the existing row rather than duplicating it.
    pub async fn record(
        &self,
        video_id: VideoId,
        quality: Quality,
        sequence: i32,
        storage_key: &str,
        byte_size: i64,
        duration_secs: f64,
        checksum: &str,
    ) -> CatalogResult<()> {
        sqlx::query(
            "INSERT INTO segments (id, video_id, quality, sequence, storage_key, byte_size, duration_secs, checksum) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (video_id, quality, sequence) \
             DO UPDATE SET storage_key = EXCLUDED.storage_key, byte_size = EXCLUDED.byte_size, \
                            duration_secs = EXCLUDED.duration_secs, checksum = EXCLUDED.checksum",
        )
        .bind(Uuid::new_v4())
        .bind(video_id.as_uuid())
        .bind(quality.as_str())
        .bind(sequence)
        .bind(storage_key)
        .bind(byte_size)
        .bind(duration_secs)
        .bind(checksum)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn count_for_quality(&self, video_id: VideoId, quality: Quality) -> CatalogResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM segments WHERE video_id = $1 AND quality = $2")
                .bind(video_id.as_uuid())
                .bind(quality.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    pub async fn missing_sequences(
        &self,
        video_id: VideoId,
        quality: Quality,
        expected_count: i64,
    ) -> CatalogResult<Vec<i32>> {
        let present: Vec<(i32,)> =
            sqlx::query_as("SELECT sequence FROM segments WHERE video_id = $1 AND quality = $2 ORDER BY sequence")
                .bind(video_id.as_uuid())
                .bind(quality.as_str())
                .fetch_all(&self.pool)
                .await?;
        let present: std::collections::HashSet<i32> = present.into_iter().map(|(s,)| s).collect();
        Ok((0..expected_count as i32).filter(|s| !present.contains(s)).collect())
    }

    pub async fn delete_for_video(&self, video_id: VideoId) -> CatalogResult<()> {
        sqlx::query("DELETE FROM segments WHERE video_id = $1")
            .bind(video_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(CatalogError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_matches_recomputed_sha256() {
        let bytes = b"segment-bytes";
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let declared = hex::encode(hasher.finalize());
        assert!(verify_checksum(bytes, &declared));
    }

    #[test]
    fn checksum_mismatch_is_rejected() {
        assert!(!verify_checksum(b"segment-bytes", "deadbeef"));
    }
}
