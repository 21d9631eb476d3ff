//! API key issuance and verification (§4.7).
//!
//! New keys are always issued with [`HashVersion::Argon2id`]; legacy
//! [`HashVersion::Sha256Legacy`] rows remain verifiable until rotated.
//! Verification never reveals which step (prefix lookup, hash mismatch,
//! revocation, expiry) caused a rejection.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::{FromRow, PgPool};
use subtle::ConstantTimeEq;
use uuid::Uuid;
use vlog_models::api_key::{ApiKey, HashVersion, KEY_PREFIX_LEN};
use vlog_models::ids::{ApiKeyId, WorkerId};

use crate::error::{CatalogError, CatalogResult};

pub struct ApiKeyRepository {
    pool: PgPool,
}

#[derive(FromRow)]
struct ApiKeyRow {
    id: Uuid,
    worker_id: Uuid,
    key_hash: String,
    key_prefix: String,
    hash_version: i16,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    revoked_at: Option<DateTime<Utc>>,
    last_used_at: Option<DateTime<Utc>>,
}

const SELECT_COLUMNS: &str =
    "id, worker_id, key_hash, key_prefix, hash_version, created_at, expires_at, revoked_at, last_used_at";

impl ApiKeyRow {
    fn into_api_key(self) -> CatalogResult<ApiKey> {
        let hash_version = HashVersion::from_i16(self.hash_version)
            .ok_or_else(|| CatalogError::ConstraintViolation(format!("unknown hash_version: {}", self.hash_version)))?;
        Ok(ApiKey {
            id: ApiKeyId::from(self.id),
            worker_id: WorkerId::from(self.worker_id),
            key_hash: self.key_hash,
            key_prefix: self.key_prefix,
            hash_version,
            created_at: self.created_at,
            expires_at: self.expires_at,
            revoked_at: self.revoked_at,
            last_used_at: self.last_used_at,
        })
    }
}

/// A freshly issued key: the plaintext is returned exactly once.
pub struct IssuedApiKey {
    pub id: ApiKeyId,
    pub plaintext: String,
}

/// Generates a 32-byte (256-bit) URL-safe opaque key.
fn generate_plaintext() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes)
}

fn hash_argon2(plaintext: &str) -> CatalogResult<String> {
    let salt = SaltString::generate(&mut rand::rng());
    let argon2 = Argon2::default();
    argon2
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| CatalogError::config_error(format!("argon2 hash failed: {e}")))
}

fn verify_argon2(plaintext: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else { return false };
    Argon2::default().verify_password(plaintext.as_bytes(), &parsed).is_ok()
}

fn hash_sha256(plaintext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    hex::encode(hasher.finalize())
}

fn verify_sha256(plaintext: &str, stored_hex: &str) -> bool {
    let computed = hash_sha256(plaintext);
    // Constant-time comparison over the raw bytes, not the hex text, to
    // avoid leaking equal-prefix-length timing through string comparison.
    computed.as_bytes().ct_eq(stored_hex.as_bytes()).into()
}

impl ApiKeyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn issue(&self, worker_id: WorkerId, expires_at: Option<DateTime<Utc>>) -> CatalogResult<IssuedApiKey> {
        let plaintext = generate_plaintext();
        let prefix = &plaintext[..KEY_PREFIX_LEN];
        let hash = hash_argon2(&plaintext)?;
        let id = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO api_keys (id, worker_id, key_prefix, key_hash, hash_version, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(id)
        .bind(worker_id.as_uuid())
        .bind(prefix)
        .bind(&hash)
        .bind(HashVersion::Argon2id as i16)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(IssuedApiKey { id: ApiKeyId::from(id), plaintext })
    }

    /// Verifies a presented plaintext key and returns the owning worker.
    /// Updates `last_used_at` on success. Generic failure on any rejection
    /// path: short key, no matching prefix, hash mismatch, revoked, expired.
    pub async fn verify(&self, plaintext: &str, now: DateTime<Utc>) -> CatalogResult<WorkerId> {
        if plaintext.len() < KEY_PREFIX_LEN {
            return Err(CatalogError::validation("invalid api key"));
        }
        let prefix = &plaintext[..KEY_PREFIX_LEN];

        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM api_keys WHERE key_prefix = $1 \
             AND revoked_at IS NULL AND (expires_at IS NULL OR expires_at > $2)"
        );
        let candidates: Vec<ApiKeyRow> = sqlx::query_as(&query)
            .bind(prefix)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;

        for candidate in candidates {
            let matched = match HashVersion::from_i16(candidate.hash_version) {
                Some(HashVersion::Argon2id) => verify_argon2(plaintext, &candidate.key_hash),
                Some(HashVersion::Sha256Legacy) => verify_sha256(plaintext, &candidate.key_hash),
                None => false,
            };
            if matched {
                sqlx::query("UPDATE api_keys SET last_used_at = $1 WHERE id = $2")
                    .bind(now)
                    .bind(candidate.id)
                    .execute(&self.pool)
                    .await?;
                return Ok(WorkerId::from(candidate.worker_id));
            }
        }

        Err(CatalogError::validation("invalid api key"))
    }

    pub async fn revoke(&self, id: ApiKeyId) -> CatalogResult<()> {
        let rows = sqlx::query("UPDATE api_keys SET revoked_at = now() WHERE id = $1 AND revoked_at IS NULL")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        if rows.rows_affected() == 0 {
            return Err(CatalogError::not_found(format!("api key {id}")));
        }
        Ok(())
    }

    pub async fn list_for_worker(&self, worker_id: WorkerId) -> CatalogResult<Vec<ApiKey>> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM api_keys WHERE worker_id = $1 ORDER BY created_at DESC");
        let rows: Vec<ApiKeyRow> = sqlx::query_as(&query)
            .bind(worker_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(ApiKeyRow::into_api_key).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argon2_round_trips() {
        let hash = hash_argon2("plaintext-key-value").unwrap();
        assert!(verify_argon2("plaintext-key-value", &hash));
        assert!(!verify_argon2("wrong-key", &hash));
    }

    #[test]
    fn sha256_legacy_round_trips() {
        let hash = hash_sha256("legacy-key-value");
        assert!(verify_sha256("legacy-key-value", &hash));
        assert!(!verify_sha256("wrong-key", &hash));
    }

    #[test]
    fn generated_plaintext_is_long_enough_for_prefix() {
        let plaintext = generate_plaintext();
        assert!(plaintext.len() > KEY_PREFIX_LEN);
    }
}
