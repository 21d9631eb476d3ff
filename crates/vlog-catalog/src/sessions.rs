//! Admin session repository.
//!
//! Only a SHA-256 digest of the session token is ever persisted; the
//! plaintext token is delivered once, via an HTTP-only cookie, and is
//! never written to the Catalog or logged.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use vlog_models::admin_session::SESSION_TOKEN_MIN_ENTROPY_BYTES;

use crate::error::{CatalogError, CatalogResult};

pub struct SessionRepository {
    pool: PgPool,
}

#[derive(FromRow)]
struct SessionRow {
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
}

/// A freshly created session: the plaintext token is returned exactly once.
pub struct IssuedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

fn generate_token() -> String {
    let mut bytes = [0u8; SESSION_TOKEN_MIN_ENTROPY_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes)
}

fn token_hash(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

impl SessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        session_lifetime: Duration,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
        now: DateTime<Utc>,
    ) -> CatalogResult<IssuedSession> {
        let token = generate_token();
        let expires_at = now + session_lifetime;
        sqlx::query(
            "INSERT INTO admin_sessions (id, token_hash, expires_at, ip_address, user_agent) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::new_v4())
        .bind(token_hash(&token))
        .bind(expires_at)
        .bind(ip_address)
        .bind(user_agent)
        .execute(&self.pool)
        .await?;
        Ok(IssuedSession { token, expires_at })
    }

    /// Validates a presented token and extends `last_seen_at`. Fails
    /// generically (`Validation`) for unknown, expired, or revoked tokens.
    pub async fn validate(&self, token: &str, now: DateTime<Utc>) -> CatalogResult<()> {
        let hash = token_hash(token);
        let row: Option<SessionRow> =
            sqlx::query_as("SELECT expires_at, revoked_at FROM admin_sessions WHERE token_hash = $1")
                .bind(&hash)
                .fetch_optional(&self.pool)
                .await?;

        let Some(row) = row else {
            return Err(CatalogError::validation("invalid session"));
        };
        if row.revoked_at.is_some() || row.expires_at <= now {
            return Err(CatalogError::validation("invalid session"));
        }

        sqlx::query("UPDATE admin_sessions SET last_seen_at = $1 WHERE token_hash = $2")
            .bind(now)
            .bind(&hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Rotates the session on privilege change: revokes the old token and
    /// issues a new one.
    pub async fn rotate(
        &self,
        old_token: &str,
        session_lifetime: Duration,
        now: DateTime<Utc>,
    ) -> CatalogResult<IssuedSession> {
        self.revoke(old_token).await?;
        self.create(session_lifetime, None, None, now).await
    }

    pub async fn revoke(&self, token: &str) -> CatalogResult<()> {
        sqlx::query("UPDATE admin_sessions SET revoked_at = now() WHERE token_hash = $1")
            .bind(token_hash(token))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_token_meets_entropy_floor() {
        let token = generate_token();
        // base64url without padding: ceil(n*8/6) chars for n input bytes.
        let min_chars = (SESSION_TOKEN_MIN_ENTROPY_BYTES * 8).div_ceil(6);
        assert!(token.len() >= min_chars);
    }

    #[test]
    fn token_hash_is_deterministic() {
        assert_eq!(token_hash("abc"), token_hash("abc"));
        assert_ne!(token_hash("abc"), token_hash("abd"));
    }
}
