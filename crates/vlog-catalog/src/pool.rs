//! Connection pool setup and migration runner.

use sqlx::postgres::{PgPoolOptions, PgSslMode};
use sqlx::PgPool;

use crate::error::CatalogResult;

/// Configuration for the Catalog's connection pool.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl CatalogConfig {
    /// Create config from environment variables. `DATABASE_URL` is a
    /// bootstrap setting and, per the settings service design, is never
    /// sourced from the Catalog itself.
    pub fn from_env() -> CatalogResult<Self> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| crate::error::CatalogError::config_error("DATABASE_URL not set"))?,
            max_connections: std::env::var("CATALOG_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            min_connections: std::env::var("CATALOG_MIN_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1),
            acquire_timeout_secs: std::env::var("CATALOG_ACQUIRE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
        })
    }
}

/// Connect to Postgres and run pending migrations before returning the pool.
///
/// A failed migration aborts startup: the Coordinator must never accept
/// traffic against a partially-migrated schema.
pub async fn connect(config: &CatalogConfig) -> CatalogResult<PgPool> {
    let mut connect_opts: sqlx::postgres::PgConnectOptions = config.database_url.parse()?;
    connect_opts = connect_opts.ssl_mode(PgSslMode::Prefer);

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(std::time::Duration::from_secs(config.acquire_timeout_secs))
        .connect_with(connect_opts)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}
