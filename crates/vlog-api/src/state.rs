//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;
use vlog_catalog::{
    ApiKeyRepository, AuditLogRepository, DeploymentEventRepository, JobRepository, QualityProgressRepository,
    SegmentRepository, SessionRepository, SettingsService, VideoRepository, WorkerRepository,
};
use vlog_queue::EventBus;
use vlog_storage::R2Client;

use crate::config::ApiConfig;

/// Shared application state. Cheap to clone: every field is an `Arc` or a
/// `sqlx::PgPool`, itself an `Arc` handle internally.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub pool: PgPool,
    pub storage: Arc<R2Client>,
    pub bus: Arc<EventBus>,
    pub videos: Arc<VideoRepository>,
    pub jobs: Arc<JobRepository>,
    pub workers: Arc<WorkerRepository>,
    pub api_keys: Arc<ApiKeyRepository>,
    pub sessions: Arc<SessionRepository>,
    pub settings: Arc<SettingsService>,
    pub audit: Arc<AuditLogRepository>,
    pub segments: Arc<SegmentRepository>,
    pub quality_progress: Arc<QualityProgressRepository>,
    pub deployment_events: Arc<DeploymentEventRepository>,
}

impl AppState {
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let catalog_config = vlog_catalog::CatalogConfig::from_env()?;
        let pool = vlog_catalog::connect(&catalog_config).await?;

        let storage = Arc::new(R2Client::from_env().await?);
        let bus = Arc::new(EventBus::new(&config.redis_url)?);

        Ok(Self {
            videos: Arc::new(VideoRepository::new(pool.clone())),
            jobs: Arc::new(JobRepository::new(pool.clone())),
            workers: Arc::new(WorkerRepository::new(pool.clone())),
            api_keys: Arc::new(ApiKeyRepository::new(pool.clone())),
            sessions: Arc::new(SessionRepository::new(pool.clone())),
            settings: Arc::new(SettingsService::new(pool.clone(), std::time::Duration::from_secs(30))),
            audit: Arc::new(AuditLogRepository::new(pool.clone())),
            segments: Arc::new(SegmentRepository::new(pool.clone())),
            quality_progress: Arc::new(QualityProgressRepository::new(pool.clone())),
            deployment_events: Arc::new(DeploymentEventRepository::new(pool.clone())),
            pool,
            storage,
            bus,
            config,
        })
    }
}
