//! Append-only deployment event log for operator worker actions.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use vlog_models::deployment_event::{DeploymentEvent, DeploymentEventType};
use vlog_models::ids::{DeploymentEventId, WorkerId};

use crate::error::{CatalogError, CatalogResult};

pub struct DeploymentEventRepository {
    pool: PgPool,
}

#[derive(FromRow)]
struct DeploymentEventRow {
    id: Uuid,
    worker_id: Uuid,
    event_type: String,
    old_version: Option<String>,
    new_version: Option<String>,
    status: String,
    triggered_by: String,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

fn event_type_str(t: DeploymentEventType) -> &'static str {
    match t {
        DeploymentEventType::Restart => "restart",
        DeploymentEventType::Stop => "stop",
        DeploymentEventType::Update => "update",
        DeploymentEventType::Deploy => "deploy",
        DeploymentEventType::Rollback => "rollback",
        DeploymentEventType::VersionChange => "version_change",
    }
}

fn parse_event_type(s: &str) -> CatalogResult<DeploymentEventType> {
    match s {
        "restart" => Ok(DeploymentEventType::Restart),
        "stop" => Ok(DeploymentEventType::Stop),
        "update" => Ok(DeploymentEventType::Update),
        "deploy" => Ok(DeploymentEventType::Deploy),
        "rollback" => Ok(DeploymentEventType::Rollback),
        "version_change" => Ok(DeploymentEventType::VersionChange),
        other => Err(CatalogError::ConstraintViolation(format!("unknown event type: {other}"))),
    }
}

impl DeploymentEventRow {
    fn into_event(self) -> CatalogResult<DeploymentEvent> {
        Ok(DeploymentEvent {
            id: DeploymentEventId::from(self.id),
            worker_id: WorkerId::from(self.worker_id),
            event_type: parse_event_type(&self.event_type)?,
            old_version: self.old_version,
            new_version: self.new_version,
            status: self.status,
            triggered_by: self.triggered_by,
            created_at: self.created_at,
            completed_at: self.completed_at,
        })
    }
}

impl DeploymentEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn record(
        &self,
        worker_id: WorkerId,
        event_type: DeploymentEventType,
        old_version: Option<&str>,
        new_version: Option<&str>,
        triggered_by: &str,
    ) -> CatalogResult<DeploymentEventId> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO deployment_events \
             (id, worker_id, event_type, old_version, new_version, status, triggered_by) \
             VALUES ($1, $2, $3, $4, $5, 'pending', $6)",
        )
        .bind(id)
        .bind(worker_id.as_uuid())
        .bind(event_type_str(event_type))
        .bind(old_version)
        .bind(new_version)
        .bind(triggered_by)
        .execute(&self.pool)
        .await?;
        Ok(DeploymentEventId::from(id))
    }

    pub async fn mark_completed(&self, id: DeploymentEventId, status: &str, now: DateTime<Utc>) -> CatalogResult<()> {
        sqlx::query("UPDATE deployment_events SET status = $1, completed_at = $2 WHERE id = $3")
            .bind(status)
            .bind(now)
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_for_worker(&self, worker_id: WorkerId) -> CatalogResult<Vec<DeploymentEvent>> {
        let rows: Vec<DeploymentEventRow> = sqlx::query_as(
            "SELECT id, worker_id, event_type, old_version, new_version, status, triggered_by, \
             created_at, completed_at FROM deployment_events WHERE worker_id = $1 ORDER BY created_at DESC",
        )
        .bind(worker_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(DeploymentEventRow::into_event).collect()
    }
}
