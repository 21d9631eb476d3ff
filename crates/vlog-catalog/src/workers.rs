//! Worker registry repository.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use vlog_models::ids::{JobId, WorkerId};
use vlog_models::worker::{Worker, WorkerStatus, WorkerType, MAX_BOUNDED_RECORD_BYTES};

use crate::error::{CatalogError, CatalogResult};

pub struct WorkerRepository {
    pool: PgPool,
}

#[derive(FromRow)]
struct WorkerRow {
    worker_id: Uuid,
    worker_name: String,
    worker_type: String,
    status: String,
    registered_at: DateTime<Utc>,
    last_heartbeat: DateTime<Utc>,
    current_job_id: Option<Uuid>,
    capabilities: Value,
    metadata: Value,
}

const SELECT_COLUMNS: &str = "worker_id, worker_name, worker_type, status, registered_at, \
     last_heartbeat, current_job_id, capabilities, metadata";

fn parse_worker_type(s: &str) -> CatalogResult<WorkerType> {
    match s {
        "local" => Ok(WorkerType::Local),
        "remote" => Ok(WorkerType::Remote),
        other => Err(CatalogError::ConstraintViolation(format!("unknown worker type: {other}"))),
    }
}

fn parse_worker_status(s: &str) -> CatalogResult<WorkerStatus> {
    match s {
        "active" => Ok(WorkerStatus::Active),
        "idle" => Ok(WorkerStatus::Idle),
        "busy" => Ok(WorkerStatus::Busy),
        "offline" => Ok(WorkerStatus::Offline),
        "disabled" => Ok(WorkerStatus::Disabled),
        other => Err(CatalogError::ConstraintViolation(format!("unknown worker status: {other}"))),
    }
}

fn worker_status_str(status: WorkerStatus) -> &'static str {
    match status {
        WorkerStatus::Active => "active",
        WorkerStatus::Idle => "idle",
        WorkerStatus::Busy => "busy",
        WorkerStatus::Offline => "offline",
        WorkerStatus::Disabled => "disabled",
    }
}

fn json_to_map(v: Value) -> HashMap<String, Value> {
    match v {
        Value::Object(map) => map.into_iter().collect(),
        _ => HashMap::new(),
    }
}

impl WorkerRow {
    fn into_worker(self) -> CatalogResult<Worker> {
        Ok(Worker {
            worker_id: WorkerId::from(self.worker_id),
            worker_name: self.worker_name,
            worker_type: parse_worker_type(&self.worker_type)?,
            registered_at: self.registered_at,
            last_heartbeat: self.last_heartbeat,
            status: parse_worker_status(&self.status)?,
            current_job_id: self.current_job_id.map(JobId::from),
            capabilities: json_to_map(self.capabilities),
            metadata: json_to_map(self.metadata),
        })
    }
}

pub struct NewWorker {
    pub worker_name: String,
    pub worker_type: WorkerType,
    pub capabilities: HashMap<String, Value>,
    pub metadata: HashMap<String, Value>,
}

/// Validates a capabilities/metadata record against the bounded-schema
/// limit shared with the worker-registration endpoint.
pub fn validate_bounded_record(record: &HashMap<String, Value>) -> CatalogResult<()> {
    let encoded = serde_json::to_vec(record)?;
    if encoded.len() > MAX_BOUNDED_RECORD_BYTES {
        return Err(CatalogError::validation(format!(
            "record exceeds {MAX_BOUNDED_RECORD_BYTES} bytes"
        )));
    }
    Ok(())
}

impl WorkerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn register(&self, new_worker: NewWorker) -> CatalogResult<WorkerId> {
        validate_bounded_record(&new_worker.capabilities)?;
        validate_bounded_record(&new_worker.metadata)?;

        let id = Uuid::new_v4();
        let worker_type = match new_worker.worker_type {
            WorkerType::Local => "local",
            WorkerType::Remote => "remote",
        };
        sqlx::query(
            "INSERT INTO workers (worker_id, worker_name, worker_type, capabilities, metadata) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(&new_worker.worker_name)
        .bind(worker_type)
        .bind(serde_json::to_value(&new_worker.capabilities)?)
        .bind(serde_json::to_value(&new_worker.metadata)?)
        .execute(&self.pool)
        .await?;
        Ok(WorkerId::from(id))
    }

    pub async fn get(&self, id: WorkerId) -> CatalogResult<Worker> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM workers WHERE worker_id = $1");
        let row: WorkerRow = sqlx::query_as(&query)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CatalogError::not_found(format!("worker {id}")))?;
        row.into_worker()
    }

    pub async fn list(&self) -> CatalogResult<Vec<Worker>> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM workers ORDER BY registered_at DESC");
        let rows: Vec<WorkerRow> = sqlx::query_as(&query).fetch_all(&self.pool).await?;
        rows.into_iter().map(WorkerRow::into_worker).collect()
    }

    pub async fn heartbeat(
        &self,
        id: WorkerId,
        status: WorkerStatus,
        metadata: Option<HashMap<String, Value>>,
        now: DateTime<Utc>,
    ) -> CatalogResult<()> {
        if let Some(ref m) = metadata {
            validate_bounded_record(m)?;
        }
        let rows = if let Some(metadata) = metadata {
            sqlx::query(
                "UPDATE workers SET status = $1, last_heartbeat = $2, metadata = $3 WHERE worker_id = $4",
            )
            .bind(worker_status_str(status))
            .bind(now)
            .bind(serde_json::to_value(&metadata)?)
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query("UPDATE workers SET status = $1, last_heartbeat = $2 WHERE worker_id = $3")
                .bind(worker_status_str(status))
                .bind(now)
                .bind(id.as_uuid())
                .execute(&self.pool)
                .await?
        };
        if rows.rows_affected() == 0 {
            return Err(CatalogError::not_found(format!("worker {id}")));
        }
        Ok(())
    }

    pub async fn set_current_job(&self, id: WorkerId, job_id: Option<JobId>) -> CatalogResult<()> {
        sqlx::query("UPDATE workers SET current_job_id = $1 WHERE worker_id = $2")
            .bind(job_id.map(|j| j.as_uuid()))
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Marks workers `offline` and clears their current job when their
    /// last heartbeat is older than `offline_after`.
    pub async fn mark_stale_offline(&self, now: DateTime<Utc>, offline_after: Duration) -> CatalogResult<u64> {
        let threshold = now - offline_after;
        let rows = sqlx::query(
            "UPDATE workers SET status = 'offline', current_job_id = NULL \
             WHERE last_heartbeat < $1 AND status != 'offline' AND status != 'disabled'",
        )
        .bind(threshold)
        .execute(&self.pool)
        .await?;
        Ok(rows.rows_affected())
    }

    pub async fn revoke(&self, id: WorkerId) -> CatalogResult<()> {
        let rows = sqlx::query("UPDATE workers SET status = 'disabled', current_job_id = NULL WHERE worker_id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        if rows.rows_affected() == 0 {
            return Err(CatalogError::not_found(format!("worker {id}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_record_rejects_oversized() {
        let mut record = HashMap::new();
        record.insert("blob".to_string(), Value::String("x".repeat(MAX_BOUNDED_RECORD_BYTES)));
        assert!(validate_bounded_record(&record).is_err());
    }

    #[test]
    fn bounded_record_accepts_small() {
        let mut record = HashMap::new();
        record.insert("gpu".to_string(), Value::String("nvenc".into()));
        assert!(validate_bounded_record(&record).is_ok());
    }
}
