//! Best-effort audit log writer (§4.3).
//!
//! A failure to append an audit row must never fail the admin action it
//! records, so [`AuditLogRepository::record`] swallows its own storage
//! errors after logging them at `warn`.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use vlog_models::audit::{truncate_string, AuditAction, AuditLogEntry, AUDIT_ERROR_MAX_LEN, AUDIT_USER_AGENT_MAX_LEN};

use crate::error::{CatalogError, CatalogResult};

pub struct AuditLogRepository {
    pool: PgPool,
}

#[derive(FromRow)]
struct AuditLogRow {
    timestamp: DateTime<Utc>,
    action: String,
    client_ip: Option<String>,
    user_agent: Option<String>,
    resource_type: String,
    resource_id: String,
    resource_name: Option<String>,
    details: Value,
    success: bool,
    error: Option<String>,
    request_id: String,
}

const SELECT_COLUMNS: &str = "timestamp, action, client_ip, user_agent, resource_type, resource_id, \
     resource_name, details, success, error, request_id";

fn parse_action(s: &str) -> CatalogResult<AuditAction> {
    use AuditAction::*;
    Ok(match s {
        "video_upload" => VideoUpload,
        "video_update" => VideoUpdate,
        "video_delete" => VideoDelete,
        "video_restore" => VideoRestore,
        "video_retry" => VideoRetry,
        "video_retranscode" => VideoRetranscode,
        "job_retry" => JobRetry,
        "transcoding_start" => TranscodingStart,
        "transcoding_complete" => TranscodingComplete,
        "transcoding_failed" => TranscodingFailed,
        "worker_register" => WorkerRegister,
        "worker_revoke" => WorkerRevoke,
        "worker_disable" => WorkerDisable,
        "worker_enable" => WorkerEnable,
        "worker_delete" => WorkerDelete,
        "worker_restart" => WorkerRestart,
        "worker_update" => WorkerUpdate,
        "settings_change" => SettingsChange,
        other => return Err(CatalogError::ConstraintViolation(format!("unknown audit action: {other}"))),
    })
}

impl AuditLogRow {
    fn into_entry(self) -> CatalogResult<AuditLogEntry> {
        Ok(AuditLogEntry {
            timestamp: self.timestamp,
            action: parse_action(&self.action)?,
            client_ip: self.client_ip,
            user_agent: self.user_agent,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            resource_name: self.resource_name,
            details: self.details,
            success: self.success,
            error: self.error,
            request_id: self.request_id,
        })
    }
}

impl AuditLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, mut entry: AuditLogEntry) {
        entry.user_agent = entry.user_agent.map(|ua| truncate_string(&ua, AUDIT_USER_AGENT_MAX_LEN));
        entry.error = entry.error.map(|e| truncate_string(&e, AUDIT_ERROR_MAX_LEN));

        let result = sqlx::query(
            "INSERT INTO audit_log \
             (id, timestamp, action, client_ip, user_agent, resource_type, resource_id, \
              resource_name, details, success, error, request_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(Uuid::new_v4())
        .bind(entry.timestamp)
        .bind(action_str(entry.action))
        .bind(&entry.client_ip)
        .bind(&entry.user_agent)
        .bind(&entry.resource_type)
        .bind(&entry.resource_id)
        .bind(&entry.resource_name)
        .bind::<Value>(entry.details)
        .bind(entry.success)
        .bind(&entry.error)
        .bind(&entry.request_id)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            tracing::warn!(error = %e, action = entry.action.as_str(), "failed to append audit log entry");
        }
    }

    /// Most recent entries first, optionally narrowed to one resource type.
    pub async fn query(
        &self,
        resource_type: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> CatalogResult<Vec<AuditLogEntry>> {
        let rows: Vec<AuditLogRow> = match resource_type {
            Some(rt) => {
                let query = format!(
                    "SELECT {SELECT_COLUMNS} FROM audit_log WHERE resource_type = $1 \
                     ORDER BY timestamp DESC LIMIT $2 OFFSET $3"
                );
                sqlx::query_as(&query).bind(rt).bind(limit).bind(offset).fetch_all(&self.pool).await?
            }
            None => {
                let query =
                    format!("SELECT {SELECT_COLUMNS} FROM audit_log ORDER BY timestamp DESC LIMIT $1 OFFSET $2");
                sqlx::query_as(&query).bind(limit).bind(offset).fetch_all(&self.pool).await?
            }
        };
        rows.into_iter().map(AuditLogRow::into_entry).collect()
    }
}

fn action_str(action: AuditAction) -> &'static str {
    action.as_str()
}
