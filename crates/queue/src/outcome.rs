//! Outcome log — append-only record of every send attempt.
//!
//! One row per attempt, success or failure, inserted by the send executor
//! outside any transaction shared with the task's status transition. Rows
//! are never updated; resends reference them by id.

use sqlx::PgPool;
use uuid::Uuid;

use relay_common::error::AppError;
use relay_common::types::{LogKind, OutcomeStatus, SendLog, TaskSource};

/// Fields for a new outcome log row.
#[derive(Debug, Clone)]
pub struct NewSendLog {
    pub task_id: Option<Uuid>,
    pub kind: LogKind,
    pub team_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub chat_id: Option<String>,
    pub message_text: String,
    pub photo_url: Option<String>,
    pub status: OutcomeStatus,
    pub provider_message_id: Option<i64>,
    pub error_detail: Option<String>,
    pub attempt: i32,
    pub source: TaskSource,
    pub duration_ms: i64,
}

/// Service layer over the `send_logs` table. Insert-only, plus reads for
/// resend-by-reference and the dashboard.
pub struct OutcomeLog;

impl OutcomeLog {
    /// Append one attempt record. Returns the generated log id.
    pub async fn record(pool: &PgPool, entry: &NewSendLog) -> Result<Uuid, AppError> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO send_logs
                (id, task_id, kind, team_id, client_id, chat_id, message_text,
                 photo_url, status, provider_message_id, error_detail, attempt,
                 source, duration_ms)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(id)
        .bind(entry.task_id)
        .bind(entry.kind)
        .bind(entry.team_id)
        .bind(entry.client_id)
        .bind(&entry.chat_id)
        .bind(&entry.message_text)
        .bind(&entry.photo_url)
        .bind(entry.status)
        .bind(entry.provider_message_id)
        .bind(&entry.error_detail)
        .bind(entry.attempt)
        .bind(entry.source)
        .bind(entry.duration_ms)
        .execute(pool)
        .await?;

        Ok(id)
    }

    /// Get a single log row by ID. Used to resolve resend references.
    pub async fn get(pool: &PgPool, log_id: Uuid) -> Result<SendLog, AppError> {
        let log: SendLog = sqlx::query_as("SELECT * FROM send_logs WHERE id = $1")
            .bind(log_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Send log {} not found", log_id)))?;

        Ok(log)
    }

    /// Recent log rows, newest first, for the dashboard.
    pub async fn list_recent(pool: &PgPool, limit: i64) -> Result<Vec<SendLog>, AppError> {
        let logs: Vec<SendLog> =
            sqlx::query_as("SELECT * FROM send_logs ORDER BY created_at DESC LIMIT $1")
                .bind(limit)
                .fetch_all(pool)
                .await?;

        Ok(logs)
    }
}
