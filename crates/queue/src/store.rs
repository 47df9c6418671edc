//! Task store — durable queue operations over the `tasks` table.
//!
//! Only the dispatcher writes status transitions; producers only insert
//! new rows. Claiming is select-then-conditional-update, so multiple
//! worker processes can poll the same table safely: losing a claim race
//! costs one re-poll, nothing more.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use relay_common::error::AppError;
use relay_common::types::{Task, TaskPayload, TaskStatus};

use crate::backoff::BackoffPolicy;

/// How many lost claim races `claim_next_due` absorbs before giving up
/// for this poll. Contention that heavy means other workers are draining
/// the queue anyway.
const CLAIM_RACE_RETRIES: u32 = 5;

/// Queue depth per status, for the operator dashboard.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct QueueDepths {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
}

/// Service layer over the `tasks` table.
pub struct TaskStore;

impl TaskStore {
    /// Insert a new pending task. Returns the generated task id.
    pub async fn enqueue(
        pool: &PgPool,
        payload: &TaskPayload,
        execute_at: DateTime<Utc>,
        max_attempts: i32,
    ) -> Result<Uuid, AppError> {
        let id = Uuid::new_v4();
        let task_type = payload.task_type();
        let payload_json = serde_json::to_value(payload)
            .map_err(|e| AppError::Validation(format!("Unserializable payload: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO tasks (id, task_type, payload, status, attempts, max_attempts, execute_at)
            VALUES ($1, $2, $3, 'pending', 0, $4, $5)
            "#,
        )
        .bind(id)
        .bind(task_type)
        .bind(&payload_json)
        .bind(max_attempts)
        .bind(execute_at)
        .execute(pool)
        .await?;

        tracing::info!(
            task_id = %id,
            task_type = %task_type,
            execute_at = %execute_at,
            "Task enqueued"
        );

        Ok(id)
    }

    /// Get a single task by ID.
    pub async fn get(pool: &PgPool, task_id: Uuid) -> Result<Task, AppError> {
        let task: Task = sqlx::query_as("SELECT * FROM tasks WHERE id = $1")
            .bind(task_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Task {} not found", task_id)))?;

        Ok(task)
    }

    /// Atomically claim ownership of a specific pending task.
    ///
    /// The conditional update only succeeds if the row is still `pending`;
    /// zero rows affected means another worker claimed it first and maps to
    /// [`AppError::ClaimRace`], distinct from a storage fault.
    pub async fn try_claim(pool: &PgPool, task_id: Uuid) -> Result<Task, AppError> {
        let claimed: Option<Task> = sqlx::query_as(
            r#"
            UPDATE tasks
            SET status = 'processing', updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(task_id)
        .fetch_optional(pool)
        .await?;

        claimed.ok_or(AppError::ClaimRace)
    }

    /// Claim the next due pending task, oldest `execute_at` first with
    /// `created_at` as the FIFO tie-break.
    ///
    /// Returns `Ok(None)` when nothing is due. Lost claim races are retried
    /// against the next candidate up to [`CLAIM_RACE_RETRIES`] times, after
    /// which the race error surfaces so the caller can back off the poll.
    pub async fn claim_next_due(
        pool: &PgPool,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>, AppError> {
        for _ in 0..CLAIM_RACE_RETRIES {
            let candidate: Option<(Uuid,)> = sqlx::query_as(
                r#"
                SELECT id FROM tasks
                WHERE status = 'pending' AND execute_at <= $1
                ORDER BY execute_at ASC, created_at ASC
                LIMIT 1
                "#,
            )
            .bind(now)
            .fetch_optional(pool)
            .await?;

            let Some((task_id,)) = candidate else {
                return Ok(None);
            };

            match Self::try_claim(pool, task_id).await {
                Ok(task) => return Ok(Some(task)),
                Err(AppError::ClaimRace) => {
                    tracing::debug!(task_id = %task_id, "Claim lost, re-polling");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::ClaimRace)
    }

    /// Mark a claimed task completed. Only a `processing` row transitions;
    /// calling this on a terminal row is a no-op.
    pub async fn complete(pool: &PgPool, task_id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'completed', updated_at = NOW()
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(task_id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::warn!(task_id = %task_id, "complete() on a non-processing task, ignored");
        }

        Ok(())
    }

    /// Resolve a failed attempt: requeue with backoff while attempts remain,
    /// otherwise mark the task terminally failed.
    ///
    /// `attempts` is the count after incrementing for the current failure.
    /// Only a `processing` row transitions, so terminal rows stay terminal.
    pub async fn retry_or_fail(
        pool: &PgPool,
        task_id: Uuid,
        attempts: i32,
        policy: &BackoffPolicy,
        error: &str,
    ) -> Result<TaskStatus, AppError> {
        let next_execute_at = policy.next_execute_at(Utc::now(), attempts);

        let updated: Option<Task> = sqlx::query_as(
            r#"
            UPDATE tasks
            SET attempts = $2,
                error_message = $3,
                status = CASE WHEN $2 < max_attempts THEN 'pending' ELSE 'failed' END,
                execute_at = CASE WHEN $2 < max_attempts THEN $4 ELSE execute_at END,
                updated_at = NOW()
            WHERE id = $1 AND status = 'processing'
            RETURNING *
            "#,
        )
        .bind(task_id)
        .bind(attempts)
        .bind(error)
        .bind(next_execute_at)
        .fetch_optional(pool)
        .await?;

        match updated {
            Some(task) => {
                match task.status {
                    TaskStatus::Pending => tracing::info!(
                        task_id = %task_id,
                        attempts,
                        next_execute_at = %task.execute_at,
                        "Task requeued for retry"
                    ),
                    _ => tracing::warn!(
                        task_id = %task_id,
                        attempts,
                        error,
                        "Task failed permanently"
                    ),
                }
                Ok(task.status)
            }
            None => {
                tracing::warn!(task_id = %task_id, "retry_or_fail() on a non-processing task, ignored");
                // Report the row's actual state so callers can log it.
                Ok(Self::get(pool, task_id).await?.status)
            }
        }
    }

    /// Force any `processing` task whose `updatedAt` is older than the
    /// threshold back to `pending`. Recovers tasks orphaned by a crashed
    /// worker; invoked manually (or periodically) through the admin API.
    pub async fn release_stale(pool: &PgPool, older_than_minutes: i32) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'pending', updated_at = NOW()
            WHERE status = 'processing'
              AND updated_at < NOW() - make_interval(mins => $1)
            "#,
        )
        .bind(older_than_minutes)
        .execute(pool)
        .await?;

        let released = result.rows_affected();
        if released > 0 {
            tracing::warn!(released, older_than_minutes, "Released stale processing tasks");
        }

        Ok(released)
    }

    /// Task counts by status, for the dashboard.
    pub async fn counts_by_status(pool: &PgPool) -> Result<QueueDepths, AppError> {
        let rows: Vec<(TaskStatus, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM tasks GROUP BY status")
                .fetch_all(pool)
                .await?;

        let mut depths = QueueDepths::default();
        for (status, count) in rows {
            match status {
                TaskStatus::Pending => depths.pending = count,
                TaskStatus::Processing => depths.processing = count,
                TaskStatus::Completed => depths.completed = count,
                TaskStatus::Failed => depths.failed = count,
            }
        }

        Ok(depths)
    }

    /// Recent tasks, newest first, optionally filtered by status.
    pub async fn list_recent(
        pool: &PgPool,
        status: Option<TaskStatus>,
        limit: i64,
    ) -> Result<Vec<Task>, AppError> {
        let tasks: Vec<Task> = match status {
            Some(status) => {
                sqlx::query_as(
                    "SELECT * FROM tasks WHERE status = $1 ORDER BY created_at DESC LIMIT $2",
                )
                .bind(status)
                .bind(limit)
                .fetch_all(pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM tasks ORDER BY created_at DESC LIMIT $1")
                    .bind(limit)
                    .fetch_all(pool)
                    .await?
            }
        };

        Ok(tasks)
    }

    /// Operator override: mark a non-terminal task failed.
    pub async fn force_fail(pool: &PgPool, task_id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'failed',
                error_message = 'Force-failed by operator',
                updated_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'processing')
            "#,
        )
        .bind(task_id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish "no such task" from "already terminal".
            let task = Self::get(pool, task_id).await?;
            return Err(AppError::Conflict(format!(
                "Task {} is already {}",
                task_id, task.status
            )));
        }

        tracing::info!(task_id = %task_id, "Task force-failed by operator");
        Ok(())
    }

    /// Delete a task. Refused while a worker owns it.
    pub async fn delete(pool: &PgPool, task_id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND status != 'processing'")
            .bind(task_id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            let task = Self::get(pool, task_id).await?;
            return Err(AppError::Conflict(format!(
                "Task {} is {} and cannot be deleted",
                task_id, task.status
            )));
        }

        tracing::info!(task_id = %task_id, "Task deleted");
        Ok(())
    }

    /// Bulk requeue of failed tasks created in a date range: back to
    /// `pending`, attempts reset, due immediately.
    pub async fn resend_failed_range(
        pool: &PgPool,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'pending',
                attempts = 0,
                error_message = NULL,
                execute_at = NOW(),
                updated_at = NOW()
            WHERE status = 'failed' AND created_at >= $1 AND created_at <= $2
            "#,
        )
        .bind(from)
        .bind(to)
        .execute(pool)
        .await?;

        let requeued = result.rows_affected();
        tracing::info!(requeued, %from, %to, "Bulk resend of failed tasks");

        Ok(requeued)
    }
}
