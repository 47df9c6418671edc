//! Queue administration routes: depths, task listing, operator overrides,
//! bulk resend, stale-claim release, and the manual test-send producer.

use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use relay_common::error::AppError;
use relay_common::types::{Task, TaskPayload, TaskSource, TaskStatus};
use relay_queue::settings::SettingsStore;
use relay_queue::store::{QueueDepths, TaskStore};

use crate::middleware::auth::AdminAuth;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/queue", get(queue_depths))
        .route("/admin/tasks", get(list_tasks))
        .route("/admin/tasks/{id}/force-fail", post(force_fail_task))
        .route("/admin/tasks/{id}", delete(delete_task))
        .route("/admin/tasks/resend-failed", post(resend_failed))
        .route("/admin/tasks/release-stale", post(release_stale))
        .route("/admin/test-send", post(test_send))
}

/// GET /admin/queue — Task counts by status.
async fn queue_depths(
    State(state): State<AppState>,
    _auth: AdminAuth,
) -> Result<Json<QueueDepths>, AppError> {
    let depths = TaskStore::counts_by_status(&state.pool).await?;
    Ok(Json(depths))
}

#[derive(Debug, Deserialize)]
struct ListTasksParams {
    status: Option<TaskStatus>,
    limit: Option<i64>,
}

/// GET /admin/tasks — Recent tasks, optionally filtered by status.
async fn list_tasks(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Query(params): Query<ListTasksParams>,
) -> Result<Json<Vec<Task>>, AppError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 500);
    let tasks = TaskStore::list_recent(&state.pool, params.status, limit).await?;
    Ok(Json(tasks))
}

/// POST /admin/tasks/:id/force-fail — Mark a non-terminal task failed.
async fn force_fail_task(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    TaskStore::force_fail(&state.pool, id).await?;
    Ok(Json(serde_json::json!({"forced": true})))
}

/// DELETE /admin/tasks/:id — Delete a task unless a worker owns it.
async fn delete_task(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    TaskStore::delete(&state.pool, id).await?;
    Ok(Json(serde_json::json!({"deleted": true})))
}

#[derive(Debug, Deserialize)]
struct ResendFailedParams {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

/// POST /admin/tasks/resend-failed — Requeue all failed tasks in a range.
async fn resend_failed(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Json(params): Json<ResendFailedParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    if params.from > params.to {
        return Err(AppError::Validation(
            "'from' must not be after 'to'".to_string(),
        ));
    }
    let requeued = TaskStore::resend_failed_range(&state.pool, params.from, params.to).await?;
    Ok(Json(serde_json::json!({"requeued": requeued})))
}

#[derive(Debug, Deserialize)]
struct ReleaseStaleParams {
    older_than_minutes: i32,
}

/// POST /admin/tasks/release-stale — Recover tasks orphaned by a crashed
/// worker: processing rows untouched for N minutes go back to pending.
async fn release_stale(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Json(params): Json<ReleaseStaleParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    if params.older_than_minutes < 1 {
        return Err(AppError::Validation(
            "older_than_minutes must be >= 1".to_string(),
        ));
    }
    let released = TaskStore::release_stale(&state.pool, params.older_than_minutes).await?;
    Ok(Json(serde_json::json!({"released": released})))
}

#[derive(Debug, Deserialize)]
struct TestSendParams {
    team_id: Uuid,
    client_id: Uuid,
    message: String,
}

/// POST /admin/test-send — Manual producer: enqueue a send_message task
/// due immediately, attributed to the manual source.
async fn test_send(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Json(params): Json<TestSendParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    if params.message.trim().is_empty() {
        return Err(AppError::Validation("message must not be empty".to_string()));
    }

    let settings = SettingsStore::load(&state.pool).await?;
    let payload = TaskPayload::SendMessage {
        team_id: params.team_id,
        client_id: params.client_id,
        message: params.message,
        source: TaskSource::Manual,
    };
    let task_id = TaskStore::enqueue(
        &state.pool,
        &payload,
        Utc::now(),
        settings.max_retry_attempts,
    )
    .await?;

    Ok(Json(serde_json::json!({"task_id": task_id})))
}
