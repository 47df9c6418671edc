//! Outcome log routes.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use relay_common::error::AppError;
use relay_common::types::SendLog;
use relay_queue::outcome::OutcomeLog;

use crate::middleware::auth::AdminAuth;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/admin/logs", get(list_logs))
}

#[derive(Debug, Deserialize)]
struct ListLogsParams {
    limit: Option<i64>,
}

/// GET /admin/logs — Recent send attempts, newest first.
async fn list_logs(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Query(params): Query<ListLogsParams>,
) -> Result<Json<Vec<SendLog>>, AppError> {
    let limit = params.limit.unwrap_or(100).clamp(1, 1000);
    let logs = OutcomeLog::list_recent(&state.pool, limit).await?;
    Ok(Json(logs))
}
