//! Dispatch settings routes.

use axum::extract::State;
use axum::routing::{get, put};
use axum::{Json, Router};

use relay_common::error::AppError;
use relay_common::types::DispatchSettings;
use relay_queue::settings::{SettingsStore, UpdateSettingsParams};

use crate::middleware::auth::AdminAuth;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/settings", get(get_settings))
        .route("/admin/settings", put(update_settings))
}

/// GET /admin/settings — The current dispatch settings row.
async fn get_settings(
    State(state): State<AppState>,
    _auth: AdminAuth,
) -> Result<Json<DispatchSettings>, AppError> {
    let settings = SettingsStore::load(&state.pool).await?;
    Ok(Json(settings))
}

/// PUT /admin/settings — Partial update; omitted fields keep their values.
/// Workers pick the change up within their settings cache TTL.
async fn update_settings(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Json(params): Json<UpdateSettingsParams>,
) -> Result<Json<DispatchSettings>, AppError> {
    let settings = SettingsStore::update(&state.pool, &params).await?;
    Ok(Json(settings))
}
