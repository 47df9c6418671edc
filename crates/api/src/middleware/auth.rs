//! Admin token guard.
//!
//! Every `/admin/*` route takes [`AdminAuth`] as an extractor, which
//! validates `Authorization: Bearer <token>` against the configured
//! `ADMIN_TOKEN`. This surface is for operators only; end users never
//! touch the dispatch engine directly.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use relay_common::error::AppError;

use crate::state::AppState;

/// Proof that the request carried the admin bearer token.
///
/// Use as an Axum extractor on protected routes:
/// ```ignore
/// async fn handler(_auth: AdminAuth) -> impl IntoResponse {
///     // only reached with a valid token
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct AdminAuth;

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let expected = state.config.admin_token.clone();
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        async move {
            let header = header
                .ok_or_else(|| AppError::Auth("Missing Authorization header".to_string()))?;

            let token = header.strip_prefix("Bearer ").ok_or_else(|| {
                AppError::Auth("Authorization header must be 'Bearer <token>'".to_string())
            })?;

            if token != expected {
                return Err(AppError::Auth("Invalid admin token".to_string()));
            }

            Ok(AdminAuth)
        }
    }
}
