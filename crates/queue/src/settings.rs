//! Dispatch settings store — the single runtime-tunable configuration row.
//!
//! Mutated only through the admin API; the worker reads it on each loop
//! iteration behind a short TTL cache, so edits take effect within seconds
//! without a restart. Eventual consistency across workers is fine: the row
//! only affects sleep durations and the retry policy, not correctness.

use std::time::{Duration, Instant};

use sqlx::PgPool;

use relay_common::error::AppError;
use relay_common::types::DispatchSettings;

const SETTINGS_COLUMNS: &str = "telegram_per_minute, telegram_per_chat_per_minute, min_delay_ms, \
     max_retry_attempts, retry_base_delay_ms, exponential_backoff, \
     circuit_failure_threshold, circuit_recovery_secs, enabled, updated_at";

/// Service layer over the `dispatch_settings` row.
pub struct SettingsStore;

/// Fields accepted by [`SettingsStore::update`]. Omitted fields keep their
/// current value.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct UpdateSettingsParams {
    pub telegram_per_minute: Option<i32>,
    pub telegram_per_chat_per_minute: Option<i32>,
    pub min_delay_ms: Option<i64>,
    pub max_retry_attempts: Option<i32>,
    pub retry_base_delay_ms: Option<i64>,
    pub exponential_backoff: Option<bool>,
    pub circuit_failure_threshold: Option<i32>,
    pub circuit_recovery_secs: Option<i64>,
    pub enabled: Option<bool>,
}

impl SettingsStore {
    /// Load the settings row. The row is seeded by migrations; a missing row
    /// is a deployment fault, not a runtime condition.
    pub async fn load(pool: &PgPool) -> Result<DispatchSettings, AppError> {
        let settings: DispatchSettings = sqlx::query_as(&format!(
            "SELECT {} FROM dispatch_settings WHERE id = 1",
            SETTINGS_COLUMNS
        ))
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::Config("dispatch_settings row missing".to_string()))?;

        Ok(settings)
    }

    /// Partially update the settings row and return the new state.
    pub async fn update(
        pool: &PgPool,
        params: &UpdateSettingsParams,
    ) -> Result<DispatchSettings, AppError> {
        if let Some(v) = params.telegram_per_minute {
            if v < 0 {
                return Err(AppError::Validation(
                    "telegram_per_minute must be >= 0".to_string(),
                ));
            }
        }
        if let Some(v) = params.max_retry_attempts {
            if v < 1 {
                return Err(AppError::Validation(
                    "max_retry_attempts must be >= 1".to_string(),
                ));
            }
        }

        let settings: DispatchSettings = sqlx::query_as(&format!(
            r#"
            UPDATE dispatch_settings
            SET telegram_per_minute = COALESCE($1, telegram_per_minute),
                telegram_per_chat_per_minute = COALESCE($2, telegram_per_chat_per_minute),
                min_delay_ms = COALESCE($3, min_delay_ms),
                max_retry_attempts = COALESCE($4, max_retry_attempts),
                retry_base_delay_ms = COALESCE($5, retry_base_delay_ms),
                exponential_backoff = COALESCE($6, exponential_backoff),
                circuit_failure_threshold = COALESCE($7, circuit_failure_threshold),
                circuit_recovery_secs = COALESCE($8, circuit_recovery_secs),
                enabled = COALESCE($9, enabled),
                updated_at = NOW()
            WHERE id = 1
            RETURNING {}
            "#,
            SETTINGS_COLUMNS
        ))
        .bind(params.telegram_per_minute)
        .bind(params.telegram_per_chat_per_minute)
        .bind(params.min_delay_ms)
        .bind(params.max_retry_attempts)
        .bind(params.retry_base_delay_ms)
        .bind(params.exponential_backoff)
        .bind(params.circuit_failure_threshold)
        .bind(params.circuit_recovery_secs)
        .bind(params.enabled)
        .fetch_one(pool)
        .await?;

        tracing::info!(
            telegram_per_minute = settings.telegram_per_minute,
            enabled = settings.enabled,
            "Dispatch settings updated"
        );

        Ok(settings)
    }
}

/// TTL cache over [`SettingsStore::load`], held by the worker so one settings
/// query does not precede every claim.
pub struct SettingsCache {
    ttl: Duration,
    cached: Option<(Instant, DispatchSettings)>,
}

impl SettingsCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, cached: None }
    }

    /// Current settings, refreshed from the database when the cached copy
    /// is older than the TTL.
    pub async fn get(&mut self, pool: &PgPool) -> Result<DispatchSettings, AppError> {
        if let Some((fetched_at, settings)) = &self.cached {
            if fetched_at.elapsed() < self.ttl {
                return Ok(settings.clone());
            }
        }

        let settings = SettingsStore::load(pool).await?;
        self.cached = Some((Instant::now(), settings.clone()));
        Ok(settings)
    }

    /// Drop the cached copy so the next `get` hits the database.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }
}
