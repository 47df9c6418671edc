//! Dispatcher — the single polling loop that drains the task queue.
//!
//! One task in flight at a time. Several worker processes may run against
//! the same database; the store's conditional-update claim keeps them from
//! executing the same task twice.
//!
//! Sleep points per iteration: the rate-limit pause after a delivered
//! send, a longer idle pause after an empty poll, and a defensive pause
//! after any loop-level error. A task-level failure never escapes the
//! loop — it becomes a retry-or-fail transition and polling continues.

use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::watch;

use relay_common::config::AppConfig;
use relay_common::error::AppError;
use relay_queue::backoff::BackoffPolicy;
use relay_queue::limiter;
use relay_queue::settings::SettingsCache;
use relay_queue::store::TaskStore;

use crate::executor::SendExecutor;

pub struct Dispatcher {
    pool: PgPool,
    executor: SendExecutor,
    settings: SettingsCache,
    idle_sleep: Duration,
    error_sleep: Duration,
}

impl Dispatcher {
    pub fn new(pool: PgPool, executor: SendExecutor, config: &AppConfig) -> Self {
        Self {
            pool,
            executor,
            settings: SettingsCache::new(Duration::from_secs(config.settings_cache_ttl_secs)),
            idle_sleep: Duration::from_millis(config.worker_idle_sleep_ms),
            error_sleep: Duration::from_millis(config.worker_error_sleep_ms),
        }
    }

    /// Run the polling loop until `shutdown` flips to true.
    ///
    /// The shutdown flag is only checked between iterations, so an
    /// in-flight attempt always runs to completion (including its status
    /// transition) before the loop exits; only the sleep is cut short.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        tracing::info!(
            idle_sleep_ms = self.idle_sleep.as_millis() as u64,
            error_sleep_ms = self.error_sleep.as_millis() as u64,
            "Dispatcher started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let pause = match self.run_once().await {
                Ok(pause) => pause,
                Err(e) => {
                    // Storage faults and other loop-level errors: back the
                    // whole loop off instead of crash-looping the process.
                    tracing::error!(error = %e, "Dispatcher iteration failed");
                    self.error_sleep
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = shutdown.changed() => {}
            }
        }

        tracing::info!("Dispatcher stopped");
        Ok(())
    }

    /// One iteration: claim at most one due task, execute it, apply the
    /// outcome transition. Returns the pause before the next poll.
    pub async fn run_once(&mut self) -> Result<Duration, AppError> {
        let settings = self.settings.get(&self.pool).await?;
        if !settings.enabled {
            tracing::debug!("Dispatch disabled, idling");
            return Ok(self.idle_sleep);
        }

        let task = match TaskStore::claim_next_due(&self.pool, Utc::now()).await {
            Ok(Some(task)) => task,
            Ok(None) => return Ok(self.idle_sleep),
            // Heavy contention: other workers are draining the queue, so an
            // idle pause is the right response, not an error.
            Err(AppError::ClaimRace) => return Ok(self.idle_sleep),
            Err(e) => return Err(e),
        };

        tracing::debug!(
            task_id = %task.id,
            task_type = %task.task_type,
            attempts = task.attempts,
            "Task claimed"
        );

        let outcome = self.executor.execute(&task).await?;

        if outcome.success {
            TaskStore::complete(&self.pool, task.id).await?;
            Ok(limiter::pause_after_send(&settings))
        } else {
            let attempts = task.attempts + 1;
            let policy = BackoffPolicy::new(
                settings.retry_base_delay_ms,
                settings.exponential_backoff,
            );
            let error = outcome
                .error
                .unwrap_or_else(|| "unknown send failure".to_string());
            TaskStore::retry_or_fail(&self.pool, task.id, attempts, &policy, &error).await?;
            Ok(self.error_sleep)
        }
    }
}
