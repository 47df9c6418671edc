use serde::Deserialize;

/// Global application configuration loaded from environment variables.
///
/// Runtime-tunable dispatch behavior (rate ceilings, retry policy) lives in
/// the `dispatch_settings` table instead — see `relay_queue::settings`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Static bearer token protecting the admin API
    pub admin_token: String,

    /// Base URL of the Telegram Bot API (overridable for tests)
    pub telegram_api_base: String,

    /// Timeout for a single outbound Telegram call, in seconds (default: 20)
    pub telegram_send_timeout_secs: u64,

    /// Worker sleep after an empty poll, in milliseconds (default: 1000)
    pub worker_idle_sleep_ms: u64,

    /// Worker sleep after a loop-level error, in milliseconds (default: 2000)
    pub worker_error_sleep_ms: u64,

    /// How long the worker caches the dispatch_settings row, in seconds (default: 10)
    pub settings_cache_ttl_secs: u64,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            admin_token: std::env::var("ADMIN_TOKEN")
                .map_err(|_| anyhow::anyhow!("ADMIN_TOKEN environment variable is required"))?,
            telegram_api_base: std::env::var("TELEGRAM_API_BASE")
                .unwrap_or_else(|_| "https://api.telegram.org".to_string()),
            telegram_send_timeout_secs: std::env::var("TELEGRAM_SEND_TIMEOUT_SECS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("TELEGRAM_SEND_TIMEOUT_SECS must be a valid u64"))?,
            worker_idle_sleep_ms: std::env::var("WORKER_IDLE_SLEEP_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("WORKER_IDLE_SLEEP_MS must be a valid u64"))?,
            worker_error_sleep_ms: std::env::var("WORKER_ERROR_SLEEP_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("WORKER_ERROR_SLEEP_MS must be a valid u64"))?,
            settings_cache_ttl_secs: std::env::var("SETTINGS_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SETTINGS_CACHE_TTL_SECS must be a valid u64"))?,
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
        })
    }
}
