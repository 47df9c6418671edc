use tokio::sync::watch;

use relay_common::config::AppConfig;
use relay_common::db;

use relay_worker::dispatcher::Dispatcher;
use relay_worker::executor::SendExecutor;
use relay_worker::telegram::TelegramClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_worker=info,relay_queue=info".into()),
        )
        .json()
        .init();

    tracing::info!("SalonRelay worker starting...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Connect to database
    let pool = db::create_pool(&config).await?;

    // Run migrations
    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    let telegram = TelegramClient::new(
        config.telegram_api_base.clone(),
        config.telegram_send_timeout_secs,
    )?;
    let executor = SendExecutor::new(pool.clone(), telegram);
    let mut dispatcher = Dispatcher::new(pool, executor, &config);

    // Flip the shutdown flag on Ctrl+C; the dispatcher finishes its
    // in-flight attempt before exiting instead of abandoning it.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received shutdown signal, stopping after current task...");
            let _ = shutdown_tx.send(true);
        }
    });

    dispatcher.run(shutdown_rx).await?;

    tracing::info!("SalonRelay worker stopped.");
    Ok(())
}
