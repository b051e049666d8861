use std::sync::Arc;

use clap::Parser;
use slot_limit::DirLockStore;
use slot_limit::LockManager;
use tokio::sync::mpsc;
use tower::BoxError;
use tracing_subscriber::EnvFilter;

use ping::CycleReport;
use ping::PingConfig;
use ping::PingCoordinator;
use ping::PingScheduler;
use ping::PongClient;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = PingConfig::parse();
    let store = DirLockStore::open(config.lock_dir()).await?;
    let client = PongClient::new(config.pong_url.clone(), config.request_timeout)?;
    let pong_url = client.url().to_owned();
    let lock_dir = store.dir().to_path_buf();

    let coordinator = PingCoordinator::new(
        LockManager::new(Arc::new(store)),
        client,
        config.lock_keys.clone(),
        config.grace_delay,
    );
    tracing::info!(
        %pong_url,
        lock_dir = %lock_dir.display(),
        lock_keys = ?coordinator.keys(),
        tick_interval = ?config.tick_interval,
        grace_delay = ?coordinator.grace(),
        "ping starting"
    );
    let scheduler = PingScheduler::new(Arc::new(coordinator), config.tick_interval);

    let (reports, mut received) = mpsc::unbounded_channel::<CycleReport>();
    let logger = tokio::spawn(async move {
        while let Some(report) = received.recv().await {
            report.log();
        }
    });

    let ticks = scheduler.run(reports, shutdown_signal()).await;
    logger.await?;
    tracing::info!(ticks, "ping stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "could not listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("ping shutting down");
}
