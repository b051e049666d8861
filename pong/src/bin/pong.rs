use std::sync::Arc;

use clap::Parser;
use slot_limit::AdmissionWindow;
use tokio::net::TcpListener;
use tower::BoxError;
use tracing_subscriber::EnvFilter;

use pong::PONG_PATH;
use pong::PongConfig;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = PongConfig::parse();
    let window = Arc::new(AdmissionWindow::new(config.max_requests_per_second));
    let max_rps = window.limit();
    let app = pong::router(window, config.processing_delay);

    let listener = TcpListener::bind(config.listen).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        path = PONG_PATH,
        max_rps,
        processing_delay = ?config.processing_delay,
        "pong listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "could not listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("pong shutting down");
}
