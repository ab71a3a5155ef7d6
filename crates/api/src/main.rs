use std::sync::Arc;

use anyhow::Context;

use wallets_api::app::{build_app, build_services};
use wallets_api::config::Config;
use wallets_api::shutdown::{serve_with_grace, shutdown_signal};
use wallets_observability::Metrics;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is normal outside local development.
    let _ = dotenvy::dotenv();
    wallets_observability::init();

    let config = Config::from_env().context("invalid configuration")?;
    tracing::info!(
        store = ?config.store,
        tracker = ?config.tracker,
        grace_period = ?config.grace_period,
        "starting wallets service"
    );

    let metrics = Arc::new(Metrics::new().context("registering metrics")?);
    let services = build_services(&config, metrics).await?;
    let app = build_app(services);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    serve_with_grace(listener, app, config.grace_period, shutdown_signal()).await?;
    tracing::info!("shutdown complete");
    Ok(())
}
