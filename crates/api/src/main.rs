use anyhow::Context;

use tenure_api::app;
use tenure_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tenure_observability::init();

    let config = ApiConfig::from_env()?;
    tracing::info!(addr = %config.bind_addr(), backend = ?config.backend, "configuration loaded");

    let services = app::build_services(&config)
        .await
        .context("failed to initialise storage")?;
    let router = app::build_app(services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr()))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
