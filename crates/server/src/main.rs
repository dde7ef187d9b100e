mod api;
mod bootstrap;
mod health;

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use voyage_core::config::{AppConfig, LoadOptions};
use voyage_workflow::SweepScheduler;

fn init_logging(config: &AppConfig) {
    use voyage_core::config::LogFormat::*;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt().with_target(false).with_env_filter(filter);

    match config.logging.format {
        Compact => builder.compact().init(),
        Pretty => builder.pretty().init(),
        Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = SweepScheduler::new(
        app.service.clone(),
        Duration::from_secs(app.config.workflow.sweep_interval_secs),
    );
    let sweep_period = sweeper.period();
    let sweeper_task = sweeper.spawn(shutdown_rx.clone());

    if app.config.server.system_token.is_none() {
        tracing::warn!(
            event_name = "system.server.system_routes_closed",
            correlation_id = "bootstrap",
            "server.system_token is unset; payment, completion and sweep routes will refuse callers"
        );
    }
    let router = api::router(app.service.clone(), app.config.server.system_token.clone())
        .merge(health::router(app.db_pool.clone()));

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        sweep_interval_secs = sweep_period.as_secs(),
        "voyage-server started"
    );

    let mut server_shutdown = shutdown_rx;
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        let _ = server_shutdown.wait_for(|stopping| *stopping).await;
    });
    let server_task = tokio::spawn(async move { server.await });

    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "voyage-server stopping"
    );
    let _ = shutdown_tx.send(true);

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    match tokio::time::timeout(grace, server_task).await {
        Ok(joined) => joined.context("server task panicked")??,
        Err(_) => tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            grace_secs = grace.as_secs(),
            "in-flight requests did not drain before the grace period ended"
        ),
    }
    if let Err(error) = sweeper_task.await {
        tracing::warn!(
            event_name = "system.sweeper.join_failed",
            correlation_id = "shutdown",
            error = %error,
            "sweep scheduler did not stop cleanly"
        );
    }

    app.db_pool.close().await;
    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
