//! Geos CLI entry point

mod cli;

use crate::cli::Cli;
use anyhow::{Context, Result};
use clap::Parser;
use geos::server::{parse_bind_addr, GeosServer, GeosServerConfig, IngestConfig, RouterConfig};
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let udp_addr = parse_bind_addr(&cli.udp).context("Invalid UDP bind")?;
    let http_addr = parse_bind_addr(&cli.http).context("Invalid HTTP bind")?;

    info!(port = %udp_addr, "Incoming log UDP listening port");
    info!(port = %http_addr, "HTTP websocket server listening port");

    let config = GeosServerConfig {
        udp_addr,
        http_addr,
        router: RouterConfig::new()
            .sweep_interval(Duration::from_millis(cli.sweep_interval_ms))
            .delivery_buffer(cli.delivery_buffer),
        ingest: IngestConfig::new()
            .buffer_size(cli.buffer_size)
            .capacity(cli.ingest_capacity),
    };

    let server = GeosServer::new(config);
    let cancel = CancellationToken::new();

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, stopping server");
        signal_cancel.cancel();
    });

    server.run(cancel).await?;

    info!("Geos stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
