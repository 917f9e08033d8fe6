//! Geos server: wires UDP ingestion, the router and the viewer endpoint

use crate::server::config::GeosServerConfig;
use crate::server::ingest::run_ingest;
use crate::server::router::Router;
use crate::server::udp::UdpListener;
use crate::server::websocket::{run_websocket_server, WsState};

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// The main Geos server
pub struct GeosServer {
    config: GeosServerConfig,
    router: Arc<Router>,
}

impl GeosServer {
    pub fn new(config: GeosServerConfig) -> Self {
        let router = Arc::new(Router::new(config.router.clone()));
        Self { config, router }
    }

    /// Get a reference to the packet router (for submitting from outside)
    pub fn router(&self) -> Arc<Router> {
        self.router.clone()
    }

    /// Run the server until `cancel` fires.
    ///
    /// On shutdown the UDP listener stops first, then queued datagrams are
    /// drained through the router before the sweeper is stopped.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let udp = UdpListener::bind(self.config.udp_addr, self.config.ingest.buffer_size).await?;
        let http = TcpListener::bind(self.config.http_addr)
            .await
            .with_context(|| format!("Failed to bind HTTP listener: {}", self.config.http_addr))?;

        info!(
            udp = %self.config.udp_addr,
            http = %self.config.http_addr,
            "Geos server started"
        );

        let sweeper = self.router.spawn_sweeper(cancel.child_token());

        let (tx, rx) = mpsc::channel(self.config.ingest.capacity);
        let ingest = tokio::spawn(run_ingest(self.router.clone(), rx));
        let listener = tokio::spawn(udp.run(tx, self.router.stats_handle(), cancel.clone()));

        let state = WsState {
            router: self.router.clone(),
            delivery_buffer: self.router.config().delivery_buffer,
            shutdown: cancel.clone(),
        };
        let served = run_websocket_server(http, state).await;

        // HTTP may have failed on its own; bring everything else down too
        cancel.cancel();

        if let Err(e) = listener.await {
            warn!(error = %e, "UDP listener task failed");
        }
        match ingest.await {
            Ok(consumed) => info!(consumed, "Ingestion drained"),
            Err(e) => warn!(error = %e, "Ingestion task failed"),
        }
        sweeper.stop().await;

        served.context("HTTP server error")
    }
}
