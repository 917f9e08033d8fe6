//! Datagram ingestion loop

use crate::server::router::Router;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Feed every queued datagram through the router.
///
/// Runs until all senders are gone and the queue is drained. Empty and bad
/// datagrams are skipped, bad ones logged. Returns the number of datagrams
/// consumed.
pub async fn run_ingest(router: Arc<Router>, mut rx: mpsc::Receiver<Vec<u8>>) -> u64 {
    let mut consumed = 0u64;

    while let Some(datagram) = rx.recv().await {
        consumed += 1;

        match router.submit(&datagram) {
            Ok(count) => {
                debug!(bytes = datagram.len(), receivers = count, "Packet routed");
            }
            Err(e) => {
                warn!(error = %e, bytes = datagram.len(), "Invalid packet received");
            }
        }
    }

    info!(consumed, "Ingestion loop finished");
    consumed
}
