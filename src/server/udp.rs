//! UDP datagram source

use crate::server::router::RouterStats;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Receives log datagrams and hands them to the ingestion queue
pub struct UdpListener {
    socket: UdpSocket,
    buffer_size: usize,
}

impl UdpListener {
    pub async fn bind(addr: SocketAddr, buffer_size: usize) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .with_context(|| format!("Failed to bind UDP socket: {}", addr))?;

        Ok(Self::from_socket(socket, buffer_size))
    }

    pub fn from_socket(socket: UdpSocket, buffer_size: usize) -> Self {
        Self {
            socket,
            buffer_size: buffer_size.max(1),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().context("UDP socket has no local address")
    }

    /// Read datagrams until cancelled or the queue closes.
    ///
    /// A full queue drops the datagram rather than blocking the socket.
    pub async fn run(
        self,
        tx: mpsc::Sender<Vec<u8>>,
        stats: Arc<RouterStats>,
        cancel: CancellationToken,
    ) {
        let mut buf = vec![0u8; self.buffer_size];
        if let Ok(addr) = self.socket.local_addr() {
            info!(addr = %addr, buffer_size = self.buffer_size, "UDP listener started");
        }

        loop {
            let (len, peer) = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.socket.recv_from(&mut buf) => match result {
                    Ok(received) => received,
                    Err(e) => {
                        error!(error = %e, "UDP receive error");
                        continue;
                    }
                },
            };

            match tx.try_send(buf[..len].to_vec()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    stats.record_overflow();
                    debug!(peer = %peer, bytes = len, "Ingestion queue full, datagram dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    warn!("Ingestion queue closed");
                    break;
                }
            }
        }

        info!("UDP listener done");
    }
}
