//! Router, ingestion and server configuration

use anyhow::{Context, Result};
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

/// Shortest allowed gap between liveness sweeps
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Configuration for the packet router
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// How often dead receivers are pruned
    pub sweep_interval: Duration,

    /// Per-receiver queue depth before packets are dropped for that receiver
    pub delivery_buffer: usize,
}

impl RouterConfig {
    pub fn new() -> Self {
        Self {
            sweep_interval: Duration::from_secs(1),
            delivery_buffer: 256,
        }
    }

    /// Set the liveness sweep interval
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval.max(MIN_SWEEP_INTERVAL);
        self
    }

    /// Set the per-receiver delivery buffer
    pub fn delivery_buffer(mut self, capacity: usize) -> Self {
        self.delivery_buffer = capacity.max(1);
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the datagram ingestion path
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// UDP receive buffer; longer datagrams are truncated by the socket
    pub buffer_size: usize,

    /// Datagrams queued between the socket and the router. When full, new
    /// datagrams are dropped.
    pub capacity: usize,
}

impl IngestConfig {
    pub fn new() -> Self {
        Self {
            buffer_size: 8 * 1024,
            capacity: 4096,
        }
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Geos server configuration
#[derive(Debug, Clone)]
pub struct GeosServerConfig {
    /// UDP address log shippers send to
    pub udp_addr: SocketAddr,
    /// HTTP address viewers connect to
    pub http_addr: SocketAddr,
    pub router: RouterConfig,
    pub ingest: IngestConfig,
}

impl GeosServerConfig {
    pub fn new(udp_addr: SocketAddr, http_addr: SocketAddr) -> Self {
        Self {
            udp_addr,
            http_addr,
            router: RouterConfig::default(),
            ingest: IngestConfig::default(),
        }
    }
}

/// Parse a bind address. A bare `:port` binds all interfaces, and host names
/// are resolved.
pub fn parse_bind_addr(bind: &str) -> Result<SocketAddr> {
    let bind = bind.trim();
    let full = if bind.starts_with(':') {
        format!("0.0.0.0{}", bind)
    } else {
        bind.to_string()
    };

    if let Ok(addr) = full.parse::<SocketAddr>() {
        return Ok(addr);
    }

    full.to_socket_addrs()
        .with_context(|| format!("Invalid bind address: {}", bind))?
        .next()
        .with_context(|| format!("Bind address resolved to nothing: {}", bind))
}
