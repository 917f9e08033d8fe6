//! CLI command definitions

use clap::Parser;

#[derive(Parser)]
#[command(name = "geos")]
#[command(about = "Starts a UDP listener that forwards log packets to WebSocket viewers")]
#[command(version)]
#[command(after_help = "Example: geos :5001 :8085")]
pub struct Cli {
    /// UDP address to receive log packets on, e.g. :5001
    #[arg(env = "GEOS_UDP_BIND")]
    pub udp: String,

    /// HTTP address for the viewer WebSocket, e.g. :8085
    #[arg(env = "GEOS_HTTP_BIND")]
    pub http: String,

    /// Interval between dead-viewer sweeps, in milliseconds
    #[arg(long, env = "GEOS_SWEEP_INTERVAL_MS", default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    pub sweep_interval_ms: u64,

    /// UDP receive buffer; longer datagrams are truncated
    #[arg(long, env = "GEOS_BUFFER_SIZE", default_value_t = 8192)]
    pub buffer_size: usize,

    /// Datagrams queued ahead of the router before new ones are dropped
    #[arg(long, env = "GEOS_INGEST_CAPACITY", default_value_t = 4096)]
    pub ingest_capacity: usize,

    /// Packets queued per viewer before that viewer starts missing some
    #[arg(long, env = "GEOS_DELIVERY_BUFFER", default_value_t = 256)]
    pub delivery_buffer: usize,

    /// Log level, used when RUST_LOG is unset
    #[arg(long, env = "GEOS_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}
