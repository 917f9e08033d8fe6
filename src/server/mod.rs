//! Geos server implementation
//!
//! Receives log datagrams over UDP, routes them through the packet router and
//! fans them out to WebSocket viewers.

pub mod config;
mod ingest;
mod receiver;
mod router;
pub mod transport;
pub mod udp;
pub mod websocket;

pub use config::{parse_bind_addr, GeosServerConfig, IngestConfig, RouterConfig};
pub use ingest::run_ingest;
pub use receiver::{ChannelReceiver, Delivery, Receiver};
pub use router::{Router, RouterStats, StatsSnapshot, Sweeper};
pub use transport::GeosServer;
pub use udp::UdpListener;
pub use websocket::{create_router, run_websocket_server, WsState};
