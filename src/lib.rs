//! Geos - live log fan-out
//!
//! Accepts JSON log records over UDP (optionally gzip-compressed) and
//! broadcasts each one, as it arrives, to every connected WebSocket viewer.
//! Nothing is stored: viewers only see what arrives while they are connected.

pub mod packet;
pub mod server;

pub use packet::{Packet, PacketError};
pub use server::{ChannelReceiver, Delivery, GeosServer, GeosServerConfig, Receiver, Router};
