//! Receivers: the subscriber side of the router

use crate::packet::Packet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Result of offering a packet to a receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Packet queued for the subscriber
    Accepted,
    /// Subscriber is behind; this packet was skipped for it
    Dropped,
    /// Subscriber is gone; the next sweep removes it
    Closed,
}

/// Anything that can take packets from the router.
///
/// `accept` is called while the router holds its lock, so it must not block.
/// `is_alive` is polled by the liveness sweep and must be cheap.
pub trait Receiver: Send + Sync {
    fn accept(&self, packet: &Arc<Packet>) -> Delivery;

    fn is_alive(&self) -> bool;
}

/// Receiver backed by a bounded channel, drained by a transport task
pub struct ChannelReceiver {
    tx: mpsc::Sender<Arc<Packet>>,
    closed: AtomicBool,
    dropped: AtomicU64,
}

impl ChannelReceiver {
    pub fn new(tx: mpsc::Sender<Arc<Packet>>) -> Self {
        Self {
            tx,
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    /// Create a receiver together with the queue its transport reads from
    pub fn channel(capacity: usize) -> (Arc<Self>, mpsc::Receiver<Arc<Packet>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Arc::new(Self::new(tx)), rx)
    }

    /// Mark the receiver dead without waiting for its queue to be dropped
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Packets skipped because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Receiver for ChannelReceiver {
    fn accept(&self, packet: &Arc<Packet>) -> Delivery {
        if self.closed.load(Ordering::Acquire) {
            return Delivery::Closed;
        }

        match self.tx.try_send(packet.clone()) {
            Ok(()) => Delivery::Accepted,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Delivery::Dropped
            }
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    fn is_alive(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && !self.tx.is_closed()
    }
}
