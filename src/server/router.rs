//! Packet routing and fan-out
//!
//! One lock guards both the receiver list and the broadcast, so every
//! receiver observes packets in the same order and membership never changes
//! mid-broadcast.

use crate::packet::{Packet, PacketError};
use crate::server::config::{RouterConfig, MIN_SWEEP_INTERVAL};
use crate::server::receiver::{Delivery, Receiver};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

struct Registered {
    id: Uuid,
    receiver: Arc<dyn Receiver>,
}

/// Router counters
#[derive(Debug, Default)]
pub struct RouterStats {
    datagrams: AtomicU64,
    empty: AtomicU64,
    parse_errors: AtomicU64,
    overflowed: AtomicU64,
    broadcasts: AtomicU64,
    accepted: AtomicU64,
    dropped: AtomicU64,
    closed: AtomicU64,
    registered: AtomicU64,
    pruned: AtomicU64,
}

impl RouterStats {
    /// Count a datagram discarded before reaching the router
    pub fn record_overflow(&self) {
        self.overflowed.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self, receivers: usize) -> StatsSnapshot {
        StatsSnapshot {
            receivers,
            datagrams: self.datagrams.load(Ordering::Relaxed),
            empty: self.empty.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            overflowed: self.overflowed.load(Ordering::Relaxed),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            closed: self.closed.load(Ordering::Relaxed),
            registered: self.registered.load(Ordering::Relaxed),
            pruned: self.pruned.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of [`RouterStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub receivers: usize,
    pub datagrams: u64,
    pub empty: u64,
    pub parse_errors: u64,
    pub overflowed: u64,
    pub broadcasts: u64,
    pub accepted: u64,
    pub dropped: u64,
    pub closed: u64,
    pub registered: u64,
    pub pruned: u64,
}

/// Routes decoded packets to every registered receiver
pub struct Router {
    receivers: Mutex<Vec<Registered>>,
    stats: Arc<RouterStats>,
    config: RouterConfig,
}

impl Router {
    pub fn new(config: RouterConfig) -> Self {
        Self {
            receivers: Mutex::new(Vec::new()),
            stats: Arc::new(RouterStats::default()),
            config,
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Attach a receiver. The same receiver may be registered more than once
    /// and then gets every packet once per registration.
    pub fn register(&self, receiver: Arc<dyn Receiver>) -> Uuid {
        let id = Uuid::new_v4();
        let count = {
            let mut receivers = self.receivers.lock();
            receivers.push(Registered { id, receiver });
            receivers.len()
        };

        self.stats.registered.fetch_add(1, Ordering::Relaxed);
        info!(receiver_id = %id, receivers = count, "New receiver attached");
        id
    }

    /// Detach a receiver before the sweep would
    pub fn deregister(&self, id: Uuid) -> bool {
        let mut receivers = self.receivers.lock();
        let before = receivers.len();
        receivers.retain(|r| r.id != id);
        let removed = receivers.len() != before;
        drop(receivers);

        if removed {
            debug!(receiver_id = %id, "Receiver detached");
        }
        removed
    }

    /// Decode, parse and broadcast one raw datagram.
    ///
    /// Returns the number of receivers the packet was offered to. Empty
    /// datagrams are skipped and count as zero.
    pub fn submit(&self, bytes: &[u8]) -> Result<usize, PacketError> {
        self.stats.datagrams.fetch_add(1, Ordering::Relaxed);

        if bytes.is_empty() {
            self.stats.empty.fetch_add(1, Ordering::Relaxed);
            return Ok(0);
        }

        match Packet::from_datagram(bytes) {
            Ok(packet) => Ok(self.deliver(packet)),
            Err(e) => {
                self.stats.parse_errors.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Offer a packet to every receiver, in registration order.
    ///
    /// The lock is held for the whole broadcast. Receivers must not block in
    /// `accept`; a full receiver drops the packet instead.
    pub fn deliver(&self, packet: impl Into<Arc<Packet>>) -> usize {
        let packet = packet.into();
        let receivers = self.receivers.lock();

        for registered in receivers.iter() {
            match registered.receiver.accept(&packet) {
                Delivery::Accepted => {
                    self.stats.accepted.fetch_add(1, Ordering::Relaxed);
                }
                Delivery::Dropped => {
                    self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                    debug!(receiver_id = %registered.id, "Receiver buffer full, packet dropped");
                }
                Delivery::Closed => {
                    self.stats.closed.fetch_add(1, Ordering::Relaxed);
                    debug!(receiver_id = %registered.id, "Receiver closed, awaiting sweep");
                }
            }
        }

        self.stats.broadcasts.fetch_add(1, Ordering::Relaxed);
        receivers.len()
    }

    /// Drop every receiver that no longer reports alive. Returns how many
    /// were removed.
    pub fn sweep(&self) -> usize {
        let mut receivers = self.receivers.lock();
        let before = receivers.len();
        receivers.retain(|r| {
            let alive = r.receiver.is_alive();
            if !alive {
                debug!(receiver_id = %r.id, "Pruning dead receiver");
            }
            alive
        });
        let disconnected = before - receivers.len();
        drop(receivers);

        if disconnected > 0 {
            self.stats
                .pruned
                .fetch_add(disconnected as u64, Ordering::Relaxed);
            info!(count = disconnected, "Disconnected receivers");
        }

        disconnected
    }

    /// Number of registered receivers
    pub fn receiver_count(&self) -> usize {
        self.receivers.lock().len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(self.receiver_count())
    }

    /// Shared counters, for transports that drop data before the router sees it
    pub fn stats_handle(&self) -> Arc<RouterStats> {
        self.stats.clone()
    }

    /// Run [`Router::sweep`] every `sweep_interval` until `cancel` fires
    pub fn spawn_sweeper(self: &Arc<Self>, cancel: CancellationToken) -> Sweeper {
        let router = Arc::clone(self);
        // The field is public, so a zero period can bypass the builder
        let period = self.config.sweep_interval.max(MIN_SWEEP_INTERVAL);
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        router.sweep();
                    }
                }
            }

            debug!("Liveness sweeper stopped");
        });

        Sweeper {
            cancel,
            handle: Some(handle),
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(RouterConfig::default())
    }
}

/// Handle to a running liveness sweeper. Dropping it cancels the task.
pub struct Sweeper {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    /// Cancel the sweeper and wait for it to exit
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
