//! Resilience tests for Geos
//!
//! These verify behavior under failure conditions like:
//! - Viewers disappearing mid-stream
//! - A viewer that never reads
//! - Rapid connect/disconnect cycles
//! - Garbage interleaved with valid packets

use geos::server::{run_ingest, ChannelReceiver, Delivery, Receiver, Router, RouterConfig};
use geos::Packet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Receiver whose liveness is controlled by the test
struct Flaky {
    accepted: AtomicUsize,
    alive: AtomicBool,
}

impl Flaky {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            accepted: AtomicUsize::new(0),
            alive: AtomicBool::new(true),
        })
    }
}

impl Receiver for Flaky {
    fn accept(&self, _packet: &Arc<Packet>) -> Delivery {
        self.accepted.fetch_add(1, Ordering::SeqCst);
        Delivery::Accepted
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

/// Test that the router keeps serving when half the viewers vanish
#[tokio::test]
async fn test_viewers_disappearing_mid_stream() {
    let router = Router::default();

    let receivers: Vec<_> = (0..100)
        .map(|_| {
            let (viewer, rx) = ChannelReceiver::channel(10);
            router.register(viewer);
            rx
        })
        .collect();

    // Drop half the queues to simulate disconnects
    let receivers: Vec<_> = receivers.into_iter().take(50).collect();

    for i in 0..100 {
        router
            .submit(format!(r#"{{"seq":{}}}"#, i).as_bytes())
            .unwrap();
    }

    // Dead viewers stay registered until a sweep; delivery to them just fails
    assert_eq!(router.receiver_count(), 100);
    assert_eq!(router.sweep(), 50);

    for mut rx in receivers {
        let mut count = 0;
        while rx.try_recv().is_ok() {
            count += 1;
        }
        // Buffer size is 10
        assert_eq!(count, 10, "Expected a full buffer, got {}", count);
    }
}

/// A viewer that never reads must not hold up anyone else
#[tokio::test]
async fn test_stalled_viewer_does_not_block_others() {
    let router = Arc::new(Router::default());

    let (stalled, _stalled_rx) = ChannelReceiver::channel(1);
    router.register(stalled.clone());

    let (healthy, mut healthy_rx) = ChannelReceiver::channel(1000);
    router.register(healthy);

    let start = Instant::now();
    for i in 0..500 {
        router
            .submit(format!(r#"{{"seq":{}}}"#, i).as_bytes())
            .unwrap();
    }
    assert!(start.elapsed() < Duration::from_secs(5));

    let mut count = 0;
    while healthy_rx.try_recv().is_ok() {
        count += 1;
    }
    assert_eq!(count, 500);
    assert_eq!(stalled.dropped(), 499);
    assert_eq!(router.stats().dropped, 499);

    // Slow is not dead
    assert_eq!(router.sweep(), 0);
}

/// Test rapid connect/disconnect cycles don't cause issues
#[tokio::test]
async fn test_rapid_connect_disconnect_cycles() {
    let router = Arc::new(Router::new(
        RouterConfig::new().sweep_interval(Duration::from_millis(5)),
    ));
    let sweeper = router.spawn_sweeper(CancellationToken::new());

    let mut handles = vec![];
    for _ in 0..20 {
        let router = router.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..50 {
                let viewer = Flaky::new();
                let id = router.register(viewer.clone());
                router.deliver(Packet::default());
                viewer.alive.store(false, Ordering::SeqCst);
                if id.as_u128() % 2 == 0 {
                    router.deregister(id);
                }
                tokio::task::yield_now().await;
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(router.receiver_count(), 0);
    assert_eq!(router.stats().registered, 1000);

    sweeper.stop().await;
}

/// Viewers pruned by the sweep get nothing afterwards
#[tokio::test]
async fn test_pruned_viewer_receives_nothing_more() {
    let router = Arc::new(Router::new(
        RouterConfig::new().sweep_interval(Duration::from_millis(20)),
    ));
    let sweeper = router.spawn_sweeper(CancellationToken::new());

    let viewer = Flaky::new();
    router.register(viewer.clone());

    router.deliver(Packet::default());
    assert_eq!(viewer.accepted.load(Ordering::SeqCst), 1);

    viewer.alive.store(false, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(120)).await;

    for _ in 0..10 {
        router.deliver(Packet::default());
    }
    assert_eq!(viewer.accepted.load(Ordering::SeqCst), 1);

    sweeper.stop().await;
}

/// Garbage between valid datagrams is skipped without stopping ingestion
#[tokio::test]
async fn test_ingest_survives_garbage() {
    let router = Arc::new(Router::default());
    let (viewer, mut rx) = ChannelReceiver::channel(100);
    router.register(viewer);

    let (tx, ingest_rx) = mpsc::channel(100);
    let ingest = tokio::spawn(run_ingest(router.clone(), ingest_rx));

    let inputs: Vec<Vec<u8>> = vec![
        br#"{"ok":1}"#.to_vec(),
        b"\x1f\x8b\x08 corrupt gzip".to_vec(),
        b"[]".to_vec(),
        Vec::new(),
        b"\"string\"".to_vec(),
        br#"{"ok":2}"#.to_vec(),
        b"{broken".to_vec(),
        br#"{"ok":3}"#.to_vec(),
    ];
    for input in inputs {
        tx.send(input).await.unwrap();
    }
    drop(tx);

    assert_eq!(ingest.await.unwrap(), 8);

    for expected in 1..=3 {
        let packet = rx.recv().await.unwrap();
        assert_eq!(packet.get("ok"), Some(&serde_json::json!(expected)));
    }
    assert!(rx.try_recv().is_err());
    assert_eq!(router.stats().parse_errors, 4);
}

/// Stopping a sweeper twice over (explicit stop after cancel) is fine
#[tokio::test]
async fn test_sweeper_stop_after_cancel() {
    let router = Arc::new(Router::default());
    let cancel = CancellationToken::new();
    let sweeper = router.spawn_sweeper(cancel.clone());

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), sweeper.stop())
        .await
        .expect("sweeper should stop promptly");
}
