//! Full-pipeline tests: ring, consumer thread, WAL, and publisher together.

use matchcore_rs::prelude::*;
use matchcore_rs::publish::Topic;
use matchcore_rs::shard::{ShardConfig, start_shard};
use matchcore_rs::wal::DomainEvent;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn test_config(dir: &tempfile::TempDir, ring_size: usize) -> ShardConfig {
    ShardConfig {
        shard_id: "shard-test".into(),
        shard_symbols: vec!["A".into()],
        http_port: 0,
        metrics_port: 0,
        broker_bootstrap: None,
        wal_path: dir.path().join("shard.wal"),
        wal_size_bytes: 1 << 20,
        ring_buffer_size: ring_size,
    }
}

fn submit(handle: &matchcore_rs::shard::ShardHandle, id: &str, side: Side, price: i64, qty: u64) {
    let result = handle
        .ingress
        .submit(id, "A", side, OrderKind::Limit, price, qty, 0);
    assert!(result.is_ok(), "submit {id} failed: ring full");
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn pipeline_matches_rest_and_record() {
    let dir = tempfile::tempdir().unwrap_or_else(|_| panic!("tempdir"));
    let config = test_config(&dir, 64);
    let publisher = Arc::new(BufferPublisher::new());
    let handle =
        start_shard(&config, Arc::clone(&publisher) as Arc<dyn EventPublisher>).unwrap_or_else(|e| panic!("{e}"));

    submit(&handle, "S1", Side::Sell, 15000, 100);
    submit(&handle, "S2", Side::Sell, 15100, 100);
    submit(&handle, "B2", Side::Buy, 15100, 150);

    let metrics = Arc::clone(&handle.metrics);
    wait_until(|| metrics.end_to_end.count() == 3);

    let processor = handle.shutdown().unwrap_or_else(|| panic!("consumer lost"));
    let book = processor.book("A").unwrap_or_else(|| panic!("book missing"));

    // S1 fully drained, S2 half consumed, B2 fully consumed.
    assert!(book.get_order("S1").is_none());
    assert_eq!(book.get_order("S2").map(|o| o.remaining), Some(50));
    assert!(book.get_order("B2").is_none());
    assert_eq!(book.best_ask(), Some(15100));
    assert!(book.check_consistency());

    // Counters reflect the traffic.
    assert_eq!(
        metrics
            .matches_emitted
            .load(std::sync::atomic::Ordering::Relaxed),
        2
    );
    assert_eq!(
        metrics
            .orders_received_sell
            .load(std::sync::atomic::Ordering::Relaxed),
        2
    );
    assert_eq!(
        metrics
            .orders_received_buy
            .load(std::sync::atomic::Ordering::Relaxed),
        1
    );

    // WAL records in consumption order: two placements, then two fills.
    let entries: Vec<_> = processor
        .wal()
        .read_from(0)
        .unwrap_or_else(|_| panic!("read_from"))
        .map(|e| e.unwrap_or_else(|err| panic!("{err}")))
        .collect();
    assert_eq!(entries.len(), 4);
    assert!(matches!(
        entries[0].record.event,
        DomainEvent::OrderPlaced { ref order_id, .. } if order_id == "S1"
    ));
    assert!(matches!(
        entries[1].record.event,
        DomainEvent::OrderPlaced { ref order_id, .. } if order_id == "S2"
    ));
    assert!(matches!(
        entries[2].record.event,
        DomainEvent::MatchExecuted { match_id: 0, execution_price: 15000, execution_quantity: 100, .. }
    ));
    assert!(matches!(
        entries[3].record.event,
        DomainEvent::MatchExecuted { match_id: 1, execution_price: 15100, execution_quantity: 50, .. }
    ));
    assert!(processor.wal().verify_integrity().is_ok());

    // Outbound stream carries the same four events on their topics.
    let published = publisher.events();
    assert_eq!(published.len(), 4);
    assert_eq!(published[0].topic, Topic::Orders);
    assert_eq!(published[1].topic, Topic::Orders);
    assert_eq!(published[2].topic, Topic::Matches);
    assert_eq!(published[3].topic, Topic::Matches);
    assert!(published.iter().all(|e| e.key == "A"));
}

#[test]
fn pipeline_rejects_unknown_symbol_past_ingress() {
    let dir = tempfile::tempdir().unwrap_or_else(|_| panic!("tempdir"));
    let config = test_config(&dir, 64);
    let publisher = Arc::new(BufferPublisher::new());
    let handle =
        start_shard(&config, Arc::clone(&publisher) as Arc<dyn EventPublisher>).unwrap_or_else(|e| panic!("{e}"));

    // The ingress handle performs no validation; the consumer must emit a
    // synthetic rejection and never touch a book.
    let result = handle
        .ingress
        .submit("Z1", "Z", Side::Buy, OrderKind::Limit, 15000, 10, 0);
    assert!(result.is_ok());

    let metrics = Arc::clone(&handle.metrics);
    wait_until(|| {
        metrics
            .orders_rejected
            .load(std::sync::atomic::Ordering::Relaxed)
            == 1
    });

    let processor = handle.shutdown().unwrap_or_else(|| panic!("consumer lost"));
    assert!(processor.book("Z").is_none());

    let entries: Vec<_> = processor
        .wal()
        .read_from(0)
        .unwrap_or_else(|_| panic!("read_from"))
        .map(|e| e.unwrap_or_else(|err| panic!("{err}")))
        .collect();
    assert_eq!(entries.len(), 1);
    assert!(matches!(
        entries[0].record.event,
        DomainEvent::OrderRejected { ref order_id, ref symbol, .. }
            if order_id == "Z1" && symbol == "Z"
    ));

    let published = publisher.events();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].topic, Topic::Orders);
    assert_eq!(published[0].key, "Z");
}

#[test]
fn pipeline_seeds_bypass_events_then_match() {
    let dir = tempfile::tempdir().unwrap_or_else(|_| panic!("tempdir"));
    let config = test_config(&dir, 64);
    let publisher = Arc::new(BufferPublisher::new());
    let handle =
        start_shard(&config, Arc::clone(&publisher) as Arc<dyn EventPublisher>).unwrap_or_else(|e| panic!("{e}"));

    for (id, price) in [("S1", 15000), ("S2", 15100)] {
        let seed = SeedOrder {
            order_id: id.into(),
            symbol: "A".into(),
            side: Side::Sell,
            price,
            quantity: 100,
        };
        assert!(handle.seed_tx.send(seed).is_ok());
    }

    // Seeds drain between batches; the depth gauge confirms arrival.
    let metrics = Arc::clone(&handle.metrics);
    wait_until(|| metrics.ask_depth.load(std::sync::atomic::Ordering::Relaxed) == 200);

    submit(&handle, "B1", Side::Buy, 15050, 50);
    wait_until(|| metrics.end_to_end.count() == 1);

    let processor = handle.shutdown().unwrap_or_else(|| panic!("consumer lost"));
    let book = processor.book("A").unwrap_or_else(|| panic!("book missing"));
    assert_eq!(book.get_order("S1").map(|o| o.remaining), Some(50));
    assert_eq!(book.get_order("S2").map(|o| o.remaining), Some(100));

    // Seeds produced no records; only the aggressive order's fill did.
    let entries: Vec<_> = processor
        .wal()
        .read_from(0)
        .unwrap_or_else(|_| panic!("read_from"))
        .map(|e| e.unwrap_or_else(|err| panic!("{err}")))
        .collect();
    assert_eq!(entries.len(), 1);
    assert!(matches!(
        entries[0].record.event,
        DomainEvent::MatchExecuted { execution_price: 15000, execution_quantity: 50, .. }
    ));

    let published = publisher.events();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].topic, Topic::Matches);
}

#[test]
fn pipeline_shutdown_drains_outstanding_events() {
    let dir = tempfile::tempdir().unwrap_or_else(|_| panic!("tempdir"));
    let config = test_config(&dir, 256);
    let publisher = Arc::new(BufferPublisher::new());
    let handle =
        start_shard(&config, Arc::clone(&publisher) as Arc<dyn EventPublisher>).unwrap_or_else(|e| panic!("{e}"));

    for i in 0..100 {
        submit(&handle, &format!("o{i}"), Side::Sell, 15000 + i, 10);
    }

    // Shut down immediately: the consumer must drain to the cursor first.
    let processor = handle.shutdown().unwrap_or_else(|| panic!("consumer lost"));
    let book = processor.book("A").unwrap_or_else(|| panic!("book missing"));
    assert_eq!(book.order_count(), 100);
    assert_eq!(book.ask_depth(), 1000);

    let entries = processor
        .wal()
        .read_from(0)
        .unwrap_or_else(|_| panic!("read_from"))
        .count();
    assert_eq!(entries, 100);
}
