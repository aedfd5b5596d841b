//! The single consumer thread: the per-shard event-processor pipeline.
//!
//! Exactly one [`EventProcessor`] exists per shard. It is the sole writer of
//! the order books, the WAL, the publisher's enqueue path, and the match-id
//! sequence. For every event drained from the ring it runs
//! validate → book lookup → construct → match → rest → WAL append →
//! publish → metrics, and amortizes the WAL force and publisher flush to
//! batch boundaries.
//!
//! Recoverable conditions (validation rejections, publisher saturation, WAL
//! saturation) are counted and logged; the loop continues. Invariant
//! violations panic — the shard must not continue under corrupted state, and
//! the hosting thread escalates the panic to a process abort.

use crate::engine::{
    MatchSequence, MatchingPool, Order, OrderBook, RejectReason, Side,
};
use crate::ingress::{OrderEvent, RingBuffer, YieldingWait};
use crate::metrics::ShardMetrics;
use crate::publish::{EventPublisher, OutboundEvent, Topic};
use crate::utils::{current_time_millis, current_time_nanos};
use crate::wal::{DomainEvent, WalRecord, WriteAheadLog};
use crossbeam::channel::Receiver;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{error, info, warn};

/// Upper bound on events drained per batch.
const MAX_BATCH: usize = 1024;

/// A seed order delivered over the test-only side channel.
///
/// Seeds bypass the ring buffer and produce no WAL or outbound events; the
/// consumer places them directly into the books between batches, preserving
/// the books' thread affinity.
#[derive(Debug, Clone)]
pub struct SeedOrder {
    /// Caller-assigned order id.
    pub order_id: String,
    /// The trading symbol.
    pub symbol: String,
    /// Buy or Sell.
    pub side: Side,
    /// Limit price in integer cents.
    pub price: i64,
    /// Order quantity.
    pub quantity: u64,
}

/// The per-shard consumer. Owns every piece of single-writer state.
pub struct EventProcessor {
    shard_id: String,
    symbols: HashSet<String>,
    books: HashMap<String, OrderBook>,
    ring: Arc<RingBuffer>,
    wal: WriteAheadLog,
    publisher: Arc<dyn EventPublisher>,
    metrics: Arc<ShardMetrics>,
    match_seq: MatchSequence,
    pool: MatchingPool,
    seed_rx: Receiver<SeedOrder>,
    shutdown: Arc<AtomicBool>,
    /// Scratch for the events of the order currently in the pipeline.
    scratch_events: Vec<DomainEvent>,
}

impl EventProcessor {
    /// Assemble a processor. Books are created lazily per symbol as traffic
    /// arrives.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        shard_id: impl Into<String>,
        symbols: impl IntoIterator<Item = String>,
        ring: Arc<RingBuffer>,
        wal: WriteAheadLog,
        publisher: Arc<dyn EventPublisher>,
        metrics: Arc<ShardMetrics>,
        seed_rx: Receiver<SeedOrder>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            shard_id: shard_id.into(),
            symbols: symbols.into_iter().collect(),
            books: HashMap::new(),
            ring,
            wal,
            publisher,
            metrics,
            match_seq: MatchSequence::new(),
            pool: MatchingPool::new(),
            seed_rx,
            shutdown,
            scratch_events: Vec::with_capacity(16),
        }
    }

    /// The book for `symbol`, if it has received traffic.
    #[must_use]
    pub fn book(&self, symbol: &str) -> Option<&OrderBook> {
        self.books.get(symbol)
    }

    /// The write-ahead log owned by this processor.
    #[must_use]
    pub fn wal(&self) -> &WriteAheadLog {
        &self.wal
    }

    /// The batch loop. Returns only after the shutdown flag is observed
    /// between batches and the ring has drained to the current cursor; the
    /// WAL is then forced and the publisher closed.
    pub fn run(&mut self) {
        info!(shard = %self.shard_id, "event processor started");
        let ring = Arc::clone(&self.ring);
        let mut wait = YieldingWait::new();

        loop {
            self.drain_seeds();

            let consumed =
                ring.try_consume_batch(MAX_BATCH, |slot, seq, eob| self.process_event(slot, seq, eob));

            if consumed == 0 {
                // The shutdown flag is honored only between batches, after
                // draining every published sequence.
                if self.shutdown.load(Ordering::Acquire) && ring.is_drained() {
                    break;
                }
                wait.idle();
            } else {
                wait.reset();
                self.metrics.set_ring_utilization(ring.utilization());
            }
        }

        self.drain_seeds();
        if let Err(e) = self.wal.force() {
            self.metrics.wal_errors.fetch_add(1, Ordering::Relaxed);
            error!(error = %e, "final wal force failed");
        }
        self.publisher.close();
        info!(
            shard = %self.shard_id,
            matches = self.metrics.matches_emitted.load(Ordering::Relaxed),
            "event processor stopped"
        );
    }

    /// The per-event pipeline.
    fn process_event(&mut self, event: &OrderEvent, sequence: u64, end_of_batch: bool) {
        let pipeline_start = Instant::now();

        // Validate. A failure past the ring becomes a synthetic rejection
        // record; no panic crosses the event boundary.
        if let Err(reason) = self.validate(event) {
            self.metrics
                .phase_validation
                .record_duration(pipeline_start.elapsed());
            self.metrics.orders_rejected.fetch_add(1, Ordering::Relaxed);
            warn!(
                order_id = %event.order_id,
                symbol = %event.symbol,
                %reason,
                "order rejected past ingress"
            );
            self.record_rejection(event, sequence, &reason);
            if end_of_batch {
                self.finish_batch();
            }
            return;
        }
        let validated_at = Instant::now();

        match event.side {
            Side::Buy => &self.metrics.orders_received_buy,
            Side::Sell => &self.metrics.orders_received_sell,
        }
        .fetch_add(1, Ordering::Relaxed);

        // Construct an owned order; the slot is recycled by producers as
        // soon as the consumer sequence advances.
        let mut incoming = Order::new(
            event.order_id.clone(),
            event.symbol.clone(),
            event.side,
            event.price,
            event.quantity,
            event.timestamp_ms,
        );

        let book = self
            .books
            .entry(event.symbol.clone())
            .or_insert_with(|| OrderBook::new(event.symbol.clone()));

        let set = book.match_incoming(&mut incoming, &mut self.match_seq, &self.pool);
        let matched_at = Instant::now();

        // Rest the residual on its own side.
        let mut placed = None;
        if incoming.remaining > 0 {
            placed = Some(DomainEvent::OrderPlaced {
                order_id: incoming.id.clone(),
                symbol: incoming.symbol.clone(),
                side: incoming.side,
                price: incoming.price,
                quantity: incoming.remaining,
                timestamp_ms: current_time_millis(),
            });
            book.add_order(incoming);
        }

        // The book must never be crossed at rest between events.
        if let (Some(bid), Some(ask)) = (book.best_bid(), book.best_ask()) {
            assert!(
                bid < ask,
                "book {} crossed at rest: bid {bid} >= ask {ask}",
                book.symbol()
            );
        }
        let rested_at = Instant::now();

        self.scratch_events.clear();
        for result in &set.results {
            self.scratch_events.push(DomainEvent::from_match(result));
        }
        self.metrics
            .matches_emitted
            .fetch_add(set.results.len() as u64, Ordering::Relaxed);
        self.pool.return_results_vec(set.results);
        if let Some(placed) = placed {
            self.scratch_events.push(placed);
        }

        // WAL append: memory writes only; durability comes at the batch
        // boundary.
        let timestamp_ns = current_time_nanos();
        let events = std::mem::take(&mut self.scratch_events);
        for domain_event in &events {
            self.append_wal(sequence, timestamp_ns, domain_event);
        }
        let wal_at = Instant::now();

        for domain_event in &events {
            self.publish_event(domain_event);
        }
        self.scratch_events = events;
        let published_at = Instant::now();

        self.metrics
            .phase_validation
            .record_duration(validated_at - pipeline_start);
        self.metrics
            .phase_matching
            .record_duration(matched_at - validated_at);
        self.metrics
            .phase_insertion
            .record_duration(rested_at - matched_at);
        self.metrics.phase_wal.record_duration(wal_at - rested_at);
        self.metrics
            .phase_publish
            .record_duration(published_at - wal_at);
        self.metrics
            .end_to_end
            .record_duration(event.received.elapsed());
        self.update_book_gauges();

        if end_of_batch {
            self.finish_batch();
        }
    }

    fn validate(&self, event: &OrderEvent) -> Result<(), RejectReason> {
        if !self.symbols.contains(&event.symbol) {
            return Err(RejectReason::UnknownSymbol);
        }
        if event.price <= 0 {
            return Err(RejectReason::NonPositivePrice);
        }
        if event.quantity == 0 {
            return Err(RejectReason::NonPositiveQuantity);
        }
        Ok(())
    }

    fn record_rejection(&mut self, event: &OrderEvent, sequence: u64, reason: &RejectReason) {
        let rejected = DomainEvent::OrderRejected {
            order_id: event.order_id.clone(),
            symbol: event.symbol.clone(),
            reason: reason.to_string(),
            timestamp_ms: current_time_millis(),
        };
        self.append_wal(sequence, current_time_nanos(), &rejected);
        self.publish_event(&rejected);
    }

    fn append_wal(&mut self, sequence: u64, timestamp_ns: u64, event: &DomainEvent) {
        let record = WalRecord {
            sequence,
            timestamp_ns,
            event: event.clone(),
        };
        if let Err(e) = self.wal.append(&record) {
            self.metrics.wal_errors.fetch_add(1, Ordering::Relaxed);
            error!(error = %e, sequence, "wal append failed");
        }
    }

    fn publish_event(&self, event: &DomainEvent) {
        let topic = match event {
            DomainEvent::MatchExecuted { .. } => Topic::Matches,
            DomainEvent::OrderPlaced { .. } | DomainEvent::OrderRejected { .. } => Topic::Orders,
        };
        let payload = match serde_json::to_vec(event) {
            Ok(bytes) => bytes::Bytes::from(bytes),
            Err(e) => {
                self.metrics.publish_errors.fetch_add(1, Ordering::Relaxed);
                error!(error = %e, "failed to serialize outbound event");
                return;
            }
        };
        let outbound = OutboundEvent {
            topic,
            key: event.symbol().to_string(),
            payload,
        };
        if let Err(e) = self.publisher.enqueue(outbound) {
            self.metrics.publish_errors.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, "outbound enqueue refused");
        }
    }

    /// Batch boundary: force the WAL and wake the publisher worker.
    fn finish_batch(&mut self) {
        if let Err(e) = self.wal.force() {
            self.metrics.wal_errors.fetch_add(1, Ordering::Relaxed);
            error!(error = %e, "wal force failed");
        }
        self.publisher.flush();
    }

    /// Apply pending seed orders directly to the books. Called between
    /// batches only.
    fn drain_seeds(&mut self) {
        let mut seeded = false;
        while let Ok(seed) = self.seed_rx.try_recv() {
            if !self.symbols.contains(&seed.symbol) || seed.price <= 0 || seed.quantity == 0 {
                warn!(order_id = %seed.order_id, symbol = %seed.symbol, "seed order skipped");
                continue;
            }
            let order = Order::new(
                seed.order_id,
                seed.symbol.clone(),
                seed.side,
                seed.price,
                seed.quantity,
                current_time_millis(),
            );
            self.books
                .entry(seed.symbol.clone())
                .or_insert_with(|| OrderBook::new(seed.symbol))
                .add_order(order);
            seeded = true;
        }
        if seeded {
            self.update_book_gauges();
        }
    }

    fn update_book_gauges(&self) {
        let mut bid_depth = 0u64;
        let mut ask_depth = 0u64;
        let mut bid_levels = 0u64;
        let mut ask_levels = 0u64;
        for book in self.books.values() {
            bid_depth += book.bid_depth();
            ask_depth += book.ask_depth();
            bid_levels += book.bid_level_count() as u64;
            ask_levels += book.ask_level_count() as u64;
        }
        self.metrics
            .set_book_gauges(bid_depth, ask_depth, bid_levels, ask_levels);
    }
}

impl std::fmt::Debug for EventProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventProcessor")
            .field("shard_id", &self.shard_id)
            .field("symbols", &self.symbols)
            .field("books", &self.books.len())
            .field("next_match_id", &self.match_seq.peek())
            .finish()
    }
}
