//! # Sharded Limit-Order Matching Core
//!
//! A single-writer, in-memory price-time priority matching engine fronted by
//! a lock-free multi-producer ring buffer, with a durable memory-mapped
//! write-ahead log, asynchronous event publication, and a symbol-routing
//! edge front-end for horizontal scaling across disjoint symbol sets.
//!
//! ## Architecture
//!
//! Each shard runs one tight pipeline:
//!
//! ```text
//! producers (HTTP handlers)          consumer thread                background I/O
//! ───────────────────────────  ────────────────────────────────  ──────────────────
//! claim → write slot → publish  validate → match → rest → WAL →   NATS publish
//!        (ring buffer)          publish enqueue → metrics         WAL msync (batch)
//! ```
//!
//! - **Ingress** ([`ingress`]): a fixed power-of-two array of pre-allocated
//!   event slots. Producers claim sequences with a gated compare-and-swap
//!   and publish per-slot with release ordering; the single consumer drains
//!   every contiguous sequence in one batch. A full ring fails the claim
//!   immediately — producers never block, and the cursor is never corrupted.
//! - **Order book** ([`engine`]): per-symbol books with sorted bid/ask maps,
//!   strict FIFO price levels, and an id index reserved for O(1) cancel.
//!   Exclusively owned by the consumer thread; no locks anywhere on the
//!   matching path.
//! - **Matcher** ([`engine`]): deterministic price-time priority walk.
//!   Execution always happens at the maker's resting price; fills conserve
//!   quantity by construction and violations fail fast.
//! - **Durability** ([`wal`]): one pre-allocated memory-mapped file per
//!   shard. Appends are memory writes; an explicit force at batch
//!   boundaries makes the batch durable. Records are length-prefixed and
//!   CRC32-checked, and can be read back and verified.
//! - **Publication** ([`publish`]): bounded, non-blocking enqueue onto a
//!   lock-free queue drained by a background NATS worker. Saturation is a
//!   counted error, never a stall; the WAL remains the durable record.
//! - **Edge router** ([`router`]): a stateless front-end mapping symbols to
//!   shard endpoints through an explicit table and forwarding bodies
//!   unchanged over a pooled client.
//!
//! ## Concurrency model
//!
//! Per shard: many producer threads, exactly one consumer thread, and
//! background I/O workers. The consumer is the sole writer of the books,
//! the WAL, the match-id sequence, and the publisher's enqueue path.
//! Cross-thread coordination is confined to the ring buffer's
//! acquire/release protocol, the publisher's lock-free queue, and relaxed
//! metric atomics. Within a shard, events execute in a strict total order —
//! the ring sequence — which also fixes time priority at equal prices.
//!
//! ## Error philosophy
//!
//! Recoverable conditions (validation rejections, ring overflow, publisher
//! or WAL saturation) are explicit return values, surfaced as response
//! classes and counters. Invariant violations (quantity conservation,
//! crossed books, sequence regressions) abort the shard: continuing would
//! corrupt the book, and supervision is expected to restart the process.

pub mod engine;
pub mod ingress;
pub mod metrics;
pub mod prelude;
pub mod processor;
pub mod publish;
pub mod router;
pub mod shard;
pub mod utils;
pub mod wal;

pub use engine::{
    MatchResult, MatchResultSet, MatchSequence, MatchingPool, Order, OrderBook, OrderKind,
    OrderStatus, PriceLevel, RejectReason, Side,
};
pub use ingress::{OrderEvent, OrderIngress, RingBuffer, RingFull, YieldingWait};
pub use metrics::{LatencyHistogram, ShardMetrics};
pub use processor::{EventProcessor, SeedOrder};
pub use publish::{
    BufferPublisher, EventPublisher, NatsEventPublisher, NullPublisher, OutboundEvent,
    PublishError, Topic,
};
pub use router::{RouterConfig, RouterState, ShardEndpoint, SymbolTable, edge_router};
pub use shard::{ConfigError, ShardConfig, ShardError, ShardHandle, start_shard};
pub use wal::{DomainEvent, WalEntry, WalError, WalRecord, WriteAheadLog};
