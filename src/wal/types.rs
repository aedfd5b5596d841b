//! Domain events recorded in the write-ahead log and fanned out to the
//! event stream.

use crate::engine::{MatchResult, Side};
use serde::{Deserialize, Serialize};

/// A domain event produced by the event-processor pipeline.
///
/// The same payloads are appended to the WAL and published outbound; the WAL
/// is the durable record, the stream is the low-latency one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainEvent {
    /// An order came to rest in a book.
    OrderPlaced {
        /// Caller-assigned order id.
        order_id: String,
        /// The trading symbol.
        symbol: String,
        /// Buy or Sell.
        side: Side,
        /// Limit price in integer cents.
        price: i64,
        /// The quantity that came to rest.
        quantity: u64,
        /// Wall-clock timestamp, epoch milliseconds.
        timestamp_ms: u64,
    },

    /// A maker/taker fill was executed.
    MatchExecuted {
        /// Shard-local match identifier.
        match_id: u64,
        /// The aggressive order.
        taker_order_id: String,
        /// The resting order.
        maker_order_id: String,
        /// The traded symbol.
        symbol: String,
        /// Execution price (the maker's resting price), integer cents.
        execution_price: i64,
        /// Executed quantity.
        execution_quantity: u64,
        /// The taker's side.
        taker_side: Side,
        /// Wall-clock timestamp, epoch milliseconds.
        timestamp_ms: u64,
    },

    /// An order failed validation after clearing the ring buffer and was
    /// dropped from the pipeline.
    OrderRejected {
        /// Caller-assigned order id.
        order_id: String,
        /// The submitted symbol (possibly not owned by this shard).
        symbol: String,
        /// Human-readable rejection reason.
        reason: String,
        /// Wall-clock timestamp, epoch milliseconds.
        timestamp_ms: u64,
    },
}

impl DomainEvent {
    /// Build a `MatchExecuted` event from a matcher fill.
    #[must_use]
    pub fn from_match(result: &MatchResult) -> Self {
        DomainEvent::MatchExecuted {
            match_id: result.match_id,
            taker_order_id: result.taker_order_id.clone(),
            maker_order_id: result.maker_order_id.clone(),
            symbol: result.symbol.clone(),
            execution_price: result.execution_price,
            execution_quantity: result.execution_quantity,
            taker_side: result.taker_side,
            timestamp_ms: result.timestamp_ms,
        }
    }

    /// The symbol this event is keyed by.
    #[must_use]
    pub fn symbol(&self) -> &str {
        match self {
            DomainEvent::OrderPlaced { symbol, .. }
            | DomainEvent::MatchExecuted { symbol, .. }
            | DomainEvent::OrderRejected { symbol, .. } => symbol,
        }
    }
}

/// A WAL record: a domain event stamped with the ring sequence that produced
/// it and a wall-clock nanosecond timestamp.
///
/// Records appear in the file in the event processor's consumption order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalRecord {
    /// The ring-buffer sequence of the event that produced this record.
    pub sequence: u64,

    /// Wall-clock timestamp in nanoseconds since the Unix epoch when the
    /// record was appended.
    pub timestamp_ns: u64,

    /// The recorded domain event.
    pub event: DomainEvent,
}
