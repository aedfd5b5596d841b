//! Match results emitted by the matcher.

use super::types::Side;
use serde::{Deserialize, Serialize};

/// A single maker/taker fill.
///
/// The execution price is always the maker's resting price, never the
/// taker's limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    /// Shard-local monotonically increasing match identifier.
    pub match_id: u64,
    /// The incoming (aggressive) order.
    pub taker_order_id: String,
    /// The resting (passive) order.
    pub maker_order_id: String,
    /// The traded symbol.
    pub symbol: String,
    /// Execution price in integer cents — the maker's resting price.
    pub execution_price: i64,
    /// Executed quantity, always positive.
    pub execution_quantity: u64,
    /// The side of the taker.
    pub taker_side: Side,
    /// Wall-clock timestamp of emission, epoch milliseconds.
    pub timestamp_ms: u64,
}

/// The ordered fills produced for one incoming order.
#[derive(Debug)]
pub struct MatchResultSet {
    /// Fills in execution order. Prices worsen monotonically for the taker.
    pub results: Vec<MatchResult>,
    /// Sum of execution quantities.
    pub total_filled: u64,
    /// Whether the incoming order's remaining quantity reached zero.
    pub taker_consumed: bool,
}

impl MatchResultSet {
    /// Whether the incoming order produced no fills.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// The per-shard match-id sequence.
///
/// Owned by the consumer thread; ids are unique within one shard's runtime
/// and carry no cross-restart meaning.
#[derive(Debug, Default)]
pub struct MatchSequence(u64);

impl MatchSequence {
    /// Start the sequence at zero.
    #[must_use]
    pub fn new() -> Self {
        Self(0)
    }

    /// The next id to be assigned.
    #[must_use]
    #[inline]
    pub fn peek(&self) -> u64 {
        self.0
    }

    /// Assign and consume the next id.
    #[inline]
    pub fn next(&mut self) -> u64 {
        let id = self.0;
        self.0 += 1;
        id
    }
}
