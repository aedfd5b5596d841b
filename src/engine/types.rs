//! Core order types shared by the book, the matcher, and the ingress pipeline.
//!
//! All prices are signed 64-bit integer cents and all quantities are unsigned
//! 64-bit integers. No floating point ever enters the book.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The side of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// A buy order rests on the bid side and takes from the asks.
    Buy,
    /// A sell order rests on the ask side and takes from the bids.
    Sell,
}

impl Side {
    /// Returns the opposite side.
    #[must_use]
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Parse from the wire representation (`"BUY"` / `"SELL"`).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "BUY" => Some(Side::Buy),
            "SELL" => Some(Side::Sell),
            _ => None,
        }
    }

    /// The label used for metrics and wire payloads.
    #[must_use]
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The order type carried on the wire. Only limit orders are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderKind {
    /// A limit order: matches up to its limit price, rests otherwise.
    #[default]
    Limit,
}

impl OrderKind {
    /// Parse from the wire representation (`"LIMIT"`).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LIMIT" => Some(OrderKind::Limit),
            _ => None,
        }
    }
}

/// The lifecycle state of an order.
///
/// `Filled`, `Cancelled`, and `Rejected` are terminal; an order in a terminal
/// state is never present in a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Accepted, no fills yet.
    New,
    /// At least one fill, remaining quantity still positive.
    PartiallyFilled,
    /// Remaining quantity reached zero.
    Filled,
    /// Removed before completion.
    Cancelled,
    /// Failed validation; never entered a book.
    Rejected,
}

impl OrderStatus {
    /// Whether this state is terminal (the order can never rest again).
    #[must_use]
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }
}

/// A limit order as owned by the book.
///
/// Invariants, checked by [`Order::fill`]:
/// - `remaining + filled == quantity`
/// - `status == Filled` exactly when `remaining == 0`
/// - while resting, `status` is `New` or `PartiallyFilled`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Caller-assigned identifier, unique per shard while the order lives.
    pub id: String,
    /// The trading symbol.
    pub symbol: String,
    /// Buy or Sell.
    pub side: Side,
    /// Limit price in integer cents.
    pub price: i64,
    /// Original quantity.
    pub quantity: u64,
    /// Quantity not yet filled.
    pub remaining: u64,
    /// Quantity filled so far.
    pub filled: u64,
    /// Caller-supplied arrival timestamp, epoch milliseconds. Advisory only:
    /// time priority is ring-buffer sequence order, never this field.
    pub timestamp_ms: u64,
    /// Lifecycle state.
    pub status: OrderStatus,
}

impl Order {
    /// Create a new order with no fills.
    #[must_use]
    pub fn new(
        id: String,
        symbol: String,
        side: Side,
        price: i64,
        quantity: u64,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            id,
            symbol,
            side,
            price,
            quantity,
            remaining: quantity,
            filled: 0,
            timestamp_ms,
            status: OrderStatus::New,
        }
    }

    /// Apply a fill of `qty` against this order, updating the quantity
    /// accounting and the lifecycle state.
    ///
    /// # Panics
    ///
    /// Panics when `qty` is zero or exceeds the remaining quantity. Both are
    /// quantity-conservation violations and the shard must not continue.
    pub fn fill(&mut self, qty: u64) {
        assert!(qty > 0, "zero-quantity fill on order {}", self.id);
        assert!(
            qty <= self.remaining,
            "fill {qty} exceeds remaining {} on order {}",
            self.remaining,
            self.id
        );
        self.remaining -= qty;
        self.filled += qty;
        debug_assert_eq!(self.remaining + self.filled, self.quantity);
        self.status = if self.remaining == 0 {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }

    #[test]
    fn test_side_parse() {
        assert_eq!(Side::parse("BUY"), Some(Side::Buy));
        assert_eq!(Side::parse("SELL"), Some(Side::Sell));
        assert_eq!(Side::parse("buy"), None);
        assert_eq!(Side::parse(""), None);
    }

    #[test]
    fn test_order_kind_parse() {
        assert_eq!(OrderKind::parse("LIMIT"), Some(OrderKind::Limit));
        assert_eq!(OrderKind::parse("MARKET"), None);
    }

    #[test]
    fn test_fill_accounting() {
        let mut order = Order::new("o1".into(), "A".into(), Side::Buy, 15000, 100, 0);
        assert_eq!(order.status, OrderStatus::New);

        order.fill(40);
        assert_eq!(order.remaining, 60);
        assert_eq!(order.filled, 40);
        assert_eq!(order.status, OrderStatus::PartiallyFilled);

        order.fill(60);
        assert_eq!(order.remaining, 0);
        assert_eq!(order.filled, 100);
        assert_eq!(order.status, OrderStatus::Filled);
        assert!(order.status.is_terminal());
    }

    #[test]
    #[should_panic(expected = "exceeds remaining")]
    fn test_overfill_panics() {
        let mut order = Order::new("o1".into(), "A".into(), Side::Sell, 15000, 10, 0);
        order.fill(11);
    }

    #[test]
    #[should_panic(expected = "zero-quantity fill")]
    fn test_zero_fill_panics() {
        let mut order = Order::new("o1".into(), "A".into(), Side::Sell, 15000, 10, 0);
        order.fill(0);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&OrderStatus::PartiallyFilled);
        assert!(json.is_ok());
        assert_eq!(json.unwrap_or_default(), "\"PARTIALLY_FILLED\"");
    }

    #[test]
    fn test_side_serialization() {
        assert_eq!(
            serde_json::to_string(&Side::Buy).unwrap_or_default(),
            "\"BUY\""
        );
    }
}
