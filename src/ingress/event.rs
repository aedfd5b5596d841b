//! The reusable ring-buffer slot type.

use crate::engine::{OrderKind, Side};
use std::time::Instant;

/// One pre-allocated ring-buffer slot.
///
/// Slots live for the lifetime of the ring and are recycled continuously:
/// producers overwrite every field in place rather than allocating per
/// event. The `String` fields keep their capacity across reuse, so steady
/// state publishes allocation-free.
#[derive(Debug)]
pub struct OrderEvent {
    /// Monotonic stamp captured by the producer immediately before publish;
    /// the consumer measures end-to-end latency against it.
    pub received: Instant,
    /// Caller-assigned order identifier.
    pub order_id: String,
    /// The trading symbol.
    pub symbol: String,
    /// Buy or Sell.
    pub side: Side,
    /// The order type (only limit).
    pub kind: OrderKind,
    /// Limit price in integer cents.
    pub price: i64,
    /// Order quantity.
    pub quantity: u64,
    /// Caller-supplied timestamp, epoch milliseconds. Advisory only: time
    /// priority is decided by ring sequence, never by this field.
    pub timestamp_ms: u64,
}

impl Default for OrderEvent {
    fn default() -> Self {
        Self {
            received: Instant::now(),
            order_id: String::new(),
            symbol: String::new(),
            side: Side::Buy,
            kind: OrderKind::Limit,
            price: 0,
            quantity: 0,
            timestamp_ms: 0,
        }
    }
}

impl OrderEvent {
    /// Overwrite every field from an incoming submission, reusing the
    /// existing string capacity.
    pub fn overwrite(
        &mut self,
        order_id: &str,
        symbol: &str,
        side: Side,
        kind: OrderKind,
        price: i64,
        quantity: u64,
        timestamp_ms: u64,
    ) {
        self.order_id.clear();
        self.order_id.push_str(order_id);
        self.symbol.clear();
        self.symbol.push_str(symbol);
        self.side = side;
        self.kind = kind;
        self.price = price;
        self.quantity = quantity;
        self.timestamp_ms = timestamp_ms;
        self.received = Instant::now();
    }
}
