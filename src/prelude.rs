//! Convenience re-exports for common usage.
//!
//! ```rust
//! use matchcore_rs::prelude::*;
//!
//! let mut book = OrderBook::new("BTC/USD");
//! let mut seq = MatchSequence::new();
//! let pool = MatchingPool::new();
//!
//! book.add_order(Order::new("s1".into(), "BTC/USD".into(), Side::Sell, 15000, 100, 0));
//! let mut taker = Order::new("b1".into(), "BTC/USD".into(), Side::Buy, 15000, 40, 0);
//! let fills = book.match_incoming(&mut taker, &mut seq, &pool);
//! assert_eq!(fills.total_filled, 40);
//! ```

pub use crate::engine::{
    MatchResult, MatchResultSet, MatchSequence, MatchingPool, Order, OrderBook, OrderKind,
    OrderStatus, PriceLevel, RejectReason, Side,
};
pub use crate::ingress::{OrderEvent, OrderIngress, RingBuffer, RingFull};
pub use crate::metrics::ShardMetrics;
pub use crate::processor::{EventProcessor, SeedOrder};
pub use crate::publish::{BufferPublisher, EventPublisher, NatsEventPublisher, Topic};
pub use crate::shard::{ShardConfig, ShardHandle, start_shard};
pub use crate::wal::{DomainEvent, WalRecord, WriteAheadLog};
