//! Core OrderBook implementation for managing price levels and orders.

use super::level::PriceLevel;
use super::types::{Order, Side};
use std::collections::{BTreeMap, HashMap};
use tracing::trace;

/// A per-symbol limit order book with three always-consistent indices:
/// the bid side, the ask side, and an order-id index reserved for O(1)
/// cancel-by-id.
///
/// Both sides are ascending sorted maps. The best ask is the first ask
/// entry; the best bid is the last bid entry (iteration over bids runs in
/// reverse, mirroring the matcher's walk). Each price key holds exactly one
/// [`PriceLevel`], so equal prices collapse and FIFO within a level is the
/// only tie-break.
///
/// The book is exclusively owned by the shard's consumer thread: it is
/// constructed there and a handle to it is never shared. Telemetry reads
/// derived counters the consumer writes through, not this structure.
/// Operations cannot fail at runtime; precondition violations are bugs and
/// fail fast.
#[derive(Debug)]
pub struct OrderBook {
    symbol: String,
    pub(super) bids: BTreeMap<i64, PriceLevel>,
    pub(super) asks: BTreeMap<i64, PriceLevel>,
    /// Order id → (price, side), locating the order's level.
    pub(super) order_index: HashMap<String, (i64, Side)>,
    bid_depth: u64,
    ask_depth: u64,
}

impl OrderBook {
    /// Create an empty book for `symbol`.
    #[must_use]
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            order_index: HashMap::new(),
            bid_depth: 0,
            ask_depth: 0,
        }
    }

    /// The symbol this book belongs to.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Place `order` into the level matching its side and price, creating
    /// the level if absent, and index it by id.
    ///
    /// # Panics
    ///
    /// Panics when the order has zero remaining quantity or is in a terminal
    /// state. The consumer must not rest such orders.
    pub fn add_order(&mut self, order: Order) {
        assert!(
            order.remaining > 0,
            "resting order {} with zero remaining quantity",
            order.id
        );
        assert!(
            !order.status.is_terminal(),
            "resting order {} in terminal state {:?}",
            order.id,
            order.status
        );
        trace!(
            order_id = %order.id,
            side = %order.side,
            price = order.price,
            remaining = order.remaining,
            "resting order"
        );

        let (side_map, depth) = match order.side {
            Side::Buy => (&mut self.bids, &mut self.bid_depth),
            Side::Sell => (&mut self.asks, &mut self.ask_depth),
        };
        *depth += order.remaining;
        self.order_index
            .insert(order.id.clone(), (order.price, order.side));
        side_map
            .entry(order.price)
            .or_insert_with(|| PriceLevel::new(order.price))
            .push_back(order);
    }

    /// Remove an order by id: unlink it from its level, drop the level if it
    /// empties, and erase the index entry. A no-op when the id is unknown.
    pub fn remove_order(&mut self, order_id: &str) -> Option<Order> {
        let (price, side) = self.order_index.remove(order_id)?;
        let (side_map, depth) = match side {
            Side::Buy => (&mut self.bids, &mut self.bid_depth),
            Side::Sell => (&mut self.asks, &mut self.ask_depth),
        };
        let level = side_map.get_mut(&price)?;
        let removed = level.remove(order_id);
        if let Some(o) = &removed {
            *depth -= o.remaining;
        }
        if level.is_empty() {
            side_map.remove(&price);
        }
        removed
    }

    /// The highest bid price, if any bid rests.
    #[must_use]
    pub fn best_bid(&self) -> Option<i64> {
        self.bids.last_key_value().map(|(price, _)| *price)
    }

    /// The lowest ask price, if any ask rests.
    #[must_use]
    pub fn best_ask(&self) -> Option<i64> {
        self.asks.first_key_value().map(|(price, _)| *price)
    }

    /// Total resting quantity on the bid side.
    #[must_use]
    #[inline]
    pub fn bid_depth(&self) -> u64 {
        self.bid_depth
    }

    /// Total resting quantity on the ask side.
    #[must_use]
    #[inline]
    pub fn ask_depth(&self) -> u64 {
        self.ask_depth
    }

    /// Number of distinct bid price levels.
    #[must_use]
    #[inline]
    pub fn bid_level_count(&self) -> usize {
        self.bids.len()
    }

    /// Number of distinct ask price levels.
    #[must_use]
    #[inline]
    pub fn ask_level_count(&self) -> usize {
        self.asks.len()
    }

    /// Number of orders resting in the book.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.order_index.len()
    }

    /// Look up a resting order by id.
    #[must_use]
    pub fn get_order(&self, order_id: &str) -> Option<&Order> {
        let (price, side) = self.order_index.get(order_id)?;
        let side_map = match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        };
        side_map
            .get(price)?
            .iter()
            .find(|o| o.id == order_id)
    }

    /// Iterate every resting order, bids then asks, levels in price order.
    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.bids
            .values()
            .flat_map(PriceLevel::iter)
            .chain(self.asks.values().flat_map(PriceLevel::iter))
    }

    /// Total resting quantity at one price on one side, if the level exists.
    #[must_use]
    pub fn level_quantity(&self, side: Side, price: i64) -> Option<u64> {
        let side_map = match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        };
        side_map.get(&price).map(PriceLevel::total_quantity)
    }

    /// Adjust the cached side depth after fills drained by the matcher.
    pub(super) fn reduce_depth(&mut self, side: Side, qty: u64) {
        match side {
            Side::Buy => self.bid_depth -= qty,
            Side::Sell => self.ask_depth -= qty,
        }
    }

    /// Cross-index consistency check: every indexed order is present in the
    /// level the index points at, no level is empty, depth aggregates match,
    /// and the book is not crossed. Used by tests and debug assertions.
    #[must_use]
    pub fn check_consistency(&self) -> bool {
        let mut bid_sum = 0u64;
        let mut ask_sum = 0u64;
        for (price, level) in &self.bids {
            if level.is_empty() || level.price() != *price {
                return false;
            }
            bid_sum += level.total_quantity();
        }
        for (price, level) in &self.asks {
            if level.is_empty() || level.price() != *price {
                return false;
            }
            ask_sum += level.total_quantity();
        }
        if bid_sum != self.bid_depth || ask_sum != self.ask_depth {
            return false;
        }
        for (id, (price, side)) in &self.order_index {
            let side_map = match side {
                Side::Buy => &self.bids,
                Side::Sell => &self.asks,
            };
            let present = side_map
                .get(price)
                .is_some_and(|level| level.iter().any(|o| &o.id == id));
            if !present {
                return false;
            }
        }
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => bid < ask,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::OrderStatus;

    fn order(id: &str, side: Side, price: i64, qty: u64) -> Order {
        Order::new(id.into(), "A".into(), side, price, qty, 0)
    }

    #[test]
    fn test_add_and_best_prices() {
        let mut book = OrderBook::new("A");
        assert!(book.best_bid().is_none());
        assert!(book.best_ask().is_none());

        book.add_order(order("b1", Side::Buy, 14900, 10));
        book.add_order(order("b2", Side::Buy, 14950, 20));
        book.add_order(order("s1", Side::Sell, 15000, 30));
        book.add_order(order("s2", Side::Sell, 15100, 40));

        assert_eq!(book.best_bid(), Some(14950));
        assert_eq!(book.best_ask(), Some(15000));
        assert_eq!(book.bid_depth(), 30);
        assert_eq!(book.ask_depth(), 70);
        assert_eq!(book.bid_level_count(), 2);
        assert_eq!(book.ask_level_count(), 2);
        assert_eq!(book.order_count(), 4);
        assert!(book.check_consistency());
    }

    #[test]
    fn test_same_price_collapses_to_one_level() {
        let mut book = OrderBook::new("A");
        book.add_order(order("s1", Side::Sell, 15000, 10));
        book.add_order(order("s2", Side::Sell, 15000, 20));

        assert_eq!(book.ask_level_count(), 1);
        assert_eq!(book.level_quantity(Side::Sell, 15000), Some(30));
    }

    #[test]
    fn test_remove_order_is_idempotent() {
        let mut book = OrderBook::new("A");
        book.add_order(order("b1", Side::Buy, 14900, 10));

        let removed = book.remove_order("b1");
        assert_eq!(removed.map(|o| o.id), Some("b1".to_string()));
        assert_eq!(book.bid_level_count(), 0);
        assert_eq!(book.bid_depth(), 0);

        // Unknown id is a silent no-op.
        assert!(book.remove_order("b1").is_none());
        assert!(book.remove_order("never-seen").is_none());
        assert!(book.check_consistency());
    }

    #[test]
    fn test_remove_keeps_nonempty_level() {
        let mut book = OrderBook::new("A");
        book.add_order(order("s1", Side::Sell, 15000, 10));
        book.add_order(order("s2", Side::Sell, 15000, 20));

        book.remove_order("s1");
        assert_eq!(book.ask_level_count(), 1);
        assert_eq!(book.level_quantity(Side::Sell, 15000), Some(20));
        assert!(book.check_consistency());
    }

    #[test]
    fn test_get_order() {
        let mut book = OrderBook::new("A");
        book.add_order(order("b1", Side::Buy, 14900, 10));

        let found = book.get_order("b1");
        assert!(found.is_some());
        assert_eq!(found.map(|o| o.remaining), Some(10));
        assert!(book.get_order("missing").is_none());
    }

    #[test]
    #[should_panic(expected = "zero remaining quantity")]
    fn test_add_zero_remaining_panics() {
        let mut book = OrderBook::new("A");
        let mut o = order("b1", Side::Buy, 14900, 10);
        o.fill(10);
        // o is now Filled with zero remaining; resting it is a bug.
        o.status = OrderStatus::New;
        book.add_order(o);
    }
}
