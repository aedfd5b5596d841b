//! The price-time priority matching walk.

use super::book::OrderBook;
use super::pool::MatchingPool;
use super::trade::{MatchResult, MatchResultSet, MatchSequence};
use super::types::{Order, Side};
use crate::utils::current_time_millis;

impl OrderBook {
    /// Consume `incoming` against the opposite side of the book, emitting one
    /// [`MatchResult`] per fill.
    ///
    /// The walk visits opposite levels from the best price outward — asks
    /// ascending for a buy, bids descending for a sell — stopping at the
    /// incoming order's limit. Within a level, resting orders drain strictly
    /// head-first. Fully drained makers are unlinked from the book and the
    /// id index; emptied levels are removed from the sorted map before the
    /// walk advances, so the book is never observed with an empty level.
    ///
    /// The caller is responsible for resting `incoming` via
    /// [`OrderBook::add_order`] when its remaining quantity is still positive
    /// after the walk.
    ///
    /// # Panics
    ///
    /// Panics on quantity-conservation or price-monotonicity violations.
    /// These are matcher bugs; the shard must not continue with a corrupted
    /// book.
    pub fn match_incoming(
        &mut self,
        incoming: &mut Order,
        seq: &mut MatchSequence,
        pool: &MatchingPool,
    ) -> MatchResultSet {
        let mut results = pool.get_results_vec();
        let mut filled_makers = pool.get_ids_vec();
        let symbol = self.symbol().to_string();
        let timestamp_ms = current_time_millis();
        let mut total_drained: u64 = 0;
        let mut last_price: Option<i64> = None;

        loop {
            if incoming.remaining == 0 {
                break;
            }

            // Best opposite level: lowest ask for a buy, highest bid for a sell.
            let entry = match incoming.side {
                Side::Buy => self.asks.first_entry(),
                Side::Sell => self.bids.last_entry(),
            };
            let Some(mut entry) = entry else { break };
            let level_price = *entry.key();

            // Price gate: stop once the best opposite price is worse than the
            // incoming limit. A limit exactly equal to the best price matches.
            let crosses = match incoming.side {
                Side::Buy => incoming.price >= level_price,
                Side::Sell => incoming.price <= level_price,
            };
            if !crosses {
                break;
            }

            // Each subsequent level must be no better for the taker.
            if let Some(prev) = last_price {
                let monotone = match incoming.side {
                    Side::Buy => level_price >= prev,
                    Side::Sell => level_price <= prev,
                };
                assert!(
                    monotone,
                    "price walk regressed from {prev} to {level_price} for taker {}",
                    incoming.id
                );
            }
            last_price = Some(level_price);

            let level = entry.get_mut();
            while incoming.remaining > 0 {
                let Some(resting) = level.front() else { break };
                let fill = incoming.remaining.min(resting.remaining);
                assert!(
                    fill > 0,
                    "zero-quantity fill computed for taker {}",
                    incoming.id
                );

                incoming.fill(fill);
                let (maker_id, maker_remaining) = level.fill_front(fill);
                total_drained += fill;

                results.push(MatchResult {
                    match_id: seq.next(),
                    taker_order_id: incoming.id.clone(),
                    maker_order_id: maker_id,
                    symbol: symbol.clone(),
                    execution_price: level_price,
                    execution_quantity: fill,
                    taker_side: incoming.side,
                    timestamp_ms,
                });

                if maker_remaining == 0 {
                    if let Some(drained) = level.pop_front() {
                        filled_makers.push(drained.id);
                    }
                }
            }

            if level.is_empty() {
                entry.remove();
            }
        }

        self.reduce_depth(incoming.side.opposite(), total_drained);
        for maker_id in filled_makers.drain(..) {
            self.order_index.remove(&maker_id);
        }
        pool.return_ids_vec(filled_makers);

        MatchResultSet {
            results,
            total_filled: total_drained,
            taker_consumed: incoming.remaining == 0,
        }
    }
}
