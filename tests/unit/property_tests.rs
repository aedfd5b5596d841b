//! Property tests over random order streams feeding one book.

use matchcore_rs::prelude::*;
use proptest::prelude::*;

fn side_of(is_buy: bool) -> Side {
    if is_buy { Side::Buy } else { Side::Sell }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Quantity conservation, maker-price execution, monotone price walks,
    /// positive fills, and an uncrossed consistent book — across arbitrary
    /// order streams in a narrow price band that forces heavy matching.
    #[test]
    fn prop_matching_invariants(
        ops in proptest::collection::vec(
            (any::<bool>(), 9_990i64..10_010, 1u64..50),
            1..150,
        )
    ) {
        let mut book = OrderBook::new("A");
        let mut seq = MatchSequence::new();
        let pool = MatchingPool::new();
        let mut emitted = 0u64;

        for (i, (is_buy, price, qty)) in ops.into_iter().enumerate() {
            let side = side_of(is_buy);
            let opposite_depth_before = match side {
                Side::Buy => book.ask_depth(),
                Side::Sell => book.bid_depth(),
            };

            let mut incoming = Order::new(format!("o{i}"), "A".into(), side, price, qty, 0);
            let set = book.match_incoming(&mut incoming, &mut seq, &pool);

            // Fill accounting: the taker and the makers are debited the same
            // total, and the set's own bookkeeping agrees.
            let sum: u64 = set.results.iter().map(|r| r.execution_quantity).sum();
            prop_assert_eq!(sum, set.total_filled);
            prop_assert_eq!(incoming.filled, set.total_filled);
            let opposite_depth_after = match side {
                Side::Buy => book.ask_depth(),
                Side::Sell => book.bid_depth(),
            };
            prop_assert_eq!(opposite_depth_before - opposite_depth_after, set.total_filled);
            prop_assert_eq!(set.taker_consumed, incoming.remaining == 0);

            for result in &set.results {
                // No zero-quantity fills, taker side preserved, execution at
                // a price no worse than the taker's limit.
                prop_assert!(result.execution_quantity > 0);
                prop_assert_eq!(result.taker_side, side);
                match side {
                    Side::Buy => prop_assert!(result.execution_price <= price),
                    Side::Sell => prop_assert!(result.execution_price >= price),
                }
            }

            // The price sequence worsens monotonically for the taker.
            for pair in set.results.windows(2) {
                match side {
                    Side::Buy => prop_assert!(pair[1].execution_price >= pair[0].execution_price),
                    Side::Sell => prop_assert!(pair[1].execution_price <= pair[0].execution_price),
                }
            }

            emitted += set.results.len() as u64;
            if incoming.remaining > 0 {
                book.add_order(incoming);
            }

            // Every resting order satisfies the lifecycle invariants.
            for order in book.orders() {
                prop_assert_eq!(order.remaining + order.filled, order.quantity);
                prop_assert!(order.remaining > 0);
                prop_assert!(matches!(
                    order.status,
                    OrderStatus::New | OrderStatus::PartiallyFilled
                ));
            }

            // Never crossed at rest, indices consistent.
            if let (Some(bid), Some(ask)) = (book.best_bid(), book.best_ask()) {
                prop_assert!(bid < ask);
            }
            prop_assert!(book.check_consistency());
        }

        // One match id per emitted fill, gap-free.
        prop_assert_eq!(seq.peek(), emitted);
    }

    /// FIFO at a price: no fill accrues to the later order until the earlier
    /// one is fully consumed.
    #[test]
    fn prop_fifo_within_price_level(
        q1 in 1u64..100,
        q2 in 1u64..100,
        take in 1u64..250,
    ) {
        let mut book = OrderBook::new("A");
        let mut seq = MatchSequence::new();
        let pool = MatchingPool::new();

        book.add_order(Order::new("first".into(), "A".into(), Side::Buy, 15000, q1, 0));
        book.add_order(Order::new("second".into(), "A".into(), Side::Buy, 15000, q2, 0));

        let mut taker = Order::new("taker".into(), "A".into(), Side::Sell, 15000, take, 0);
        let set = book.match_incoming(&mut taker, &mut seq, &pool);

        let mut first_filled = 0u64;
        for result in &set.results {
            if result.maker_order_id == "second" {
                prop_assert_eq!(first_filled, q1, "second filled before first drained");
            } else {
                first_filled += result.execution_quantity;
            }
        }
        prop_assert_eq!(set.total_filled, take.min(q1 + q2));
    }

    /// Replaying the same seed and the same aggressive order produces the
    /// same fill sequence, match ids aside.
    #[test]
    fn prop_matching_is_deterministic(
        seeds in proptest::collection::vec((9_990i64..10_010, 1u64..50), 1..20),
        take_price in 9_990i64..10_010,
        take_qty in 1u64..200,
    ) {
        let run = || {
            let mut book = OrderBook::new("A");
            let mut seq = MatchSequence::new();
            let pool = MatchingPool::new();
            for (i, (price, qty)) in seeds.iter().enumerate() {
                book.add_order(Order::new(format!("s{i}"), "A".into(), Side::Sell, *price, *qty, 0));
            }
            let mut taker = Order::new("t".into(), "A".into(), Side::Buy, take_price, take_qty, 0);
            let set = book.match_incoming(&mut taker, &mut seq, &pool);
            set.results
                .iter()
                .map(|r| (r.maker_order_id.clone(), r.execution_price, r.execution_quantity))
                .collect::<Vec<_>>()
        };
        prop_assert_eq!(run(), run());
    }
}
