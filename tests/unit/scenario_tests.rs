//! Literal end-to-end matching scenarios against a single book.

use matchcore_rs::prelude::*;

fn order(id: &str, side: Side, price: i64, qty: u64) -> Order {
    Order::new(id.into(), "A".into(), side, price, qty, 0)
}

/// Seed SELL s1@15000x100 and SELL s2@15100x100.
fn seeded_book() -> OrderBook {
    let mut book = OrderBook::new("A");
    book.add_order(order("S1", Side::Sell, 15000, 100));
    book.add_order(order("S2", Side::Sell, 15100, 100));
    book
}

#[test]
fn scenario_buy_inside_spread_partially_fills_best_ask() {
    let mut book = seeded_book();
    let mut seq = MatchSequence::new();
    let pool = MatchingPool::new();

    let mut taker = order("B1", Side::Buy, 15050, 50);
    let set = book.match_incoming(&mut taker, &mut seq, &pool);

    assert_eq!(set.results.len(), 1);
    let fill = &set.results[0];
    assert_eq!(fill.taker_order_id, "B1");
    assert_eq!(fill.maker_order_id, "S1");
    assert_eq!(fill.execution_price, 15000);
    assert_eq!(fill.execution_quantity, 50);
    assert!(set.taker_consumed);

    assert_eq!(book.get_order("S1").map(|o| o.remaining), Some(50));
    assert_eq!(book.get_order("S2").map(|o| o.remaining), Some(100));
    assert_eq!(taker.remaining, 0);
    assert!(book.check_consistency());
}

#[test]
fn scenario_buy_sweeping_two_levels() {
    let mut book = seeded_book();
    let mut seq = MatchSequence::new();
    let pool = MatchingPool::new();

    let mut taker = order("B2", Side::Buy, 15100, 150);
    let set = book.match_incoming(&mut taker, &mut seq, &pool);

    assert_eq!(set.results.len(), 2);
    assert_eq!(
        (set.results[0].maker_order_id.as_str(), set.results[0].execution_price, set.results[0].execution_quantity),
        ("S1", 15000, 100)
    );
    assert_eq!(
        (set.results[1].maker_order_id.as_str(), set.results[1].execution_price, set.results[1].execution_quantity),
        ("S2", 15100, 50)
    );
    assert!(set.taker_consumed);

    // S1 gone and its level removed from the asks.
    assert!(book.get_order("S1").is_none());
    assert_eq!(book.level_quantity(Side::Sell, 15000), None);
    assert_eq!(book.get_order("S2").map(|o| o.remaining), Some(50));
    assert_eq!(book.best_ask(), Some(15100));
    assert!(book.check_consistency());
}

#[test]
fn scenario_buy_clearing_the_ask_side_rests_residual() {
    let mut book = seeded_book();
    let mut seq = MatchSequence::new();
    let pool = MatchingPool::new();

    let mut taker = order("B3", Side::Buy, 15100, 250);
    let set = book.match_incoming(&mut taker, &mut seq, &pool);

    assert_eq!(set.results.len(), 2);
    assert_eq!(set.results[0].execution_quantity, 100);
    assert_eq!(set.results[1].execution_quantity, 100);
    assert_eq!(set.total_filled, 200);
    assert!(!set.taker_consumed);
    assert_eq!(taker.remaining, 50);

    // The caller rests the residual on its own side.
    book.add_order(taker);
    assert_eq!(book.ask_level_count(), 0);
    assert_eq!(book.best_bid(), Some(15100));
    assert_eq!(book.get_order("B3").map(|o| o.remaining), Some(50));
    assert_eq!(book.get_order("B3").map(|o| o.status), Some(OrderStatus::PartiallyFilled));
    assert!(book.check_consistency());
}

#[test]
fn scenario_fifo_at_equal_price() {
    let mut book = OrderBook::new("A");
    let mut seq = MatchSequence::new();
    let pool = MatchingPool::new();

    book.add_order(order("B4", Side::Buy, 15000, 10));
    book.add_order(order("B5", Side::Buy, 15000, 10));

    let mut taker = order("S3", Side::Sell, 15000, 15);
    let set = book.match_incoming(&mut taker, &mut seq, &pool);

    assert_eq!(set.results.len(), 2);
    assert_eq!(
        (set.results[0].maker_order_id.as_str(), set.results[0].execution_quantity),
        ("B4", 10)
    );
    assert_eq!(
        (set.results[1].maker_order_id.as_str(), set.results[1].execution_quantity),
        ("B5", 5)
    );
    assert!(set.taker_consumed);

    assert!(book.get_order("B4").is_none());
    assert_eq!(book.get_order("B5").map(|o| o.remaining), Some(5));
    assert!(book.check_consistency());
}

#[test]
fn boundary_exact_level_consumption_removes_level() {
    let mut book = seeded_book();
    let mut seq = MatchSequence::new();
    let pool = MatchingPool::new();

    // Consumes exactly the 15000 level, leaving it empty.
    let mut taker = order("B6", Side::Buy, 15000, 100);
    let set = book.match_incoming(&mut taker, &mut seq, &pool);

    assert_eq!(set.total_filled, 100);
    assert!(set.taker_consumed);
    assert_eq!(book.level_quantity(Side::Sell, 15000), None);
    assert_eq!(book.best_ask(), Some(15100));
    assert!(book.check_consistency());
}

#[test]
fn determinism_same_seed_same_fills() {
    let run = || {
        let mut book = seeded_book();
        let mut seq = MatchSequence::new();
        let pool = MatchingPool::new();
        let mut taker = order("B7", Side::Buy, 15100, 150);
        let set = book.match_incoming(&mut taker, &mut seq, &pool);
        set.results
            .iter()
            .map(|r| {
                (
                    r.maker_order_id.clone(),
                    r.execution_price,
                    r.execution_quantity,
                )
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}
