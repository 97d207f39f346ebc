//! Property-Based Tests - Live Buffer Invariants
//!
//! Uses `proptest` to check that candle and trade buffers stay bounded,
//! ordered and in step with a naive model across random update streams.

use proptest::prelude::*;
use rust_decimal::Decimal;

use exchange_feeds::domain::{CandleBuffer, CandleChange, CandleStick, LiveTrade, TradeBuffer};

fn candle(time: i64, close: f64) -> CandleStick {
    CandleStick {
        time,
        open: close,
        high: close,
        low: close,
        close,
    }
}

// ── Candle Buffer Properties ────────────────────────────────

proptest! {
    /// Length never exceeds capacity and times stay strictly ascending.
    #[test]
    fn candle_buffer_bounded_and_ascending(
        capacity in 1usize..64,
        steps in prop::collection::vec((0i64..3, 1.0f64..100.0), 0..300),
    ) {
        let mut buffer = CandleBuffer::new(capacity);
        let mut time = 0i64;
        for (advance, close) in steps {
            time += advance * 60;
            buffer.apply(candle(time, close));
            prop_assert!(buffer.len() <= capacity);
        }
        let times: Vec<i64> = buffer.iter().map(|c| c.time).collect();
        prop_assert!(times.windows(2).all(|w| w[0] < w[1]), "not ascending: {times:?}");
    }

    /// Matches a naive Vec model: replace the last on equal time, append
    /// otherwise, drop from the front past capacity.
    #[test]
    fn candle_buffer_matches_model(
        capacity in 1usize..16,
        steps in prop::collection::vec((0i64..2, 1.0f64..100.0), 1..100),
    ) {
        let mut buffer = CandleBuffer::new(capacity);
        let mut model: Vec<CandleStick> = Vec::new();
        let mut time = 100i64;

        for (advance, close) in steps {
            time += advance * 60;
            let incoming = candle(time, close);
            let before = buffer.len();
            let change = buffer.apply(incoming);

            match model.last_mut() {
                Some(last) if last.time == time => {
                    *last = incoming;
                    prop_assert_eq!(change, CandleChange::Replaced);
                    prop_assert_eq!(buffer.len(), before);
                }
                _ => {
                    model.push(incoming);
                    if model.len() > capacity {
                        model.remove(0);
                    }
                    prop_assert_eq!(change, CandleChange::Appended);
                }
            }
        }
        prop_assert_eq!(buffer.to_vec(), model);
    }

    /// Updates older than the newest bucket never change the buffer.
    #[test]
    fn candle_buffer_ignores_stale_updates(
        history in prop::collection::btree_set(0i64..1000, 1..50),
        stale_offset in 1i64..1000,
    ) {
        let history: Vec<CandleStick> = history.into_iter().map(|t| candle(t * 60, 1.0)).collect();
        let newest = history.last().map(|c| c.time).unwrap_or_default();
        let mut buffer = CandleBuffer::with_history(500, history);
        let snapshot = buffer.to_vec();

        let change = buffer.apply(candle(newest - stale_offset, 9.0));
        prop_assert_eq!(change, CandleChange::Stale);
        prop_assert_eq!(buffer.to_vec(), snapshot);
    }
}

// ── Trade Buffer Properties ─────────────────────────────────

proptest! {
    /// The tape keeps the newest `capacity` prints, newest first.
    #[test]
    fn trade_buffer_keeps_newest_first(
        capacity in 1usize..32,
        count in 0usize..200,
    ) {
        let mut tape = TradeBuffer::new(capacity);
        for i in 0..count {
            tape.push(LiveTrade {
                id: i.to_string(),
                price: Decimal::from(i),
                quantity: Decimal::ONE,
                time: i64::try_from(i).unwrap(),
                is_buyer_maker: i % 2 == 0,
            });
        }

        prop_assert_eq!(tape.len(), count.min(capacity));
        let ids: Vec<usize> = tape.to_vec().iter().map(|t| t.id.parse().unwrap()).collect();
        let expected: Vec<usize> = (count.saturating_sub(capacity)..count).rev().collect();
        prop_assert_eq!(ids, expected);
    }
}
