//! Bounded in-memory buffers fed by live streams.
//!
//! `CandleBuffer` keeps candles oldest-first and reconciles the still
//! forming bucket in place. `TradeBuffer` keeps the most recent prints
//! newest-first.

use std::collections::VecDeque;

use super::market::{CandleStick, LiveTrade};

/// What applying a candle did to the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandleChange {
    /// Same bucket as the last candle; it was overwritten.
    Replaced,
    /// New bucket appended at the back.
    Appended,
    /// Older than the last bucket; dropped to keep `time` monotonic.
    Stale,
}

/// Oldest-first candle window with a hard capacity.
#[derive(Debug, Clone)]
pub struct CandleBuffer {
    candles: VecDeque<CandleStick>,
    capacity: usize,
}

impl CandleBuffer {
    /// Create an empty buffer. A zero capacity is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            candles: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Seed the buffer from a backfill, keeping only the newest `capacity`.
    ///
    /// Input is sorted and deduplicated by `time`; the last occurrence of a
    /// bucket wins.
    pub fn with_history(capacity: usize, history: impl IntoIterator<Item = CandleStick>) -> Self {
        let mut buffer = Self::new(capacity);
        let mut history: Vec<CandleStick> = history.into_iter().collect();
        history.sort_by_key(|c| c.time);
        for candle in history {
            buffer.apply(candle);
        }
        buffer
    }

    /// Merge one live candle update.
    pub fn apply(&mut self, candle: CandleStick) -> CandleChange {
        match self.candles.back_mut() {
            Some(last) if last.time == candle.time => {
                *last = candle;
                CandleChange::Replaced
            }
            Some(last) if candle.time < last.time => CandleChange::Stale,
            _ => {
                self.candles.push_back(candle);
                while self.candles.len() > self.capacity {
                    self.candles.pop_front();
                }
                CandleChange::Appended
            }
        }
    }

    pub fn last(&self) -> Option<&CandleStick> {
        self.candles.back()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &CandleStick> {
        self.candles.iter()
    }

    /// Copy out the window, oldest first.
    pub fn to_vec(&self) -> Vec<CandleStick> {
        self.candles.iter().copied().collect()
    }
}

/// Newest-first trade tape with a hard capacity.
#[derive(Debug, Clone)]
pub struct TradeBuffer {
    trades: VecDeque<LiveTrade>,
    capacity: usize,
}

impl TradeBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            trades: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Prepend a print, evicting the oldest one past capacity.
    pub fn push(&mut self, trade: LiveTrade) {
        self.trades.push_front(trade);
        self.trades.truncate(self.capacity);
    }

    pub fn latest(&self) -> Option<&LiveTrade> {
        self.trades.front()
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn to_vec(&self) -> Vec<LiveTrade> {
        self.trades.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn candle(time: i64, close: f64) -> CandleStick {
        CandleStick {
            time,
            open: close,
            high: close,
            low: close,
            close,
        }
    }

    fn trade(id: u32) -> LiveTrade {
        LiveTrade {
            id: id.to_string(),
            price: dec!(100.5),
            quantity: dec!(0.25),
            time: i64::from(id),
            is_buyer_maker: false,
        }
    }

    #[test]
    fn test_same_bucket_replaces_in_place() {
        let mut buf = CandleBuffer::with_history(10, [candle(40, 1.0), candle(100, 2.0)]);
        assert_eq!(buf.apply(candle(100, 3.0)), CandleChange::Replaced);
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.last().unwrap().close, 3.0);
    }

    #[test]
    fn test_new_bucket_appends() {
        let mut buf = CandleBuffer::with_history(10, [candle(40, 1.0), candle(100, 2.0)]);
        assert_eq!(buf.apply(candle(160, 4.0)), CandleChange::Appended);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.last().unwrap().time, 160);
    }

    #[test]
    fn test_append_past_capacity_drops_oldest() {
        let mut buf = CandleBuffer::with_history(2, [candle(40, 1.0), candle(100, 2.0)]);
        buf.apply(candle(160, 3.0));
        let times: Vec<i64> = buf.iter().map(|c| c.time).collect();
        assert_eq!(times, vec![100, 160]);
    }

    #[test]
    fn test_older_bucket_is_ignored() {
        let mut buf = CandleBuffer::with_history(10, [candle(100, 2.0)]);
        assert_eq!(buf.apply(candle(40, 9.0)), CandleChange::Stale);
        assert_eq!(buf.to_vec(), vec![candle(100, 2.0)]);
    }

    #[test]
    fn test_history_is_sorted_and_trimmed() {
        let buf = CandleBuffer::with_history(2, [candle(160, 3.0), candle(40, 1.0), candle(100, 2.0)]);
        let times: Vec<i64> = buf.iter().map(|c| c.time).collect();
        assert_eq!(times, vec![100, 160]);
    }

    #[test]
    fn test_trade_buffer_is_newest_first_and_bounded() {
        let mut tape = TradeBuffer::new(50);
        for id in 0..60 {
            tape.push(trade(id));
        }
        assert_eq!(tape.len(), 50);
        assert_eq!(tape.latest().unwrap().id, "59");
        assert_eq!(tape.to_vec().last().unwrap().id, "10");
    }
}
