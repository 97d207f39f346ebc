//! Live Market Views - Backfilled, Continuously Updated Snapshots
//!
//! The consumer end of the data flow: REST backfill first, then live
//! events folded into bounded in-memory state. Each view publishes its
//! state on a `watch` channel so renderers only ever see whole snapshots.
//!
//! - `LiveCandles`: candle series, replace-or-append, capped.
//! - `TradeTape`: newest-first recent prints, capped.
//! - `DepthView`: latest order-book window, replaced wholesale.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tracing::{debug, warn};

use super::multiplexer::{StreamMultiplexer, SubscribeOptions, Subscription};
use super::rest_service::RestDataService;
use crate::domain::{
    CandleBuffer, CandleChange, CandleStick, LiveTrade, NormalizedEvent, OrderBookUpdate,
    Timeframe, TradeBuffer,
};
use crate::error::FeedError;
use crate::ports::listener::{StreamEvent, StreamListener};

// ── Candles ─────────────────────────────────────────────

struct CandleFeed {
    label: String,
    buffer: Mutex<CandleBuffer>,
    tx: watch::Sender<Vec<CandleStick>>,
}

impl StreamListener for CandleFeed {
    fn on_event(&self, event: &StreamEvent) {
        let NormalizedEvent::Candle(candle) = &event.event else {
            return;
        };
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        match buffer.apply(*candle) {
            CandleChange::Stale => debug!(view = %self.label, time = candle.time, "Stale candle ignored"),
            CandleChange::Replaced | CandleChange::Appended => {
                self.tx.send_replace(buffer.to_vec());
            }
        }
    }

    fn on_connection_error(&self, message: &str) {
        warn!(view = %self.label, error = %message, "Candle stream interrupted, reconnecting");
    }
}

/// Candle series kept current from the kline stream.
#[derive(Debug)]
pub struct LiveCandles {
    subscription: Subscription,
    rx: watch::Receiver<Vec<CandleStick>>,
}

impl LiveCandles {
    /// Backfill `backfill` candles over REST, then follow the kline stream.
    ///
    /// # Errors
    /// Configuration errors, and transport errors from the backfill.
    pub async fn open(
        rest: &RestDataService,
        mux: &StreamMultiplexer,
        exchange: &str,
        symbol: &str,
        timeframe: Timeframe,
        backfill: usize,
        capacity: usize,
    ) -> Result<Self, FeedError> {
        let history = rest
            .fetch_recent_candles(exchange, symbol, timeframe.as_str(), backfill)
            .await?;
        let buffer = CandleBuffer::with_history(capacity, history);
        let (tx, rx) = watch::channel(buffer.to_vec());

        let feed = Arc::new(CandleFeed {
            label: format!("{exchange}:{symbol}:{timeframe}"),
            buffer: Mutex::new(buffer),
            tx,
        });
        let subscription = mux.subscribe(SubscribeOptions::kline(exchange, symbol, timeframe), feed)?;

        Ok(Self { subscription, rx })
    }

    /// Current series, oldest first.
    pub fn candles(&self) -> Vec<CandleStick> {
        self.rx.borrow().clone()
    }

    pub fn last(&self) -> Option<CandleStick> {
        self.rx.borrow().last().copied()
    }

    /// Follow snapshot updates.
    pub fn watch(&self) -> watch::Receiver<Vec<CandleStick>> {
        self.rx.clone()
    }

    pub fn close(mut self) {
        self.subscription.unsubscribe();
    }
}

// ── Trades ──────────────────────────────────────────────

struct TradeFeed {
    label: String,
    buffer: Mutex<TradeBuffer>,
    tx: watch::Sender<Vec<LiveTrade>>,
}

impl StreamListener for TradeFeed {
    fn on_event(&self, event: &StreamEvent) {
        let NormalizedEvent::Trade(trade) = &event.event else {
            return;
        };
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.push(trade.clone());
        self.tx.send_replace(buffer.to_vec());
    }

    fn on_connection_error(&self, message: &str) {
        warn!(view = %self.label, error = %message, "Trade stream interrupted, reconnecting");
    }
}

/// Most recent trade prints, newest first.
#[derive(Debug)]
pub struct TradeTape {
    subscription: Subscription,
    rx: watch::Receiver<Vec<LiveTrade>>,
}

impl TradeTape {
    pub fn open(
        mux: &StreamMultiplexer,
        exchange: &str,
        symbol: &str,
        capacity: usize,
    ) -> Result<Self, FeedError> {
        let (tx, rx) = watch::channel(Vec::new());
        let feed = Arc::new(TradeFeed {
            label: format!("{exchange}:{symbol}:trade"),
            buffer: Mutex::new(TradeBuffer::new(capacity)),
            tx,
        });
        let subscription = mux.subscribe(SubscribeOptions::trades(exchange, symbol), feed)?;
        Ok(Self { subscription, rx })
    }

    pub fn trades(&self) -> Vec<LiveTrade> {
        self.rx.borrow().clone()
    }

    pub fn latest(&self) -> Option<LiveTrade> {
        self.rx.borrow().first().cloned()
    }

    pub fn watch(&self) -> watch::Receiver<Vec<LiveTrade>> {
        self.rx.clone()
    }

    pub fn close(mut self) {
        self.subscription.unsubscribe();
    }
}

// ── Depth ───────────────────────────────────────────────

struct DepthFeed {
    label: String,
    tx: watch::Sender<Option<OrderBookUpdate>>,
}

impl StreamListener for DepthFeed {
    fn on_event(&self, event: &StreamEvent) {
        if let NormalizedEvent::OrderBook(book) = &event.event {
            self.tx.send_replace(Some(book.clone()));
        }
    }

    fn on_connection_error(&self, message: &str) {
        warn!(view = %self.label, error = %message, "Depth stream interrupted, reconnecting");
    }
}

/// Latest visible order-book window.
#[derive(Debug)]
pub struct DepthView {
    subscription: Subscription,
    rx: watch::Receiver<Option<OrderBookUpdate>>,
}

impl DepthView {
    pub fn open(mux: &StreamMultiplexer, exchange: &str, symbol: &str) -> Result<Self, FeedError> {
        let (tx, rx) = watch::channel(None);
        let feed = Arc::new(DepthFeed {
            label: format!("{exchange}:{symbol}:depth"),
            tx,
        });
        let subscription = mux.subscribe(SubscribeOptions::depth(exchange, symbol), feed)?;
        Ok(Self { subscription, rx })
    }

    pub fn book(&self) -> Option<OrderBookUpdate> {
        self.rx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Option<OrderBookUpdate>> {
        self.rx.clone()
    }

    pub fn close(mut self) {
        self.subscription.unsubscribe();
    }
}
