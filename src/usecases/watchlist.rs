//! Watch-list - Config-driven Set of Live Views
//!
//! Keeps one live view open per enabled `[[streams]]` entry and
//! reconciles against each reloaded config: views whose entry vanished
//! or was disabled are closed, new entries are opened, unchanged ones
//! keep streaming untouched.

use std::collections::HashMap;

use tracing::{info, warn};

use super::live_view::{DepthView, LiveCandles, TradeTape};
use super::multiplexer::StreamMultiplexer;
use super::rest_service::RestDataService;
use crate::config::{BufferConfig, StreamConfig};
use crate::domain::{StreamKey, StreamType};
use crate::error::FeedError;

/// One open view.
#[derive(Debug)]
pub enum MarketView {
    Candles(LiveCandles),
    Trades(TradeTape),
    Depth(DepthView),
}

impl MarketView {
    fn close(self) {
        match self {
            Self::Candles(v) => v.close(),
            Self::Trades(v) => v.close(),
            Self::Depth(v) => v.close(),
        }
    }

    /// One-line state for periodic status logs.
    pub fn summary(&self) -> String {
        match self {
            Self::Candles(v) => match v.last() {
                Some(c) => format!("candles={} close={}", v.candles().len(), c.close),
                None => "candles=0".to_string(),
            },
            Self::Trades(v) => match v.latest() {
                Some(t) => format!("trades={} last={}", v.trades().len(), t.price),
                None => "trades=0".to_string(),
            },
            Self::Depth(v) => match v.book().and_then(|b| b.mid_price()) {
                Some(mid) => format!("mid={mid}"),
                None => "book=empty".to_string(),
            },
        }
    }
}

/// Open views keyed by stream identity.
pub struct Watchlist {
    rest: RestDataService,
    mux: StreamMultiplexer,
    buffers: BufferConfig,
    views: HashMap<StreamKey, MarketView>,
}

impl Watchlist {
    pub fn new(rest: RestDataService, mux: StreamMultiplexer, buffers: BufferConfig) -> Self {
        Self {
            rest,
            mux,
            buffers,
            views: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn views(&self) -> impl Iterator<Item = (&StreamKey, &MarketView)> {
        self.views.iter()
    }

    /// Bring the open views in line with `streams`.
    ///
    /// Entries that fail to open are logged and skipped; the rest of the
    /// watch-list still applies.
    pub async fn reconcile(&mut self, streams: &[StreamConfig], buffers: &BufferConfig) {
        // New capacities apply to views opened from here on.
        self.buffers = buffers.clone();

        let wanted: Vec<StreamKey> = streams.iter().filter_map(|s| s.options().key()).collect();

        let stale: Vec<StreamKey> = self
            .views
            .keys()
            .filter(|k| !wanted.contains(k))
            .cloned()
            .collect();
        for key in stale {
            if let Some(view) = self.views.remove(&key) {
                info!(stream = %key, "Closing view");
                view.close();
            }
        }

        for key in wanted {
            if self.views.contains_key(&key) {
                continue;
            }
            match self.open(&key).await {
                Ok(view) => {
                    info!(stream = %key, "View opened");
                    self.views.insert(key, view);
                }
                Err(e) => warn!(stream = %key, error = %e, "Failed to open view"),
            }
        }
    }

    async fn open(&self, key: &StreamKey) -> Result<MarketView, FeedError> {
        let exchange = key.exchange.as_str();
        let symbol = key.symbol.as_str();
        Ok(match key.stream_type {
            StreamType::Kline => {
                let timeframe = key.request().kline_timeframe()?;
                MarketView::Candles(
                    LiveCandles::open(
                        &self.rest,
                        &self.mux,
                        exchange,
                        symbol,
                        timeframe,
                        self.buffers.backfill_limit,
                        self.buffers.candle_capacity,
                    )
                    .await?,
                )
            }
            StreamType::Trade => {
                MarketView::Trades(TradeTape::open(&self.mux, exchange, symbol, self.buffers.trade_capacity)?)
            }
            StreamType::Depth => MarketView::Depth(DepthView::open(&self.mux, exchange, symbol)?),
        })
    }

    /// Close every view.
    pub fn clear(&mut self) {
        for (_, view) in self.views.drain() {
            view.close();
        }
    }
}
