//! Market Data REST Port - Backfill and Snapshot Interface
//!
//! Capability-uniform request/response surface every exchange exposes
//! for data that is not (or not yet) available on the push channel.
//! Implementations normalize exchange-native JSON before returning and
//! never retry on their own.

use async_trait::async_trait;

use crate::domain::{CandleStick, Timeframe};
use crate::error::FeedError;

/// REST capabilities of one exchange.
#[async_trait]
pub trait MarketDataRest: Send + Sync + 'static {
    /// Largest number of candles one kline request may return.
    fn max_candles_per_request(&self) -> usize;

    /// Tradable symbols, exchange-native spelling.
    async fn symbols(&self) -> Result<Vec<String>, FeedError>;

    /// The most recent `limit` candles, oldest first.
    async fn recent_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<CandleStick>, FeedError>;

    /// Candles whose open time lies in `[start, end]` (Unix seconds),
    /// oldest first. The window must fit in one request.
    async fn candles_between(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: i64,
        end: i64,
    ) -> Result<Vec<CandleStick>, FeedError>;

    /// Last traded price.
    async fn live_price(&self, symbol: &str) -> Result<f64, FeedError>;
}
