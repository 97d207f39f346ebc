//! REST Data Service - Exchange-Agnostic Request/Response Queries
//!
//! Symbol listing, candle backfill and last price. Every call resolves
//! the exchange and parses the timeframe token before any HTTP request,
//! so configuration mistakes never cost a round trip. Failures from the
//! exchange are returned as-is; retry policy belongs to the caller.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::adapters::exchanges::ExchangeRegistry;
use crate::domain::{CandleStick, Timeframe, unix_millis};
use crate::error::FeedError;
use crate::ports::market_data::MarketDataRest;

/// Request/response market data across every registered exchange.
#[derive(Debug, Clone)]
pub struct RestDataService {
    registry: Arc<ExchangeRegistry>,
}

impl RestDataService {
    pub fn new(registry: Arc<ExchangeRegistry>) -> Self {
        Self { registry }
    }

    fn rest(&self, exchange: &str) -> Result<&dyn MarketDataRest, FeedError> {
        Ok(self.registry.lookup(exchange)?.rest.as_ref())
    }

    /// Tradable symbols on `exchange`.
    #[instrument(skip(self))]
    pub async fn get_symbols(&self, exchange: &str) -> Result<Vec<String>, FeedError> {
        let symbols = self.rest(exchange)?.symbols().await?;
        debug!(count = symbols.len(), "Symbols fetched");
        Ok(symbols)
    }

    /// The latest `limit` candles, oldest first.
    ///
    /// `limit` is clamped to the exchange's per-request cap.
    #[instrument(skip(self))]
    pub async fn fetch_recent_candles(
        &self,
        exchange: &str,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<CandleStick>, FeedError> {
        let rest = self.rest(exchange)?;
        let timeframe: Timeframe = timeframe.parse()?;
        require_symbol(symbol)?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let limit = limit.min(rest.max_candles_per_request());
        rest.recent_candles(symbol, timeframe, limit).await
    }

    /// Every candle with open time in `[start, end]` (Unix seconds).
    ///
    /// Ranges wider than one request are split into consecutive windows;
    /// the results are concatenated oldest first with duplicate times
    /// collapsed.
    #[instrument(skip(self))]
    pub async fn fetch_historical_candles(
        &self,
        exchange: &str,
        symbol: &str,
        timeframe: &str,
        start: i64,
        end: i64,
    ) -> Result<Vec<CandleStick>, FeedError> {
        let rest = self.rest(exchange)?;
        let timeframe: Timeframe = timeframe.parse()?;
        require_symbol(symbol)?;
        if start > end {
            return Err(FeedError::InvalidRequest(format!(
                "start {start} is after end {end}"
            )));
        }
        unix_millis(start)?;
        unix_millis(end)?;

        let per_request = i64::try_from(rest.max_candles_per_request().max(1)).unwrap_or(i64::MAX);
        let span = per_request.saturating_mul(timeframe.seconds());

        let mut candles: Vec<CandleStick> = Vec::new();
        let mut windows = 0usize;
        let mut window_start = start;

        while window_start <= end {
            let window_end = window_start.saturating_add(span - 1).min(end);
            let chunk = rest
                .candles_between(symbol, timeframe, window_start, window_end)
                .await?;
            merge_ordered(&mut candles, chunk);
            windows += 1;

            if window_end == i64::MAX {
                break;
            }
            window_start = window_end + 1;
        }

        debug!(windows, candles = candles.len(), "Historical range fetched");
        Ok(candles)
    }

    /// Last traded price for `symbol`.
    #[instrument(skip(self))]
    pub async fn fetch_live_price(&self, exchange: &str, symbol: &str) -> Result<f64, FeedError> {
        let rest = self.rest(exchange)?;
        require_symbol(symbol)?;
        rest.live_price(symbol).await
    }
}

fn require_symbol(symbol: &str) -> Result<(), FeedError> {
    if symbol.trim().is_empty() {
        return Err(FeedError::InvalidRequest("symbol must not be empty".into()));
    }
    Ok(())
}

/// Append `chunk` to `out`, keeping `out` strictly ascending by time.
/// A candle with the same time as the current tail replaces it.
fn merge_ordered(out: &mut Vec<CandleStick>, mut chunk: Vec<CandleStick>) {
    chunk.sort_by_key(|c| c.time);
    for candle in chunk {
        match out.last_mut() {
            Some(last) if last.time == candle.time => *last = candle,
            Some(last) if last.time > candle.time => {}
            _ => out.push(candle),
        }
    }
}

#[cfg(test)]
mod tests {
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

    #[test]
    fn test_merge_collapses_boundary_duplicates() {
        let mut out = vec![candle(60, 1.0), candle(120, 2.0)];
        merge_ordered(&mut out, vec![candle(180, 3.0), candle(120, 2.5)]);
        let times: Vec<i64> = out.iter().map(|c| c.time).collect();
        assert_eq!(times, vec![60, 120, 180]);
        assert_eq!(out[1].close, 2.5);
    }

    #[test]
    fn test_merge_ignores_out_of_order_stragglers() {
        let mut out = vec![candle(600, 1.0)];
        merge_ordered(&mut out, vec![candle(60, 9.0)]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_empty_symbol_is_rejected() {
        assert!(require_symbol(" ").unwrap_err().is_configuration());
        assert!(require_symbol("BTCUSDT").is_ok());
    }
}
