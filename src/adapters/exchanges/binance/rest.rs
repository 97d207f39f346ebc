//! Binance REST Adapter - Spot Market Data Endpoints
//!
//! `/api/v3/exchangeInfo`, `/api/v3/klines` and `/api/v3/ticker/price`,
//! normalized to symbols, oldest-first candles and an `f64` price.

use async_trait::async_trait;
use serde_json::Value;

use super::types::{ApiError, ExchangeInfo, TickerPrice};
use super::wire::BinanceWire;
use crate::adapters::exchanges::parse::{candle_from_row, parse_f64};
use crate::adapters::rest::{HttpSettings, RestClient};
use crate::domain::{CandleStick, Timeframe, unix_millis};
use crate::error::FeedError;
use crate::ports::market_data::MarketDataRest;
use crate::ports::wire::WireAdapter;

/// Public spot REST endpoint.
pub const BINANCE_REST_URL: &str = "https://api.binance.com";

/// Maximum klines per request.
const KLINE_LIMIT: usize = 1000;

/// Binance REST market-data client.
pub struct BinanceRest {
    client: RestClient,
    /// Interval vocabulary lives on the wire adapter.
    wire: BinanceWire,
}

impl BinanceRest {
    pub fn new(base_url: &str, settings: &HttpSettings) -> Result<Self, FeedError> {
        Ok(Self {
            client: RestClient::new("binance", base_url, settings, decode_api_error)?,
            wire: BinanceWire::default(),
        })
    }

    async fn klines(&self, query: Vec<(&str, String)>) -> Result<Vec<CandleStick>, FeedError> {
        let rows: Vec<Vec<Value>> = self.client.get_json("/api/v3/klines", &query).await?;
        rows.iter().map(|row| candle_from_row(row)).collect()
    }
}

/// Binance error bodies: `{"code": -1121, "msg": "Invalid symbol."}`.
fn decode_api_error(body: &str) -> Option<FeedError> {
    serde_json::from_str::<ApiError>(body)
        .ok()
        .map(|e| FeedError::Exchange {
            exchange: "binance",
            code: e.code,
            message: e.msg,
        })
}

#[async_trait]
impl MarketDataRest for BinanceRest {
    fn max_candles_per_request(&self) -> usize {
        KLINE_LIMIT
    }

    async fn symbols(&self) -> Result<Vec<String>, FeedError> {
        let info: ExchangeInfo = self.client.get_json("/api/v3/exchangeInfo", &[]).await?;
        Ok(info
            .symbols
            .into_iter()
            .filter(|s| s.status == "TRADING")
            .map(|s| s.symbol)
            .collect())
    }

    async fn recent_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<CandleStick>, FeedError> {
        let query = vec![
            ("symbol", symbol.to_ascii_uppercase()),
            ("interval", self.wire.interval_code(timeframe).to_string()),
            ("limit", limit.clamp(1, KLINE_LIMIT).to_string()),
        ];
        self.klines(query).await
    }

    async fn candles_between(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: i64,
        end: i64,
    ) -> Result<Vec<CandleStick>, FeedError> {
        let query = vec![
            ("symbol", symbol.to_ascii_uppercase()),
            ("interval", self.wire.interval_code(timeframe).to_string()),
            ("startTime", unix_millis(start)?.to_string()),
            ("endTime", unix_millis(end)?.to_string()),
            ("limit", KLINE_LIMIT.to_string()),
        ];
        self.klines(query).await
    }

    async fn live_price(&self, symbol: &str) -> Result<f64, FeedError> {
        let ticker: TickerPrice = self
            .client
            .get_json(
                "/api/v3/ticker/price",
                &[("symbol", symbol.to_ascii_uppercase())],
            )
            .await?;
        parse_f64(&ticker.price, "price")
    }
}
