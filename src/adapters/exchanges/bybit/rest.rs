//! Bybit REST Adapter - v5 Spot Market Endpoints
//!
//! Bybit reports most failures inside an HTTP 200 envelope
//! (`retCode != 0`), so every response is unwrapped through
//! [`unwrap_envelope`] before its `result` is decoded.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::types::{ApiResponse, Instrument, ListResult, Ticker};
use super::wire::BybitWire;
use crate::adapters::exchanges::parse::{candle_from_row, parse_f64};
use crate::adapters::rest::{HttpSettings, RestClient};
use crate::domain::{CandleStick, Timeframe, unix_millis};
use crate::error::FeedError;
use crate::ports::market_data::MarketDataRest;
use crate::ports::wire::WireAdapter;

/// Public REST endpoint.
pub const BYBIT_REST_URL: &str = "https://api.bybit.com";

/// Maximum klines per request.
const KLINE_LIMIT: usize = 1000;

/// Product category for every request.
const CATEGORY: &str = "spot";

/// Bybit REST market-data client.
pub struct BybitRest {
    client: RestClient,
    wire: BybitWire,
}

impl BybitRest {
    pub fn new(base_url: &str, settings: &HttpSettings) -> Result<Self, FeedError> {
        Ok(Self {
            client: RestClient::new("bybit", base_url, settings, decode_api_error)?,
            wire: BybitWire::default(),
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, FeedError> {
        let envelope: ApiResponse = self.client.get_json(path, query).await?;
        unwrap_envelope(envelope)
    }

    async fn klines(&self, query: Vec<(&str, String)>) -> Result<Vec<CandleStick>, FeedError> {
        let result: ListResult<Vec<Value>> = self.get("/v5/market/kline", &query).await?;
        // Bybit lists newest first.
        let mut candles = result
            .list
            .iter()
            .map(|row| candle_from_row(row))
            .collect::<Result<Vec<_>, _>>()?;
        candles.sort_by_key(|c| c.time);
        Ok(candles)
    }
}

/// Check `retCode` and decode `result`.
fn unwrap_envelope<T: DeserializeOwned>(envelope: ApiResponse) -> Result<T, FeedError> {
    if envelope.ret_code != 0 {
        return Err(FeedError::Exchange {
            exchange: "bybit",
            code: envelope.ret_code,
            message: envelope.ret_msg,
        });
    }
    Ok(serde_json::from_value(envelope.result)?)
}

/// Non-2xx bodies use the same envelope.
fn decode_api_error(body: &str) -> Option<FeedError> {
    let envelope: ApiResponse = serde_json::from_str(body).ok()?;
    (envelope.ret_code != 0).then(|| FeedError::Exchange {
        exchange: "bybit",
        code: envelope.ret_code,
        message: envelope.ret_msg,
    })
}

#[async_trait]
impl MarketDataRest for BybitRest {
    fn max_candles_per_request(&self) -> usize {
        KLINE_LIMIT
    }

    async fn symbols(&self) -> Result<Vec<String>, FeedError> {
        let mut symbols = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query = vec![("category", CATEGORY.to_string())];
            if let Some(c) = cursor.take() {
                query.push(("cursor", c));
            }
            let page: ListResult<Instrument> =
                self.get("/v5/market/instruments-info", &query).await?;

            symbols.extend(
                page.list
                    .into_iter()
                    .filter(|i| i.status == "Trading")
                    .map(|i| i.symbol),
            );

            match page.next_page_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(symbols),
            }
        }
    }

    async fn recent_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<CandleStick>, FeedError> {
        let query = vec![
            ("category", CATEGORY.to_string()),
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
            ("category", CATEGORY.to_string()),
            ("symbol", symbol.to_ascii_uppercase()),
            ("interval", self.wire.interval_code(timeframe).to_string()),
            ("start", unix_millis(start)?.to_string()),
            ("end", unix_millis(end)?.to_string()),
            ("limit", KLINE_LIMIT.to_string()),
        ];
        self.klines(query).await
    }

    async fn live_price(&self, symbol: &str) -> Result<f64, FeedError> {
        let query = [
            ("category", CATEGORY.to_string()),
            ("symbol", symbol.to_ascii_uppercase()),
        ];
        let result: ListResult<Ticker> = self.get("/v5/market/tickers", &query).await?;
        let ticker = result.list.first().ok_or_else(|| FeedError::Exchange {
            exchange: "bybit",
            code: 0,
            message: format!("no ticker for {symbol}"),
        })?;
        parse_f64(&ticker.last_price, "lastPrice")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(body: &str) -> ApiResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_non_zero_ret_code_is_exchange_error() {
        let body = r#"{"retCode":10001,"retMsg":"Not supported symbols","result":{},"retExtInfo":{},"time":1672025203567}"#;
        let err = unwrap_envelope::<ListResult<Ticker>>(envelope(body)).unwrap_err();
        assert_eq!(err.to_string(), "bybit error 10001: Not supported symbols");
    }

    #[test]
    fn test_ticker_result_decodes() {
        let body = r#"{"retCode":0,"retMsg":"OK","result":{"category":"spot","list":[{"symbol":"BTCUSDT","lastPrice":"20533.13","bid1Price":"20533.12"}]}}"#;
        let result: ListResult<Ticker> = unwrap_envelope(envelope(body)).unwrap();
        assert_eq!(parse_f64(&result.list[0].last_price, "lastPrice").unwrap(), 20533.13);
    }

    #[test]
    fn test_kline_list_is_string_rows() {
        let body = r#"{"retCode":0,"retMsg":"OK","result":{"symbol":"BTCUSDT","category":"spot","list":[["1670608800000","17071","17073","17027","17055.5","268611","15.74462667"],["1670605200000","17071.5","17071.5","17061","17071","4177","0.24469757"]]}}"#;
        let result: ListResult<Vec<Value>> = unwrap_envelope(envelope(body)).unwrap();
        let first = candle_from_row(&result.list[0]).unwrap();
        assert_eq!(first.time, 1_670_608_800);
        assert_eq!(first.close, 17055.5);
    }

    #[test]
    fn test_http_error_body_decoder() {
        assert!(decode_api_error(r#"{"retCode":10006,"retMsg":"Too many visits!"}"#).is_some());
        assert!(decode_api_error(r#"{"retCode":0,"retMsg":"OK"}"#).is_none());
        assert!(decode_api_error("Forbidden").is_none());
    }
}
