//! Binance spot market data: raw WebSocket streams and REST endpoints.

pub mod rest;
mod types;
pub mod wire;

use std::sync::Arc;

pub use rest::{BINANCE_REST_URL, BinanceRest};
pub use wire::{BINANCE_WS_URL, BinanceWire};

use super::{EndpointOverride, ExchangeCapabilities};
use crate::adapters::rest::HttpSettings;
use crate::error::FeedError;

/// Build the Binance capability bundle.
pub fn capabilities(
    endpoints: &EndpointOverride,
    http: &HttpSettings,
) -> Result<ExchangeCapabilities, FeedError> {
    let rest_url = endpoints.rest_url.as_deref().unwrap_or(BINANCE_REST_URL);
    let ws_url = endpoints.ws_url.as_deref().unwrap_or(BINANCE_WS_URL);
    Ok(ExchangeCapabilities {
        wire: Arc::new(BinanceWire::new(ws_url)),
        rest: Arc::new(BinanceRest::new(rest_url, http)?),
    })
}
