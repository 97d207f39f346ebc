//! Bybit v5 spot market data: public WebSocket channel and REST endpoints.

pub mod rest;
mod types;
pub mod wire;

use std::sync::Arc;

pub use rest::{BYBIT_REST_URL, BybitRest};
pub use wire::{BYBIT_PING_INTERVAL, BYBIT_WS_URL, BybitWire};

use super::{EndpointOverride, ExchangeCapabilities};
use crate::adapters::rest::HttpSettings;
use crate::error::FeedError;

/// Build the Bybit capability bundle.
pub fn capabilities(
    endpoints: &EndpointOverride,
    http: &HttpSettings,
) -> Result<ExchangeCapabilities, FeedError> {
    let rest_url = endpoints.rest_url.as_deref().unwrap_or(BYBIT_REST_URL);
    let ws_url = endpoints.ws_url.as_deref().unwrap_or(BYBIT_WS_URL);
    Ok(ExchangeCapabilities {
        wire: Arc::new(BybitWire::new(ws_url)),
        rest: Arc::new(BybitRest::new(rest_url, http)?),
    })
}
