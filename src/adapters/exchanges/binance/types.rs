//! Binance wire and REST payloads.
//!
//! Push frames are modelled as a sum type: typed events discriminated by
//! their `e` field, partial-depth snapshots (which carry no `e`), and
//! request responses. Anything else fails to deserialize.

use serde::Deserialize;
use serde_json::Value;

/// Any frame on a raw Binance stream.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum WsFrame {
    Event(WsEvent),
    PartialDepth(WsPartialDepth),
    Response(WsResponse),
}

/// Event frames, tagged by `e`.
#[derive(Debug, Deserialize)]
#[serde(tag = "e")]
pub(super) enum WsEvent {
    #[serde(rename = "kline")]
    Kline { k: WsKline },
    #[serde(rename = "trade")]
    Trade(WsTrade),
    #[serde(rename = "depthUpdate")]
    DepthUpdate(WsDepthUpdate),
}

/// Kline payload (`k` object).
#[derive(Debug, Deserialize)]
pub(super) struct WsKline {
    /// Open time (Unix ms).
    #[serde(rename = "t")]
    pub open_time: i64,
    #[serde(rename = "o")]
    pub open: String,
    #[serde(rename = "h")]
    pub high: String,
    #[serde(rename = "l")]
    pub low: String,
    #[serde(rename = "c")]
    pub close: String,
}

/// Raw trade.
#[derive(Debug, Deserialize)]
pub(super) struct WsTrade {
    #[serde(rename = "t")]
    pub trade_id: u64,
    #[serde(rename = "p")]
    pub price: String,
    #[serde(rename = "q")]
    pub quantity: String,
    /// Trade time (Unix ms).
    #[serde(rename = "T")]
    pub trade_time: i64,
    #[serde(rename = "m")]
    pub buyer_is_maker: bool,
}

/// Diff-depth event.
#[derive(Debug, Deserialize)]
pub(super) struct WsDepthUpdate {
    #[serde(rename = "b")]
    pub bids: Vec<(String, String)>,
    #[serde(rename = "a")]
    pub asks: Vec<(String, String)>,
}

/// Partial book depth (`<symbol>@depth<levels>`).
#[derive(Debug, Deserialize)]
pub(super) struct WsPartialDepth {
    #[serde(rename = "lastUpdateId")]
    pub _last_update_id: u64,
    pub bids: Vec<(String, String)>,
    pub asks: Vec<(String, String)>,
}

/// Reply to a SUBSCRIBE/LIST request.
#[derive(Debug, Deserialize)]
pub(super) struct WsResponse {
    pub id: Value,
    #[serde(default)]
    pub result: Option<Value>,
}

// ── REST ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(super) struct ExchangeInfo {
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SymbolInfo {
    pub symbol: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct TickerPrice {
    pub price: String,
}

/// `{"code": -1121, "msg": "Invalid symbol."}`
#[derive(Debug, Deserialize)]
pub(super) struct ApiError {
    pub code: i64,
    pub msg: String,
}
