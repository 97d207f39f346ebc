//! Bybit v5 wire and REST payloads.

use serde::Deserialize;
use serde_json::Value;

/// Outer envelope shared by every public-channel frame.
///
/// Control frames carry `op`; data frames carry `topic` + `data`.
#[derive(Debug, Deserialize)]
pub(super) struct WsEnvelope {
    #[serde(default)]
    pub op: Option<String>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub ret_msg: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub data: Value,
}

/// Data-frame discriminant, from the topic prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TopicKind {
    Kline,
    OrderBook,
    PublicTrade,
}

impl TopicKind {
    pub fn of(topic: &str) -> Option<Self> {
        match topic.split('.').next()? {
            "kline" => Some(Self::Kline),
            "orderbook" => Some(Self::OrderBook),
            "publicTrade" => Some(Self::PublicTrade),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct WsKline {
    /// Bucket open (Unix ms).
    pub start: i64,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct WsBook {
    #[serde(rename = "b", default)]
    pub bids: Vec<(String, String)>,
    #[serde(rename = "a", default)]
    pub asks: Vec<(String, String)>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WsTrade {
    #[serde(rename = "i")]
    pub trade_id: String,
    #[serde(rename = "p")]
    pub price: String,
    #[serde(rename = "v")]
    pub size: String,
    /// Trade time (Unix ms).
    #[serde(rename = "T")]
    pub trade_time: i64,
    /// Taker side, `Buy` or `Sell`.
    #[serde(rename = "S")]
    pub side: String,
}

// ── REST ──────────────────────────────────────────────────────

/// `{"retCode":0,"retMsg":"OK","result":{...}}`
#[derive(Debug, Deserialize)]
pub(super) struct ApiResponse {
    #[serde(rename = "retCode")]
    pub ret_code: i64,
    #[serde(rename = "retMsg", default)]
    pub ret_msg: String,
    /// `{}` on failure, so decoded only once `ret_code` is 0.
    #[serde(default)]
    pub result: Value,
}

#[derive(Debug, Deserialize)]
pub(super) struct ListResult<T> {
    pub list: Vec<T>,
    #[serde(rename = "nextPageCursor", default)]
    pub next_page_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Instrument {
    pub symbol: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct Ticker {
    #[serde(rename = "lastPrice")]
    pub last_price: String,
}
