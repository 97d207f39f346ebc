//! Normalized market-data types.
//!
//! Every exchange adapter reduces its wire frames to exactly these
//! shapes: candle updates, order-book windows and trade prints. Nothing
//! downstream of an adapter ever sees an exchange-native payload.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::timeframe::Timeframe;
use crate::error::FeedError;

/// One OHLC bucket. `time` is the bucket open in Unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandleStick {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl CandleStick {
    /// Bucket open as a UTC timestamp.
    pub fn open_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.time, 0)
    }
}

/// Unix seconds to the millisecond timestamps exchange REST APIs take.
///
/// # Errors
/// `InvalidRequest` when the value does not fit in milliseconds.
pub fn unix_millis(seconds: i64) -> Result<i64, FeedError> {
    seconds
        .checked_mul(1000)
        .ok_or_else(|| FeedError::InvalidRequest(format!("timestamp {seconds}s is out of range")))
}

/// A single (price, quantity) depth level.
pub type PriceLevel = (f64, f64);

/// Visible depth window. Replaces, never patches, the previous one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBookUpdate {
    /// Bid levels, best (highest) first.
    pub bids: Vec<PriceLevel>,
    /// Ask levels, best (lowest) first.
    pub asks: Vec<PriceLevel>,
}

impl OrderBookUpdate {
    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.first().copied()
    }

    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.first().copied()
    }

    /// Mid price if both sides are populated.
    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => Some((bid + ask) / 2.0),
            _ => None,
        }
    }
}

/// A single executed trade print.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveTrade {
    /// Exchange-assigned trade id (numeric on Binance, UUID-like on Bybit).
    pub id: String,
    pub price: Decimal,
    pub quantity: Decimal,
    /// Execution time in Unix milliseconds.
    pub time: i64,
    /// True when the resting (maker) side was the buyer, i.e. a sell hit the bid.
    pub is_buyer_maker: bool,
}

/// The three canonical event shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum NormalizedEvent {
    Candle(CandleStick),
    OrderBook(OrderBookUpdate),
    Trade(LiveTrade),
}

/// Which push channel a session carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    Kline,
    Depth,
    Trade,
}

impl StreamType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Kline => "kline",
            Self::Depth => "depth",
            Self::Trade => "trade",
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamType {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kline" => Ok(Self::Kline),
            "depth" => Ok(Self::Depth),
            "trade" => Ok(Self::Trade),
            other => Err(FeedError::InvalidRequest(format!("unknown stream type: {other}"))),
        }
    }
}

/// What a wire adapter needs to open one push channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamRequest {
    /// Exchange-native symbol, e.g. `BTCUSDT`.
    pub symbol: String,
    pub stream_type: StreamType,
    /// Required for `Kline`, ignored otherwise.
    pub timeframe: Option<Timeframe>,
}

impl StreamRequest {
    pub fn kline(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            stream_type: StreamType::Kline,
            timeframe: Some(timeframe),
        }
    }

    pub fn depth(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            stream_type: StreamType::Depth,
            timeframe: None,
        }
    }

    pub fn trades(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            stream_type: StreamType::Trade,
            timeframe: None,
        }
    }

    /// Timeframe of a kline request.
    ///
    /// # Errors
    /// `InvalidRequest` when a kline stream is requested without one.
    pub fn kline_timeframe(&self) -> Result<Timeframe, FeedError> {
        self.timeframe.ok_or_else(|| {
            FeedError::InvalidRequest(format!(
                "kline stream for {} requires a timeframe",
                self.symbol
            ))
        })
    }
}

/// Identity of a shared stream session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamKey {
    /// Lowercase exchange name.
    pub exchange: String,
    /// Uppercase symbol; both venues treat symbols case-insensitively.
    pub symbol: String,
    pub stream_type: StreamType,
    /// Only meaningful for klines; normalized to `None` otherwise.
    pub timeframe: Option<Timeframe>,
}

impl StreamKey {
    pub fn new(
        exchange: &str,
        symbol: &str,
        stream_type: StreamType,
        timeframe: Option<Timeframe>,
    ) -> Self {
        Self {
            exchange: exchange.to_ascii_lowercase(),
            symbol: symbol.to_ascii_uppercase(),
            stream_type,
            timeframe: match stream_type {
                StreamType::Kline => timeframe,
                StreamType::Depth | StreamType::Trade => None,
            },
        }
    }

    pub fn request(&self) -> StreamRequest {
        StreamRequest {
            symbol: self.symbol.clone(),
            stream_type: self.stream_type,
            timeframe: self.timeframe,
        }
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.timeframe {
            Some(tf) => write!(f, "{}:{}:{}:{}", self.exchange, self.symbol, self.stream_type, tf),
            None => write!(f, "{}:{}:{}", self.exchange, self.symbol, self.stream_type),
        }
    }
}
