//! Binance Wire Adapter - Raw Stream Protocol
//!
//! Binance subscribes by URL (`/ws/<symbol>@<stream>`), answers protocol
//! pings itself and needs no client heartbeat. Klines arrive wrapped in
//! a `k` object, depth as 20-level partial snapshots and trades one per
//! frame.

use tracing::debug;

use super::types::{WsEvent, WsFrame};
use crate::adapters::exchanges::parse::{parse_decimal, parse_f64, parse_levels};
use crate::domain::{
    CandleStick, LiveTrade, NormalizedEvent, OrderBookUpdate, StreamRequest, StreamType, Timeframe,
};
use crate::error::FeedError;
use crate::ports::wire::{Decoded, Heartbeat, WireAdapter};

/// Public raw-stream endpoint.
pub const BINANCE_WS_URL: &str = "wss://stream.binance.com:9443/ws";

/// Binance push-protocol adapter.
#[derive(Debug, Clone)]
pub struct BinanceWire {
    ws_base: String,
}

impl BinanceWire {
    pub fn new(ws_base: &str) -> Self {
        Self {
            ws_base: ws_base.trim_end_matches('/').to_string(),
        }
    }

    /// Stream name, e.g. `btcusdt@kline_1m`.
    fn stream_name(&self, request: &StreamRequest) -> Result<String, FeedError> {
        let symbol = request.symbol.to_ascii_lowercase();
        Ok(match request.stream_type {
            StreamType::Kline => {
                let interval = self.interval_code(request.kline_timeframe()?);
                format!("{symbol}@kline_{interval}")
            }
            StreamType::Depth => format!("{symbol}@depth20@100ms"),
            StreamType::Trade => format!("{symbol}@trade"),
        })
    }
}

impl Default for BinanceWire {
    fn default() -> Self {
        Self::new(BINANCE_WS_URL)
    }
}

impl WireAdapter for BinanceWire {
    fn exchange(&self) -> &'static str {
        "binance"
    }

    fn interval_code(&self, timeframe: Timeframe) -> &'static str {
        match timeframe {
            Timeframe::M1 => "1m",
            Timeframe::M3 => "3m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H2 => "2h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
            Timeframe::W1 => "1w",
        }
    }

    fn connection_url(&self, request: &StreamRequest) -> Result<String, FeedError> {
        Ok(format!("{}/{}", self.ws_base, self.stream_name(request)?))
    }

    fn subscribe_payload(&self, request: &StreamRequest) -> Result<Option<String>, FeedError> {
        // Validate the request even though the URL carries the subscription.
        self.stream_name(request)?;
        Ok(None)
    }

    fn heartbeat(&self) -> Option<Heartbeat> {
        None
    }

    fn parse_message(&self, raw: &str) -> Result<Decoded, FeedError> {
        let frame: WsFrame = serde_json::from_str(raw)
            .map_err(|e| FeedError::Decode(format!("binance frame: {e}")))?;

        match frame {
            WsFrame::Event(WsEvent::Kline { k }) => {
                Ok(Decoded::Event(NormalizedEvent::Candle(CandleStick {
                    time: k.open_time / 1000,
                    open: parse_f64(&k.open, "open")?,
                    high: parse_f64(&k.high, "high")?,
                    low: parse_f64(&k.low, "low")?,
                    close: parse_f64(&k.close, "close")?,
                })))
            }
            WsFrame::Event(WsEvent::Trade(t)) => {
                Ok(Decoded::Batch(vec![NormalizedEvent::Trade(LiveTrade {
                    id: t.trade_id.to_string(),
                    price: parse_decimal(&t.price, "price")?,
                    quantity: parse_decimal(&t.quantity, "quantity")?,
                    time: t.trade_time,
                    is_buyer_maker: t.buyer_is_maker,
                })]))
            }
            WsFrame::Event(WsEvent::DepthUpdate(d)) => {
                Ok(Decoded::Event(NormalizedEvent::OrderBook(OrderBookUpdate {
                    bids: parse_levels(&d.bids, "bids")?,
                    asks: parse_levels(&d.asks, "asks")?,
                })))
            }
            WsFrame::PartialDepth(d) => {
                Ok(Decoded::Event(NormalizedEvent::OrderBook(OrderBookUpdate {
                    bids: parse_levels(&d.bids, "bids")?,
                    asks: parse_levels(&d.asks, "asks")?,
                })))
            }
            WsFrame::Response(resp) => {
                debug!(id = %resp.id, result = ?resp.result, "Binance request acknowledged");
                Ok(Decoded::Control)
            }
        }
    }
}
