//! Bybit Wire Adapter - v5 Public Spot Channel
//!
//! One URL for every stream; the subscription is a `{"op":"subscribe"}`
//! message sent on open. Bybit drops idle connections, so the client
//! sends `{"op":"ping"}` every 20 seconds. Data frames are
//! `{topic, data}` envelopes; acks and pongs carry `op`.

use std::time::Duration;

use serde_json::json;
use tracing::warn;

use super::types::{TopicKind, WsBook, WsEnvelope, WsKline, WsTrade};
use crate::adapters::exchanges::parse::{parse_decimal, parse_f64, parse_levels};
use crate::domain::{
    CandleStick, LiveTrade, NormalizedEvent, OrderBookUpdate, StreamRequest, StreamType, Timeframe,
};
use crate::error::FeedError;
use crate::ports::wire::{Decoded, Heartbeat, WireAdapter};

/// Public spot channel.
pub const BYBIT_WS_URL: &str = "wss://stream.bybit.com/v5/public/spot";

/// Client ping cadence.
pub const BYBIT_PING_INTERVAL: Duration = Duration::from_secs(20);

/// Order-book depth subscribed to.
const BOOK_DEPTH: u32 = 50;

/// Bybit push-protocol adapter.
#[derive(Debug, Clone)]
pub struct BybitWire {
    ws_url: String,
}

impl BybitWire {
    pub fn new(ws_url: &str) -> Self {
        Self {
            ws_url: ws_url.to_string(),
        }
    }

    /// Subscription topic, e.g. `kline.1.BTCUSDT`.
    pub fn topic(&self, request: &StreamRequest) -> Result<String, FeedError> {
        let symbol = request.symbol.to_ascii_uppercase();
        Ok(match request.stream_type {
            StreamType::Kline => {
                let interval = self.interval_code(request.kline_timeframe()?);
                format!("kline.{interval}.{symbol}")
            }
            StreamType::Depth => format!("orderbook.{BOOK_DEPTH}.{symbol}"),
            StreamType::Trade => format!("publicTrade.{symbol}"),
        })
    }

    fn decode_klines(data: serde_json::Value) -> Result<Decoded, FeedError> {
        let klines: Vec<WsKline> = serde_json::from_value(data)?;
        let mut events = klines
            .into_iter()
            .map(|k| {
                Ok(NormalizedEvent::Candle(CandleStick {
                    time: k.start / 1000,
                    open: parse_f64(&k.open, "open")?,
                    high: parse_f64(&k.high, "high")?,
                    low: parse_f64(&k.low, "low")?,
                    close: parse_f64(&k.close, "close")?,
                }))
            })
            .collect::<Result<Vec<_>, FeedError>>()?;

        Ok(match events.len() {
            0 => Decoded::Control,
            1 => Decoded::Event(events.remove(0)),
            _ => Decoded::Batch(events),
        })
    }

    fn decode_book(data: serde_json::Value) -> Result<Decoded, FeedError> {
        let book: WsBook = serde_json::from_value(data)?;
        Ok(Decoded::Event(NormalizedEvent::OrderBook(OrderBookUpdate {
            bids: parse_levels(&book.bids, "bids")?,
            asks: parse_levels(&book.asks, "asks")?,
        })))
    }

    fn decode_trades(data: serde_json::Value) -> Result<Decoded, FeedError> {
        let trades: Vec<WsTrade> = serde_json::from_value(data)?;
        let events = trades
            .into_iter()
            .map(|t| {
                Ok(NormalizedEvent::Trade(LiveTrade {
                    id: t.trade_id,
                    price: parse_decimal(&t.price, "price")?,
                    quantity: parse_decimal(&t.size, "size")?,
                    time: t.trade_time,
                    // Taker sold into the bid: the buyer was resting.
                    is_buyer_maker: t.side == "Sell",
                }))
            })
            .collect::<Result<Vec<_>, FeedError>>()?;
        Ok(Decoded::Batch(events))
    }
}

impl Default for BybitWire {
    fn default() -> Self {
        Self::new(BYBIT_WS_URL)
    }
}

impl WireAdapter for BybitWire {
    fn exchange(&self) -> &'static str {
        "bybit"
    }

    fn interval_code(&self, timeframe: Timeframe) -> &'static str {
        match timeframe {
            Timeframe::M1 => "1",
            Timeframe::M3 => "3",
            Timeframe::M5 => "5",
            Timeframe::M15 => "15",
            Timeframe::M30 => "30",
            Timeframe::H1 => "60",
            Timeframe::H2 => "120",
            Timeframe::H4 => "240",
            Timeframe::D1 => "D",
            Timeframe::W1 => "W",
        }
    }

    fn connection_url(&self, request: &StreamRequest) -> Result<String, FeedError> {
        self.topic(request)?;
        Ok(self.ws_url.clone())
    }

    fn subscribe_payload(&self, request: &StreamRequest) -> Result<Option<String>, FeedError> {
        let topic = self.topic(request)?;
        Ok(Some(json!({ "op": "subscribe", "args": [topic] }).to_string()))
    }

    fn heartbeat(&self) -> Option<Heartbeat> {
        Some(Heartbeat {
            payload: json!({ "op": "ping" }).to_string(),
            interval: BYBIT_PING_INTERVAL,
        })
    }

    fn parse_message(&self, raw: &str) -> Result<Decoded, FeedError> {
        let envelope: WsEnvelope = serde_json::from_str(raw)
            .map_err(|e| FeedError::Decode(format!("bybit frame: {e}")))?;

        if let Some(op) = envelope.op.as_deref() {
            if envelope.success == Some(false) {
                warn!(
                    op,
                    ret_msg = envelope.ret_msg.as_deref().unwrap_or_default(),
                    "Bybit rejected request"
                );
            }
            return Ok(Decoded::Control);
        }

        let topic = envelope
            .topic
            .as_deref()
            .ok_or_else(|| FeedError::Decode("bybit frame has neither op nor topic".into()))?;

        match TopicKind::of(topic) {
            Some(TopicKind::Kline) => Self::decode_klines(envelope.data),
            Some(TopicKind::OrderBook) => Self::decode_book(envelope.data),
            Some(TopicKind::PublicTrade) => Self::decode_trades(envelope.data),
            None => Err(FeedError::Decode(format!("unknown bybit topic: {topic}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    const KLINE_FRAME: &str = r#"{"topic":"kline.1.BTCUSDT","data":[{"start":1672324800000,"end":1672324859999,"interval":"1","open":"16649.5","close":"16677","high":"16677","low":"16608","volume":"2.081","turnover":"34666.4005","confirm":false,"timestamp":1672324855125}],"ts":1672324855125,"type":"snapshot"}"#;

    const BOOK_FRAME: &str = r#"{"topic":"orderbook.50.BTCUSDT","type":"snapshot","ts":1672304484978,"data":{"s":"BTCUSDT","b":[["16493.50","0.006"],["16493.00","0.100"]],"a":[["16611.00","0.029"],["16612.00","0.213"]],"u":18521288,"seq":7961638724}}"#;

    const TRADE_FRAME: &str = r#"{"topic":"publicTrade.BTCUSDT","type":"snapshot","ts":1672304486868,"data":[{"T":1672304486865,"s":"BTCUSDT","S":"Buy","v":"0.001","p":"16578.50","L":"PlusTick","i":"20f43950-d8dd-5b31-9112-a178eb6023af","BT":false},{"T":1672304486866,"s":"BTCUSDT","S":"Sell","v":"0.250","p":"16578.00","L":"MinusTick","i":"20f43950-d8dd-5b31-9112-a178eb6023b0","BT":false}]}"#;

    fn wire() -> BybitWire {
        BybitWire::default()
    }

    #[test]
    fn test_kline_subscribe_payload() {
        let payload = wire()
            .subscribe_payload(&StreamRequest::kline("BTCUSDT", Timeframe::M1))
            .unwrap()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value, json!({"op": "subscribe", "args": ["kline.1.BTCUSDT"]}));
    }

    #[test]
    fn test_topics_per_stream_type() {
        let w = wire();
        assert_eq!(w.topic(&StreamRequest::kline("btcusdt", Timeframe::D1)).unwrap(), "kline.D.BTCUSDT");
        assert_eq!(w.topic(&StreamRequest::depth("BTCUSDT")).unwrap(), "orderbook.50.BTCUSDT");
        assert_eq!(w.topic(&StreamRequest::trades("BTCUSDT")).unwrap(), "publicTrade.BTCUSDT");
    }

    #[test]
    fn test_heartbeat_is_ping_every_20s() {
        let hb = wire().heartbeat().unwrap();
        assert_eq!(hb.payload, r#"{"op":"ping"}"#);
        assert_eq!(hb.interval, Duration::from_secs(20));
    }

    #[test]
    fn test_kline_frame_time_is_start_in_seconds() {
        let decoded = wire().parse_message(KLINE_FRAME).unwrap();
        let Decoded::Event(NormalizedEvent::Candle(c)) = decoded else {
            panic!("expected a single candle, got {decoded:?}");
        };
        assert_eq!(c.time, 1_672_324_800);
        assert_eq!(c.open, 16649.5);
        assert_eq!(c.high, 16677.0);
        assert_eq!(c.low, 16608.0);
        assert_eq!(c.close, 16677.0);
    }

    #[test]
    fn test_book_frame_normalizes() {
        let Decoded::Event(NormalizedEvent::OrderBook(book)) = wire().parse_message(BOOK_FRAME).unwrap() else {
            panic!("expected order book");
        };
        assert_eq!(book.best_bid(), Some((16493.5, 0.006)));
        assert_eq!(book.best_ask(), Some((16611.0, 0.029)));
        assert_eq!(book.bids.len(), 2);
    }

    #[test]
    fn test_trade_frame_is_ordered_batch() {
        let Decoded::Batch(events) = wire().parse_message(TRADE_FRAME).unwrap() else {
            panic!("expected batch");
        };
        assert_eq!(events.len(), 2);
        let NormalizedEvent::Trade(first) = &events[0] else { panic!() };
        let NormalizedEvent::Trade(second) = &events[1] else { panic!() };
        assert_eq!(first.id, "20f43950-d8dd-5b31-9112-a178eb6023af");
        assert_eq!(first.price, dec!(16578.50));
        assert_eq!(first.quantity, dec!(0.001));
        assert_eq!(first.time, 1_672_304_486_865);
        assert!(!first.is_buyer_maker);
        assert!(second.is_buyer_maker);
    }

    #[test]
    fn test_control_frames_are_suppressed() {
        let w = wire();
        let ack = r#"{"success":true,"ret_msg":"subscribe","conn_id":"2324d924-aa4d-45b0-a858-7b8be29ab52b","req_id":"10001","op":"subscribe"}"#;
        let pong = r#"{"success":true,"ret_msg":"pong","conn_id":"0970e817-426e-429a-a679-ff7f55e0b16a","op":"ping"}"#;
        let spot_pong = r#"{"op":"pong","args":["1675418560633"],"conn_id":"cfcb4ocsvfriu23r3er0-1b"}"#;
        assert!(w.parse_message(ack).unwrap().is_control());
        assert!(w.parse_message(pong).unwrap().is_control());
        assert!(w.parse_message(spot_pong).unwrap().is_control());
    }

    #[test]
    fn test_rejected_subscription_is_still_control() {
        let nack = r#"{"success":false,"ret_msg":"error:handler not found","op":"subscribe"}"#;
        assert!(wire().parse_message(nack).unwrap().is_control());
    }

    #[test]
    fn test_malformed_frames_are_decode_errors() {
        let w = wire();
        assert!(w.parse_message("{").is_err());
        assert!(w.parse_message(r#"{"topic":"tickers.BTCUSDT","data":{}}"#).is_err());
        assert!(w.parse_message(r#"{"topic":"kline.1.BTCUSDT","data":{"start":1}}"#).is_err());
        assert!(w.parse_message(r#"{"ts":1}"#).is_err());
    }
}
