//! Wire Adapter Port - Per-exchange Push Protocol
//!
//! One implementation per exchange. An adapter turns a stream request into
//! a URL, an optional subscribe payload and an optional heartbeat, and
//! decodes raw frames into normalized events. Adapters are pure: they
//! never touch a socket.

use std::time::Duration;

use tracing::debug;

use crate::domain::{NormalizedEvent, StreamRequest, Timeframe};
use crate::error::FeedError;

/// Client-initiated keepalive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heartbeat {
    /// Text frame sent on every tick.
    pub payload: String,
    /// Fixed cadence while the socket is open.
    pub interval: Duration,
}

/// Result of decoding one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Subscription ack, pong or other frame that carries no data.
    Control,
    /// A single candle or depth update.
    Event(NormalizedEvent),
    /// Several prints delivered in one frame, in wire order.
    Batch(Vec<NormalizedEvent>),
}

impl Decoded {
    pub const fn is_control(&self) -> bool {
        matches!(self, Self::Control)
    }

    /// Flatten into individual events, preserving order.
    pub fn into_events(self) -> Vec<NormalizedEvent> {
        match self {
            Self::Control => Vec::new(),
            Self::Event(event) => vec![event],
            Self::Batch(events) => events,
        }
    }
}

/// Exchange push-protocol adapter.
pub trait WireAdapter: Send + Sync + 'static {
    /// Lowercase exchange name.
    fn exchange(&self) -> &'static str;

    /// Exchange-native interval code for a canonical timeframe.
    fn interval_code(&self, timeframe: Timeframe) -> &'static str;

    /// WebSocket URL for the request.
    ///
    /// # Errors
    /// `InvalidRequest` if the request is incomplete (kline without timeframe).
    fn connection_url(&self, request: &StreamRequest) -> Result<String, FeedError>;

    /// Text frame to send right after the socket opens, if the exchange
    /// subscribes by message rather than by URL.
    ///
    /// # Errors
    /// `InvalidRequest` if the request is incomplete.
    fn subscribe_payload(&self, request: &StreamRequest) -> Result<Option<String>, FeedError>;

    /// Keepalive the client must send, if any.
    fn heartbeat(&self) -> Option<Heartbeat>;

    /// Decode one raw text frame.
    ///
    /// # Errors
    /// `Decode` for malformed or unrecognized frames. Callers go through
    /// [`decode_frame`], which never fails.
    fn parse_message(&self, raw: &str) -> Result<Decoded, FeedError>;
}

/// Decode a frame, downgrading any failure to "no event".
pub fn decode_frame(adapter: &dyn WireAdapter, raw: &str) -> Option<Decoded> {
    match adapter.parse_message(raw) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            debug!(
                exchange = adapter.exchange(),
                error = %e,
                len = raw.len(),
                "Dropping undecodable frame"
            );
            None
        }
    }
}
