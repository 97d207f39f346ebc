//! Feed Errors - Configuration, Transport and Stream Failures
//!
//! One error type for the whole library. Configuration errors are raised
//! before any network I/O; transport errors carry the exchange's own
//! message when the response body had one; stream errors are advisory
//! and are absorbed by the reconnecting session.

use thiserror::Error;

/// Errors raised by the exchange-feed core.
#[derive(Debug, Error)]
pub enum FeedError {
    // ── configuration ──────────────────────────────────────
    #[error("exchange not supported: {0}")]
    UnsupportedExchange(String),

    #[error("timeframe not supported: {0}")]
    UnsupportedTimeframe(String),

    #[error("exchange already registered: {0}")]
    DuplicateExchange(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // ── transport ──────────────────────────────────────────
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("{exchange} error {code}: {message}")]
    Exchange {
        exchange: &'static str,
        code: i64,
        message: String,
    },

    #[error("network error: {0}")]
    Network(String),

    // ── stream ─────────────────────────────────────────────
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("socket error: {0}")]
    Socket(String),

    // ── payloads ───────────────────────────────────────────
    #[error("decode error: {0}")]
    Decode(String),
}

impl FeedError {
    /// True for errors that no retry can fix.
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedExchange(_)
                | Self::UnsupportedTimeframe(_)
                | Self::DuplicateExchange(_)
                | Self::InvalidRequest(_)
        )
    }

    /// True for REST failures a caller may choose to retry.
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Http { .. } | Self::Exchange { .. } | Self::Network(_))
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for FeedError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Socket(e.to_string())
    }
}
