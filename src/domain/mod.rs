//! Domain layer - Normalized market-data model.
//!
//! Pure types shared by every adapter and use case: candles, depth
//! windows, trade prints, the canonical timeframe vocabulary and the
//! bounded buffers live views are built on. No I/O lives here.

pub mod buffers;
pub mod market;
pub mod timeframe;

pub use buffers::{CandleBuffer, CandleChange, TradeBuffer};
pub use market::{
    CandleStick, LiveTrade, NormalizedEvent, OrderBookUpdate, PriceLevel, StreamKey,
    StreamRequest, StreamType, unix_millis,
};
pub use timeframe::Timeframe;
