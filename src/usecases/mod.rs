//! Use Cases Layer - Application Logic
//!
//! Orchestrates adapters behind the port traits into the operations
//! consumers call.
//!
//! Use cases:
//! - `RestDataService`: symbols, candle backfill, last price
//! - `StreamSession`: one live connection with heartbeat and reconnect
//! - `StreamMultiplexer`: shared sessions and subscription handles
//! - `LiveCandles` / `TradeTape` / `DepthView`: live in-memory views
//! - `Watchlist`: config-driven set of live views

pub mod live_view;
pub mod multiplexer;
pub mod rest_service;
pub mod stream_session;
pub mod watchlist;

pub use live_view::{DepthView, LiveCandles, TradeTape};
pub use multiplexer::{StreamMultiplexer, SubscribeOptions, Subscription};
pub use rest_service::RestDataService;
pub use stream_session::{SessionHandle, SessionSettings, StreamSession};
pub use watchlist::{MarketView, Watchlist};
