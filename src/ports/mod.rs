//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) between the session/multiplexer core
//! and the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `WireAdapter`: Per-exchange push protocol (URL, subscribe, heartbeat, decode)
//! - `MarketDataRest`: Per-exchange REST backfill and snapshots
//! - `Connector`: WebSocket transport
//! - `StreamListener`: Consumer callbacks
//! - `SessionObserver`: Lifecycle telemetry

pub mod listener;
pub mod market_data;
pub mod observer;
pub mod transport;
pub mod wire;

pub use listener::{ChannelListener, StreamEvent, StreamListener, StreamNotification};
pub use market_data::MarketDataRest;
pub use observer::{NoopObserver, SessionObserver, SessionState};
pub use transport::{
    ABNORMAL_CLOSURE, Connector, NORMAL_CLOSURE, SocketConnection, SocketEvent, SocketSink,
};
pub use wire::{Decoded, Heartbeat, WireAdapter, decode_frame};
