//! WebSocket transport adapters.

pub mod tungstenite;

pub use tungstenite::TungsteniteConnector;
