//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (HTTP, WebSockets, Prometheus).
//!
//! Adapter categories:
//! - `exchanges`: Binance and Bybit wire/REST adapters plus the registry
//! - `metrics`: Prometheus metrics export and health checks
//! - `rest`: Shared rate-limited JSON client
//! - `transport`: tokio-tungstenite WebSocket connector

pub mod exchanges;
pub mod metrics;
pub mod rest;
pub mod transport;
