//! Exchange Feeds - Library Root
//!
//! Normalized market data from Binance and Bybit: REST backfill, live
//! WebSocket streams with heartbeat and reconnect, and shared
//! subscriptions. Re-exports all modules for integration tests and
//! benchmarks.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
pub mod usecases;

pub use error::FeedError;
