//! Configuration Module - TOML-based Service Configuration
//!
//! Loads and validates `config.toml`. Only the service binary reads
//! files; the library takes the plain settings structs derived here
//! (`SessionSettings`, `HttpSettings`).

pub mod hot_reload;
pub mod loader;

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::adapters::exchanges::EndpointOverride;
use crate::adapters::rest::HttpSettings;
use crate::domain::{StreamType, Timeframe};
use crate::usecases::multiplexer::SubscribeOptions;
use crate::usecases::stream_session::SessionSettings;

/// Top-level service configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AppConfig {
  /// Service identity.
  pub service: ServiceConfig,
  /// Stream session tunables.
  #[serde(default)]
  pub session: SessionConfig,
  /// Shared REST client tunables.
  #[serde(default)]
  pub rest: RestConfig,
  /// In-memory view sizes.
  #[serde(default)]
  pub buffers: BufferConfig,
  /// Per-exchange endpoint overrides, keyed by exchange name.
  #[serde(default)]
  pub exchanges: HashMap<String, EndpointOverride>,
  /// Metrics and health endpoints.
  #[serde(default)]
  pub metrics: MetricsConfig,
  /// Streams the service keeps open.
  #[serde(default)]
  pub streams: Vec<StreamConfig>,
}

impl AppConfig {
  pub fn session_settings(&self) -> SessionSettings {
    SessionSettings {
      reconnect_delay: Duration::from_millis(self.session.reconnect_delay_ms),
    }
  }

  pub fn connect_timeout(&self) -> Duration {
    Duration::from_millis(self.session.connect_timeout_ms)
  }

  pub fn http_settings(&self) -> HttpSettings {
    HttpSettings {
      timeout: Duration::from_millis(self.rest.timeout_ms),
      max_concurrent: self.rest.max_concurrent,
      requests_per_second: self.rest.requests_per_second,
    }
  }
}

/// Service identity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceConfig {
  /// Human-readable service name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
  /// Fixed wait before reconnecting a disrupted stream.
  #[serde(default = "default_reconnect_delay")]
  pub reconnect_delay_ms: u64,
  /// WebSocket handshake timeout.
  #[serde(default = "default_connect_timeout")]
  pub connect_timeout_ms: u64,
}

impl Default for SessionConfig {
  fn default() -> Self {
    Self {
      reconnect_delay_ms: default_reconnect_delay(),
      connect_timeout_ms: default_connect_timeout(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RestConfig {
  #[serde(default = "default_rest_timeout")]
  pub timeout_ms: u64,
  /// In-flight requests per exchange.
  #[serde(default = "default_max_concurrent")]
  pub max_concurrent: usize,
  /// Sustained request rate per exchange.
  #[serde(default = "default_requests_per_second")]
  pub requests_per_second: u32,
}

impl Default for RestConfig {
  fn default() -> Self {
    Self {
      timeout_ms: default_rest_timeout(),
      max_concurrent: default_max_concurrent(),
      requests_per_second: default_requests_per_second(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BufferConfig {
  /// Candles kept per live series.
  #[serde(default = "default_candle_capacity")]
  pub candle_capacity: usize,
  /// Trades kept per tape.
  #[serde(default = "default_trade_capacity")]
  pub trade_capacity: usize,
  /// Candles requested over REST before following a kline stream.
  #[serde(default = "default_backfill_limit")]
  pub backfill_limit: usize,
}

impl Default for BufferConfig {
  fn default() -> Self {
    Self {
      candle_capacity: default_candle_capacity(),
      trade_capacity: default_trade_capacity(),
      backfill_limit: default_backfill_limit(),
    }
  }
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MetricsConfig {
  /// Enable Prometheus metrics export.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Metrics server bind address.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
  /// Health check endpoint port.
  #[serde(default = "default_health_port")]
  pub health_port: u16,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      bind_address: default_metrics_addr(),
      health_port: default_health_port(),
    }
  }
}

/// One watch-list entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamConfig {
  pub exchange: String,
  pub symbol: String,
  pub stream: StreamType,
  /// Required for `kline`.
  #[serde(default)]
  pub timeframe: Option<Timeframe>,
  #[serde(default = "default_true")]
  pub enabled: bool,
}

impl StreamConfig {
  pub fn options(&self) -> SubscribeOptions {
    SubscribeOptions {
      exchange: self.exchange.clone(),
      symbol: self.symbol.clone(),
      stream_type: self.stream,
      timeframe: self.timeframe,
      enabled: self.enabled,
    }
  }
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_true() -> bool {
  true
}

fn default_reconnect_delay() -> u64 {
  5_000
}

fn default_connect_timeout() -> u64 {
  10_000
}

fn default_rest_timeout() -> u64 {
  10_000
}

fn default_max_concurrent() -> usize {
  8
}

fn default_requests_per_second() -> u32 {
  10
}

fn default_candle_capacity() -> usize {
  500
}

fn default_trade_capacity() -> usize {
  50
}

fn default_backfill_limit() -> usize {
  500
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}

fn default_health_port() -> u16 {
  8080
}
