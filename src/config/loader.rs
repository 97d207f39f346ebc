//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;
use crate::domain::StreamType;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    streams = config.streams.len(),
    reconnect_delay_ms = config.session.reconnect_delay_ms,
    candle_capacity = config.buffers.candle_capacity,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig = toml::from_str(content)
    .with_context(|| "Failed to parse config.toml")?;

  validate_config(&config)?;
  Ok(config)
}

/// Validate all configuration parameters.
fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(
    !config.service.name.trim().is_empty(),
    "service.name must not be empty"
  );

  // Session
  anyhow::ensure!(
    config.session.reconnect_delay_ms > 0,
    "session.reconnect_delay_ms must be positive"
  );
  anyhow::ensure!(
    config.session.connect_timeout_ms > 0,
    "session.connect_timeout_ms must be positive"
  );

  // REST
  anyhow::ensure!(
    config.rest.timeout_ms > 0,
    "rest.timeout_ms must be positive"
  );
  anyhow::ensure!(
    config.rest.max_concurrent > 0,
    "rest.max_concurrent must be positive"
  );
  anyhow::ensure!(
    config.rest.requests_per_second > 0,
    "rest.requests_per_second must be positive"
  );

  // Buffers
  anyhow::ensure!(
    config.buffers.candle_capacity > 0,
    "buffers.candle_capacity must be positive"
  );
  anyhow::ensure!(
    config.buffers.trade_capacity > 0,
    "buffers.trade_capacity must be positive"
  );

  // Endpoint overrides
  for (name, endpoints) in &config.exchanges {
    for url in [&endpoints.rest_url, &endpoints.ws_url].into_iter().flatten() {
      anyhow::ensure!(
        !url.trim().is_empty(),
        "exchanges.{} has an empty URL override",
        name
      );
    }
  }

  // Watch-list
  for (i, stream) in config.streams.iter().enumerate() {
    anyhow::ensure!(
      !stream.exchange.trim().is_empty(),
      "Stream {} has empty exchange",
      i
    );
    anyhow::ensure!(
      !stream.symbol.trim().is_empty(),
      "Stream {} ({}) has empty symbol",
      i,
      stream.exchange
    );
    anyhow::ensure!(
      stream.stream != StreamType::Kline || stream.timeframe.is_some(),
      "Stream {} ({} {}) is a kline stream without a timeframe",
      i,
      stream.exchange,
      stream.symbol
    );
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::Timeframe;

  const MINIMAL: &str = r#"
[service]
name = "feeds"
"#;

  #[test]
  fn test_load_nonexistent_file() {
    let result = load_config("nonexistent.toml");
    assert!(result.is_err());
  }

  #[test]
  fn test_minimal_config_takes_defaults() {
    let config = parse_config(MINIMAL).unwrap();
    assert_eq!(config.service.log_level, "info");
    assert_eq!(config.session.reconnect_delay_ms, 5_000);
    assert_eq!(config.buffers.candle_capacity, 500);
    assert_eq!(config.buffers.trade_capacity, 50);
    assert!(config.streams.is_empty());
    assert!(config.metrics.enabled);
  }

  #[test]
  fn test_full_watch_list_parses() {
    let text = r#"
[service]
name = "feeds"
log_level = "debug"

[session]
reconnect_delay_ms = 2500

[exchanges.bybit]
ws_url = "wss://stream-testnet.bybit.com/v5/public/spot"

[[streams]]
exchange = "bybit"
symbol = "BTCUSDT"
stream = "kline"
timeframe = "1m"

[[streams]]
exchange = "binance"
symbol = "ETHUSDT"
stream = "depth"
enabled = false
"#;
    let config = parse_config(text).unwrap();
    assert_eq!(config.session_settings().reconnect_delay.as_millis(), 2_500);
    assert_eq!(config.streams.len(), 2);
    assert_eq!(config.streams[0].timeframe, Some(Timeframe::M1));
    assert!(config.streams[0].options().key().is_some());
    assert!(config.streams[1].options().key().is_none());
    assert!(config.exchanges["bybit"].ws_url.is_some());
  }

  #[test]
  fn test_kline_without_timeframe_is_rejected() {
    let text = format!(
      "{MINIMAL}\n[[streams]]\nexchange = \"binance\"\nsymbol = \"BTCUSDT\"\nstream = \"kline\"\n"
    );
    let err = parse_config(&text).unwrap_err();
    assert!(err.to_string().contains("without a timeframe"));
  }

  #[test]
  fn test_unknown_timeframe_token_is_rejected() {
    let text = format!(
      "{MINIMAL}\n[[streams]]\nexchange = \"binance\"\nsymbol = \"BTCUSDT\"\nstream = \"kline\"\ntimeframe = \"7m\"\n"
    );
    assert!(parse_config(&text).is_err());
  }

  #[test]
  fn test_zero_reconnect_delay_is_rejected() {
    let text = format!("{MINIMAL}\n[session]\nreconnect_delay_ms = 0\n");
    assert!(parse_config(&text).is_err());
  }
}
