//! Exchange Registry - Name to Capability Bundle Lookup
//!
//! The single seam through which exchanges are added. Each entry bundles
//! an exchange's wire adapter with its REST capabilities. The table is
//! built once at startup and shared behind an `Arc`; after that it is
//! read-only. Unknown names fail fast, so callers never get a partially
//! working stand-in.

pub mod binance;
pub mod bybit;
pub mod parse;

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use crate::adapters::rest::HttpSettings;
use crate::error::FeedError;
use crate::ports::market_data::MarketDataRest;
use crate::ports::wire::WireAdapter;

/// Everything one exchange can do.
#[derive(Clone)]
pub struct ExchangeCapabilities {
    pub wire: Arc<dyn WireAdapter>,
    pub rest: Arc<dyn MarketDataRest>,
}

impl std::fmt::Debug for ExchangeCapabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeCapabilities")
            .field("exchange", &self.wire.exchange())
            .finish_non_exhaustive()
    }
}

/// Optional per-exchange endpoint overrides (testnets, proxies).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EndpointOverride {
    #[serde(default)]
    pub rest_url: Option<String>,
    #[serde(default)]
    pub ws_url: Option<String>,
}

/// Lookup table from lowercase exchange name to capabilities.
#[derive(Debug, Default)]
pub struct ExchangeRegistry {
    entries: HashMap<String, ExchangeCapabilities>,
}

impl ExchangeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in exchange (Binance, Bybit).
    ///
    /// `overrides` is keyed by exchange name; missing entries use the
    /// public production endpoints.
    pub fn with_defaults(
        http: &HttpSettings,
        overrides: &HashMap<String, EndpointOverride>,
    ) -> Result<Self, FeedError> {
        let none = EndpointOverride::default();
        let endpoints = |name: &str| overrides.get(name).unwrap_or(&none);

        let mut registry = Self::new();
        registry.register("binance", binance::capabilities(endpoints("binance"), http)?)?;
        registry.register("bybit", bybit::capabilities(endpoints("bybit"), http)?)?;

        info!(exchanges = ?registry.names(), "Exchange registry built");
        Ok(registry)
    }

    /// Add an exchange.
    ///
    /// # Errors
    /// `DuplicateExchange` if the (case-insensitive) name is taken.
    pub fn register(
        &mut self,
        name: &str,
        capabilities: ExchangeCapabilities,
    ) -> Result<(), FeedError> {
        let key = name.to_ascii_lowercase();
        if self.entries.contains_key(&key) {
            return Err(FeedError::DuplicateExchange(key));
        }
        self.entries.insert(key, capabilities);
        Ok(())
    }

    /// Find an exchange by name.
    ///
    /// # Errors
    /// `UnsupportedExchange` for unknown names.
    pub fn lookup(&self, name: &str) -> Result<&ExchangeCapabilities, FeedError> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| FeedError::UnsupportedExchange(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> ExchangeRegistry {
        ExchangeRegistry::with_defaults(&HttpSettings::default(), &HashMap::new()).unwrap()
    }

    #[test]
    fn test_defaults_register_binance_and_bybit() {
        assert_eq!(defaults().names(), vec!["binance", "bybit"]);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = defaults();
        assert_eq!(registry.lookup("ByBit").unwrap().wire.exchange(), "bybit");
    }

    #[test]
    fn test_unknown_exchange_fails_fast() {
        let err = defaults().lookup("not-a-real-exchange").unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(err.to_string(), "exchange not supported: not-a-real-exchange");
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = defaults();
        let bundle = registry.lookup("binance").unwrap().clone();
        let err = registry.register("BINANCE", bundle).unwrap_err();
        assert!(matches!(err, FeedError::DuplicateExchange(name) if name == "binance"));
    }

    #[test]
    fn test_ws_override_is_applied() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "bybit".to_string(),
            EndpointOverride {
                rest_url: None,
                ws_url: Some("wss://stream-testnet.bybit.com/v5/public/spot".into()),
            },
        );
        let registry = ExchangeRegistry::with_defaults(&HttpSettings::default(), &overrides).unwrap();
        let url = registry
            .lookup("bybit")
            .unwrap()
            .wire
            .connection_url(&crate::domain::StreamRequest::trades("BTCUSDT"))
            .unwrap();
        assert_eq!(url, "wss://stream-testnet.bybit.com/v5/public/spot");
    }
}
