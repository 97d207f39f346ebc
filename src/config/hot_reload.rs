//! Config Hot-Reload - Re-read config.toml Every 60s
//!
//! Periodically re-reads config.toml and publishes a changed, valid
//! config on a `tokio::sync::watch` channel. The service reconciles its
//! open streams against the new watch-list without restarting.

use std::time::Duration;

use anyhow::Result;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, instrument, warn};

use super::AppConfig;

/// Poll cadence.
pub const RELOAD_INTERVAL: Duration = Duration::from_secs(60);

/// Watches config.toml for changes and broadcasts updates.
///
/// Polls rather than using a filesystem watcher, which behaves
/// differently across Linux, macOS and container volumes.
pub struct ConfigWatcher {
    /// Path to config.toml.
    config_path: String,
    /// Watch channel sender for config updates.
    config_tx: watch::Sender<AppConfig>,
    /// Hash of the last file contents seen.
    last_hash: Option<u64>,
    interval: Duration,
}

impl ConfigWatcher {
    /// Create a watcher and the receiver consumers follow.
    pub fn new(config_path: &str, initial_config: AppConfig) -> (Self, watch::Receiver<AppConfig>) {
        let (config_tx, config_rx) = watch::channel(initial_config);

        let watcher = Self {
            config_path: config_path.to_string(),
            config_tx,
            last_hash: None,
            interval: RELOAD_INTERVAL,
        };

        (watcher, config_rx)
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run until shutdown.
    #[instrument(skip(self, shutdown_rx), fields(path = %self.config_path))]
    pub async fn run(&mut self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!(interval_s = self.interval.as_secs(), "Config watcher started");

        self.last_hash = self.compute_hash().await;

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("Config watcher shutting down");
                    return Ok(());
                }
                () = tokio::time::sleep(self.interval) => {
                    self.check_and_reload().await;
                }
            }
        }
    }

    async fn check_and_reload(&mut self) {
        let new_hash = self.compute_hash().await;
        if new_hash == self.last_hash {
            debug!("Config unchanged");
            return;
        }

        info!("Config change detected, reloading");
        match super::loader::load_config(&self.config_path) {
            Ok(new_config) => {
                self.last_hash = new_hash;
                let changed = self.config_tx.send_if_modified(|current| {
                    if *current == new_config {
                        return false;
                    }
                    *current = new_config;
                    true
                });
                if changed {
                    info!("Config reloaded");
                } else {
                    debug!("Config file changed without semantic difference");
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to reload config, keeping current");
            }
        }
    }

    /// Hash of the file contents for change detection.
    async fn compute_hash(&self) -> Option<u64> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let content = tokio::fs::read_to_string(&self.config_path).await.ok()?;
        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        Some(hasher.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "[service]\nname = \"feeds\"\n";

    fn temp_config(contents: &str) -> String {
        let path = std::env::temp_dir().join(format!("feeds-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_changed_file_is_published() {
        let path = temp_config(BASE);
        let initial = super::super::loader::load_config(&path).unwrap();
        let (mut watcher, mut rx) = ConfigWatcher::new(&path, initial);
        watcher.last_hash = watcher.compute_hash().await;

        std::fs::write(
            &path,
            format!("{BASE}[[streams]]\nexchange = \"binance\"\nsymbol = \"BTCUSDT\"\nstream = \"trade\"\n"),
        )
        .unwrap();
        watcher.check_and_reload().await;

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().streams.len(), 1);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_invalid_file_keeps_current() {
        let path = temp_config(BASE);
        let initial = super::super::loader::load_config(&path).unwrap();
        let (mut watcher, rx) = ConfigWatcher::new(&path, initial);
        watcher.last_hash = watcher.compute_hash().await;

        std::fs::write(&path, "[service\n").unwrap();
        watcher.check_and_reload().await;

        assert!(!rx.has_changed().unwrap());
        let _ = std::fs::remove_file(&path);
    }
}
