//! Exchange Feeds - Service Entry Point
//!
//! Keeps the configured watch-list of live market views open, exports
//! stream telemetry, and follows config changes. Runs until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Build the exchange registry (Binance, Bybit + endpoint overrides)
//! 4. Create Prometheus metrics (session observer) and health state
//! 5. Create the WebSocket connector and stream multiplexer
//! 6. Spawn metrics server and health server (/live + /ready)
//! 7. Spawn config watcher (60s hot reload)
//! 8. Open the watch-list, reconcile on every config change
//! 9. Wait for SIGINT -> close all sessions with 1000 -> exit

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::{broadcast, watch};
use tracing::{error, info};

use exchange_feeds::adapters::exchanges::ExchangeRegistry;
use exchange_feeds::adapters::metrics::{FeedMetrics, HealthServer, HealthState};
use exchange_feeds::adapters::transport::TungsteniteConnector;
use exchange_feeds::config::AppConfig;
use exchange_feeds::config::hot_reload::ConfigWatcher;
use exchange_feeds::config::loader::load_config;
use exchange_feeds::ports::observer::SessionObserver;
use exchange_feeds::usecases::{RestDataService, StreamMultiplexer, Watchlist};

/// Cadence of the watch-list status log.
const STATUS_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = load_config(&config_path).context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.service.log_level)),
        )
        .json()
        .init();

    info!(
        name = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        streams = config.streams.len(),
        "Starting exchange feeds"
    );

    // ── 3. Exchange registry ────────────────────────────────
    let registry = Arc::new(
        ExchangeRegistry::with_defaults(&config.http_settings(), &config.exchanges)
            .context("Failed to build exchange registry")?,
    );

    // ── 4. Metrics + health state ───────────────────────────
    let metrics = Arc::new(FeedMetrics::new().context("Failed to register metrics")?);
    let health = Arc::new(HealthState::new(Arc::clone(&metrics)));

    // ── 5. Connector + multiplexer ──────────────────────────
    let connector = Arc::new(TungsteniteConnector::new(config.connect_timeout()));
    let mux = StreamMultiplexer::with_observer(
        Arc::clone(&registry),
        connector,
        config.session_settings(),
        Arc::clone(&metrics) as Arc<dyn SessionObserver>,
    );
    let rest = RestDataService::new(Arc::clone(&registry));

    // ── 6. Metrics + health servers ─────────────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);

    let metrics_handle = if config.metrics.enabled {
        let server = Arc::clone(&metrics);
        let bind = config.metrics.bind_address.clone();
        let rx = shutdown_tx.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = server.serve(bind, rx).await {
                error!(error = %e, "Metrics server failed");
            }
        }))
    } else {
        None
    };

    let health_server = HealthServer::new(Arc::clone(&health), config.metrics.health_port);
    let health_rx = shutdown_tx.subscribe();
    let health_handle = tokio::spawn(async move {
        if let Err(e) = health_server.run(health_rx).await {
            error!(error = %e, "Health server failed");
        }
    });

    // ── 7. Config watcher ───────────────────────────────────
    let (mut watcher, config_rx) = ConfigWatcher::new(&config_path, config.clone());
    let watcher_rx = shutdown_tx.subscribe();
    let watcher_handle = tokio::spawn(async move {
        if let Err(e) = watcher.run(watcher_rx).await {
            error!(error = %e, "Config watcher failed");
        }
    });

    // ── 8. Watch-list ───────────────────────────────────────
    let watchlist = Watchlist::new(rest, mux.clone(), config.buffers.clone());
    let run_rx = shutdown_tx.subscribe();
    let run_health = Arc::clone(&health);
    let watchlist_handle = tokio::spawn(async move {
        run_watchlist(watchlist, config_rx, run_health, run_rx).await;
    });

    info!("All tasks spawned - service is running");

    // ── 9. Wait for SIGINT ──────────────────────────────────
    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");

    health.accepting.store(false, Ordering::Relaxed);
    let _ = shutdown_tx.send(());

    let _ = tokio::time::timeout(Duration::from_secs(5), watchlist_handle).await;
    mux.shutdown().await;

    let _ = watcher_handle.await;
    let _ = health_handle.await;
    if let Some(handle) = metrics_handle {
        let _ = handle.await;
    }

    info!("Shutdown complete");
    Ok(())
}

/// Keep the watch-list in line with the live config until shutdown.
async fn run_watchlist(
    mut watchlist: Watchlist,
    mut config_rx: watch::Receiver<AppConfig>,
    health: Arc<HealthState>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut status = tokio::time::interval(STATUS_INTERVAL);

    loop {
        let config = config_rx.borrow_and_update().clone();
        watchlist.reconcile(&config.streams, &config.buffers).await;
        health.expected_streams.store(watchlist.len(), Ordering::Relaxed);
        info!(views = watchlist.len(), "Watch-list reconciled");

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    watchlist.clear();
                    return;
                }
                changed = config_rx.changed() => {
                    if changed.is_err() {
                        // Watcher gone; keep the current watch-list.
                        let _ = shutdown_rx.recv().await;
                        watchlist.clear();
                        return;
                    }
                    break;
                }
                _ = status.tick() => {
                    for (key, view) in watchlist.views() {
                        info!(stream = %key, state = %view.summary(), "View status");
                    }
                }
            }
        }
    }
}
