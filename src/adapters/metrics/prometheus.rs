//! Prometheus Metrics Registry - Stream Observability
//!
//! Implements `SessionObserver` so stream sessions report into
//! Prometheus without the library core depending on the exporter.
//! Metrics follow the `exchange_feeds_*` naming convention and carry
//! `exchange` and `stream` labels.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

use crate::domain::StreamKey;
use crate::ports::observer::{SessionObserver, SessionState};

/// Centralized Prometheus metrics for stream sessions.
pub struct FeedMetrics {
    /// Prometheus registry.
    registry: Registry,
    /// Data frames received from sockets.
    pub frames_received: IntCounterVec,
    /// Normalized events handed to listeners.
    pub events_delivered: IntCounterVec,
    /// Frames dropped because their socket was superseded.
    pub stale_frames: IntCounterVec,
    /// Frames the adapter could not decode.
    pub parse_failures: IntCounterVec,
    /// Reconnect attempts.
    pub reconnects: IntCounterVec,
    /// Sessions per lifecycle state.
    pub sessions: IntGaugeVec,
    /// Last known state per live session.
    states: Mutex<HashMap<StreamKey, SessionState>>,
}

impl FeedMetrics {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();
        let labels = &["exchange", "stream"];

        let frames_received = IntCounterVec::new(
            Opts::new("exchange_feeds_frames_received_total", "Data frames received"),
            labels,
        )?;

        let events_delivered = IntCounterVec::new(
            Opts::new(
                "exchange_feeds_events_delivered_total",
                "Normalized events delivered to listeners",
            ),
            labels,
        )?;

        let stale_frames = IntCounterVec::new(
            Opts::new(
                "exchange_feeds_stale_frames_total",
                "Frames dropped from superseded connections",
            ),
            labels,
        )?;

        let parse_failures = IntCounterVec::new(
            Opts::new("exchange_feeds_parse_failures_total", "Frames that failed to decode"),
            labels,
        )?;

        let reconnects = IntCounterVec::new(
            Opts::new("exchange_feeds_reconnects_total", "Reconnect attempts"),
            labels,
        )?;

        let sessions = IntGaugeVec::new(
            Opts::new("exchange_feeds_sessions", "Stream sessions by lifecycle state"),
            &["state"],
        )?;

        registry.register(Box::new(frames_received.clone()))?;
        registry.register(Box::new(events_delivered.clone()))?;
        registry.register(Box::new(stale_frames.clone()))?;
        registry.register(Box::new(parse_failures.clone()))?;
        registry.register(Box::new(reconnects.clone()))?;
        registry.register(Box::new(sessions.clone()))?;

        Ok(Self {
            registry,
            frames_received,
            events_delivered,
            stale_frames,
            parse_failures,
            reconnects,
            sessions,
            states: Mutex::new(HashMap::new()),
        })
    }

    /// Sessions currently subscribed and streaming.
    pub fn subscribed_sessions(&self) -> usize {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|s| **s == SessionState::Subscribed)
            .count()
    }

    /// Render the registry in the text exposition format.
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    fn labels(key: &StreamKey) -> [&str; 2] {
        [key.exchange.as_str(), key.stream_type.as_str()]
    }

    /// Serve Prometheus metrics on the configured bind address.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn serve(
        self: Arc<Self>,
        bind_address: String,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let metrics = Arc::clone(&self);

        let app = Router::new().route(
            "/metrics",
            get(move || {
                let metrics = Arc::clone(&metrics);
                async move {
                    match metrics.render() {
                        Ok(body) => (StatusCode::OK, body),
                        Err(e) => {
                            warn!(error = %e, "Failed to encode metrics");
                            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
                        }
                    }
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind(&bind_address).await?;
        info!(address = %bind_address, "Prometheus metrics server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}

impl SessionObserver for FeedMetrics {
    fn state_changed(&self, key: &StreamKey, state: SessionState) {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = if state == SessionState::Idle {
            states.remove(key)
        } else {
            states.insert(key.clone(), state)
        };

        if let Some(previous) = previous {
            self.sessions.with_label_values(&[previous.as_str()]).dec();
        }
        if state != SessionState::Idle {
            self.sessions.with_label_values(&[state.as_str()]).inc();
        }
    }

    fn frame_received(&self, key: &StreamKey) {
        self.frames_received.with_label_values(&Self::labels(key)).inc();
    }

    fn stale_frame_dropped(&self, key: &StreamKey) {
        self.stale_frames.with_label_values(&Self::labels(key)).inc();
    }

    fn decode_failed(&self, key: &StreamKey) {
        self.parse_failures.with_label_values(&Self::labels(key)).inc();
    }

    fn events_delivered(&self, key: &StreamKey, count: usize) {
        self.events_delivered
            .with_label_values(&Self::labels(key))
            .inc_by(count as u64);
    }

    fn reconnect_scheduled(&self, key: &StreamKey, _generation: u64) {
        self.reconnects.with_label_values(&Self::labels(key)).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StreamType;

    fn key() -> StreamKey {
        StreamKey::new("bybit", "BTCUSDT", StreamType::Trade, None)
    }

    #[test]
    fn test_state_gauge_tracks_transitions() {
        let metrics = FeedMetrics::new().unwrap();
        let key = key();

        metrics.state_changed(&key, SessionState::Connecting);
        metrics.state_changed(&key, SessionState::Subscribed);
        assert_eq!(metrics.subscribed_sessions(), 1);
        assert_eq!(metrics.sessions.with_label_values(&["connecting"]).get(), 0);
        assert_eq!(metrics.sessions.with_label_values(&["subscribed"]).get(), 1);

        metrics.state_changed(&key, SessionState::Closing);
        metrics.state_changed(&key, SessionState::Idle);
        assert_eq!(metrics.subscribed_sessions(), 0);
        assert_eq!(metrics.sessions.with_label_values(&["closing"]).get(), 0);
    }

    #[test]
    fn test_counters_render() {
        let metrics = FeedMetrics::new().unwrap();
        metrics.frame_received(&key());
        metrics.events_delivered(&key(), 3);
        let body = metrics.render().unwrap();
        assert!(body.contains("exchange_feeds_frames_received_total"));
        assert!(body.contains(r#"exchange_feeds_events_delivered_total{exchange="bybit",stream="trade"} 3"#));
    }

    #[test]
    fn test_metrics_observe_multiplexer_sessions() {
        use std::time::Duration;

        use crate::adapters::exchanges::ExchangeRegistry;
        use crate::adapters::transport::TungsteniteConnector;
        use crate::usecases::{SessionSettings, StreamMultiplexer};

        let metrics = Arc::new(FeedMetrics::new().unwrap());
        let mux = StreamMultiplexer::with_observer(
            Arc::new(ExchangeRegistry::new()),
            Arc::new(TungsteniteConnector::new(Duration::from_secs(1))),
            SessionSettings::default(),
            Arc::clone(&metrics) as Arc<dyn SessionObserver>,
        );
        assert_eq!(mux.active_sessions(), 0);
        assert_eq!(Arc::strong_count(&metrics), 2);
    }
}
