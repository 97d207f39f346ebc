//! Session Observer Port - Lifecycle Telemetry Hooks
//!
//! Stream sessions report lifecycle transitions and per-frame outcomes
//! here. The service binary plugs in the Prometheus registry; library
//! users who don't care get `NoopObserver`.

use std::fmt;

use crate::domain::StreamKey;

/// Stream session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Connecting,
    Subscribed,
    ReconnectPending,
    Closing,
}

impl SessionState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Subscribed => "subscribed",
            Self::ReconnectPending => "reconnect_pending",
            Self::Closing => "closing",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Telemetry sink for stream sessions. All hooks default to no-ops.
pub trait SessionObserver: Send + Sync + 'static {
    fn state_changed(&self, _key: &StreamKey, _state: SessionState) {}

    fn frame_received(&self, _key: &StreamKey) {}

    fn stale_frame_dropped(&self, _key: &StreamKey) {}

    fn decode_failed(&self, _key: &StreamKey) {}

    fn events_delivered(&self, _key: &StreamKey, _count: usize) {}

    fn reconnect_scheduled(&self, _key: &StreamKey, _generation: u64) {}
}

/// Observer that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}
