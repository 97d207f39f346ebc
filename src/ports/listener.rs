//! Stream Listener Port - Consumer Callbacks
//!
//! What UI-facing code implements to receive normalized events. A
//! listener never learns about sockets, reconnects or exchange quirks:
//! it gets events in wire order and an advisory message whenever the
//! underlying connection drops.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::domain::{NormalizedEvent, StreamKey};

/// A normalized event as delivered to listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    pub key: Arc<StreamKey>,
    /// Connection generation the frame arrived on.
    pub generation: u64,
    pub event: NormalizedEvent,
}

/// Receives events for one subscription.
///
/// Callbacks run on the session task and must not block.
pub trait StreamListener: Send + Sync + 'static {
    fn on_event(&self, event: &StreamEvent);

    /// Advisory: the connection dropped and a reconnect is scheduled.
    fn on_connection_error(&self, message: &str);
}

/// Channel form of the listener callbacks.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamNotification {
    Event(StreamEvent),
    ConnectionError(String),
}

/// Forwards callbacks into an unbounded channel.
///
/// Sends to a dropped receiver are ignored; the subscription handle
/// decides the listener's lifetime, not the channel.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<StreamNotification>,
}

impl ChannelListener {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StreamNotification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StreamListener for ChannelListener {
    fn on_event(&self, event: &StreamEvent) {
        let _ = self.tx.send(StreamNotification::Event(event.clone()));
    }

    fn on_connection_error(&self, message: &str) {
        let _ = self
            .tx
            .send(StreamNotification::ConnectionError(message.to_string()));
    }
}
