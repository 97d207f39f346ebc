//! Transport Port - WebSocket Connection Interface
//!
//! Sessions speak to sockets only through these traits so the
//! reconnect/heartbeat state machine is independent of the WebSocket
//! library. A connection is split into a write half (`SocketSink`) and
//! a stream of inbound events that a reader task owns.

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::FeedError;

/// RFC 6455 normal closure.
pub const NORMAL_CLOSURE: u16 = 1000;

/// RFC 6455 "closed without a close frame"; never sent on the wire.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Inbound socket activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// A text (or UTF-8 binary) data frame.
    Text(String),
    /// The peer closed, or the stream ended (`ABNORMAL_CLOSURE`).
    Closed { code: u16, reason: String },
    /// Protocol or I/O failure. The socket is unusable afterwards.
    Error(String),
}

/// Write half of an open socket.
#[async_trait]
pub trait SocketSink: Send {
    async fn send_text(&mut self, text: String) -> Result<(), FeedError>;

    /// Send a close frame with `code` and flush.
    async fn close(&mut self, code: u16) -> Result<(), FeedError>;
}

/// A freshly opened socket.
pub struct SocketConnection {
    pub sink: Box<dyn SocketSink>,
    pub events: BoxStream<'static, SocketEvent>,
}

impl std::fmt::Debug for SocketConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketConnection").finish_non_exhaustive()
    }
}

/// Opens sockets.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<SocketConnection, FeedError>;
}
