//! tokio-tungstenite Connector - Production WebSocket Transport
//!
//! Opens rustls WebSockets and maps tungstenite messages onto the
//! transport port. Protocol pings are answered by tungstenite itself;
//! only text frames, closes and errors reach the session.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info};

use crate::error::FeedError;
use crate::ports::transport::{
    ABNORMAL_CLOSURE, Connector, SocketConnection, SocketEvent, SocketSink,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connector backed by `tokio_tungstenite::connect_async`.
#[derive(Debug, Clone)]
pub struct TungsteniteConnector {
    /// Handshake deadline.
    connect_timeout: Duration,
}

impl TungsteniteConnector {
    pub const fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TungsteniteConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<SocketConnection, FeedError> {
        let (ws_stream, _) = tokio::time::timeout(self.connect_timeout, connect_async(url))
            .await
            .map_err(|_| FeedError::Connect(format!("timed out connecting to {url}")))?
            .map_err(|e| FeedError::Connect(format!("{url}: {e}")))?;

        info!(%url, "WebSocket connected");

        let (write, read) = ws_stream.split();

        Ok(SocketConnection {
            sink: Box::new(TungsteniteSink { write }),
            events: inbound_events(read).boxed(),
        })
    }
}

/// Write half.
struct TungsteniteSink {
    write: SplitSink<WsStream, Message>,
}

#[async_trait]
impl SocketSink for TungsteniteSink {
    async fn send_text(&mut self, text: String) -> Result<(), FeedError> {
        self.write.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn close(&mut self, code: u16) -> Result<(), FeedError> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: "".into(),
        };
        self.write.send(Message::Close(Some(frame))).await?;
        self.write.flush().await?;
        Ok(())
    }
}

/// Map the read half onto `SocketEvent`s. The stream ends after the first
/// close or error.
fn inbound_events(
    read: SplitStream<WsStream>,
) -> impl futures_util::Stream<Item = SocketEvent> + Send + 'static {
    futures_util::stream::unfold(Some(read), |state| async move {
        let mut read = state?;
        loop {
            let event = match read.next().await {
                Some(Ok(Message::Text(text))) => SocketEvent::Text(text),
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => SocketEvent::Text(text),
                    Err(_) => {
                        debug!("Ignoring non-UTF-8 binary frame");
                        continue;
                    }
                },
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame.map_or((ABNORMAL_CLOSURE, String::new()), |f| {
                        (u16::from(f.code), f.reason.into_owned())
                    });
                    return Some((SocketEvent::Closed { code, reason }, None));
                }
                Some(Err(e)) => return Some((SocketEvent::Error(e.to_string()), None)),
                None => {
                    return Some((
                        SocketEvent::Closed {
                            code: ABNORMAL_CLOSURE,
                            reason: "stream ended".to_string(),
                        },
                        None,
                    ));
                }
            };
            return Some((event, Some(read)));
        }
    })
}
