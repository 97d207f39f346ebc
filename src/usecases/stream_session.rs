//! Stream Session - One Live Connection's Lifecycle
//!
//! A session owns the socket and timers for a single
//! (exchange, symbol, stream, timeframe) tuple and runs as its own tokio
//! task:
//!
//! ```text
//! idle -> connecting -> subscribed -> closing -> idle
//!            ^              |
//!            |              v
//!            +------ reconnect_pending   (socket error / close != 1000)
//! ```
//!
//! Every socket gets a reader task that tags inbound frames with the
//! generation the socket was opened under. The generation increments on
//! every reconnect and the session drops frames whose tag is stale, so a
//! superseded socket can never leak events into the current stream.
//!
//! Disruptions are retried forever after a fixed delay; listeners only
//! see an advisory `on_connection_error`. Teardown detaches the readers
//! before sending the close frame, so it never looks like a disruption.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, instrument, trace, warn};

use crate::domain::{StreamKey, StreamRequest};
use crate::error::FeedError;
use crate::ports::listener::{StreamEvent, StreamListener};
use crate::ports::observer::{SessionObserver, SessionState};
use crate::ports::transport::{Connector, NORMAL_CLOSURE, SocketEvent, SocketSink};
use crate::ports::wire::{WireAdapter, decode_frame};

/// Reconnect delay used when none is configured.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Tunables for every session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Fixed wait between a disruption and the next connect attempt.
    pub reconnect_delay: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

/// A frame tagged with the generation of the socket it came from.
#[derive(Debug)]
struct Inbound {
    generation: u64,
    event: SocketEvent,
}

/// Why the streaming phase ended.
enum Exit {
    /// Teardown requested; the sink is still open.
    Shutdown(Box<dyn SocketSink>),
    /// Peer closed with 1000.
    ClosedNormally,
    /// Anything else. Carries the sink when our side gave up on a socket
    /// that may still be open.
    Disrupted {
        message: String,
        sink: Option<Box<dyn SocketSink>>,
    },
}

/// Control handle for a running session. Dropping it tears the session down.
#[derive(Debug)]
pub struct SessionHandle {
    key: Arc<StreamKey>,
    shutdown_tx: broadcast::Sender<()>,
    state_rx: watch::Receiver<SessionState>,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    pub fn key(&self) -> &StreamKey {
        &self.key
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn state_receiver(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    /// `true` once the session has started teardown or its task is gone.
    /// An ended session never opens another socket.
    pub fn is_ended(&self) -> bool {
        matches!(self.state(), SessionState::Closing | SessionState::Idle)
            || self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Request teardown without waiting for it.
    pub fn close(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Request teardown and wait for the task to finish.
    pub async fn shutdown(mut self) {
        self.close();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(stream = %self.key, error = %e, "Session task ended abnormally");
            }
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// State owned by the session task.
pub struct StreamSession {
    key: Arc<StreamKey>,
    url: String,
    subscribe_payload: Option<String>,
    adapter: Arc<dyn WireAdapter>,
    connector: Arc<dyn Connector>,
    listener: Arc<dyn StreamListener>,
    observer: Arc<dyn SessionObserver>,
    settings: SessionSettings,
    generation: u64,
    state_tx: watch::Sender<SessionState>,
}

impl StreamSession {
    /// Validate the request against the adapter and start the session task.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// Configuration errors from the adapter (e.g. kline without timeframe);
    /// nothing is spawned in that case.
    pub fn spawn(
        key: StreamKey,
        adapter: Arc<dyn WireAdapter>,
        connector: Arc<dyn Connector>,
        listener: Arc<dyn StreamListener>,
        observer: Arc<dyn SessionObserver>,
        settings: SessionSettings,
    ) -> Result<SessionHandle, FeedError> {
        let request: StreamRequest = key.request();
        let url = adapter.connection_url(&request)?;
        let subscribe_payload = adapter.subscribe_payload(&request)?;

        let key = Arc::new(key);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        // Idle is reserved for a finished session.
        let (state_tx, state_rx) = watch::channel(SessionState::Connecting);

        let session = Self {
            key: Arc::clone(&key),
            url,
            subscribe_payload,
            adapter,
            connector,
            listener,
            observer,
            settings,
            generation: 0,
            state_tx,
        };

        let task = tokio::spawn(session.run(shutdown_rx));

        Ok(SessionHandle {
            key,
            shutdown_tx,
            state_rx,
            task: Some(task),
        })
    }

    #[instrument(skip_all, fields(stream = %self.key))]
    async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        let (inbox_tx, mut inbox_rx) = mpsc::unbounded_channel::<Inbound>();
        let mut readers: Vec<JoinHandle<()>> = Vec::new();

        loop {
            self.set_state(SessionState::Connecting);
            debug!(url = %self.url, generation = self.generation, "Connecting");

            let connected = tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    self.teardown(None, &mut readers).await;
                    return;
                }
                result = self.connector.connect(&self.url) => result,
            };

            let (message, stale_sink) = match connected {
                Ok(conn) => {
                    readers.retain(|r| !r.is_finished());
                    readers.push(spawn_reader(self.generation, conn.events, inbox_tx.clone()));

                    match self.stream(conn.sink, &mut inbox_rx, &mut shutdown_rx).await {
                        Exit::Shutdown(sink) => {
                            self.teardown(Some(sink), &mut readers).await;
                            return;
                        }
                        Exit::ClosedNormally => {
                            info!(generation = self.generation, "Peer closed stream normally");
                            self.teardown(None, &mut readers).await;
                            return;
                        }
                        Exit::Disrupted { message, sink } => (message, sink),
                    }
                }
                Err(e) => (e.to_string(), None),
            };

            if let Some(mut sink) = stale_sink {
                // Let the peer release the superseded socket.
                let _ = sink.close(NORMAL_CLOSURE).await;
            }

            self.set_state(SessionState::ReconnectPending);
            warn!(
                generation = self.generation,
                error = %message,
                delay_ms = self.settings.reconnect_delay.as_millis(),
                "Stream disrupted, reconnecting"
            );
            self.listener.on_connection_error(&message);

            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    self.teardown(None, &mut readers).await;
                    return;
                }
                () = tokio::time::sleep(self.settings.reconnect_delay) => {}
            }

            self.generation += 1;
            self.observer.reconnect_scheduled(&self.key, self.generation);
        }
    }

    /// Subscribe, then pump frames and heartbeats until the socket ends or
    /// teardown is requested.
    async fn stream(
        &self,
        mut sink: Box<dyn SocketSink>,
        inbox: &mut mpsc::UnboundedReceiver<Inbound>,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> Exit {
        if let Some(payload) = &self.subscribe_payload {
            if let Err(e) = sink.send_text(payload.clone()).await {
                return Exit::Disrupted {
                    message: format!("subscribe failed: {e}"),
                    sink: Some(sink),
                };
            }
        }

        self.set_state(SessionState::Subscribed);
        info!(generation = self.generation, "Stream subscribed");

        let mut heartbeat = self.adapter.heartbeat().map(|hb| {
            let mut ticker = tokio::time::interval_at(Instant::now() + hb.interval, hb.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            (ticker, hb.payload)
        });

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => return Exit::Shutdown(sink),
                inbound = inbox.recv() => {
                    let Some(inbound) = inbound else {
                        return Exit::Disrupted { message: "reader channel closed".into(), sink: Some(sink) };
                    };
                    if inbound.generation != self.generation {
                        trace!(
                            frame_generation = inbound.generation,
                            generation = self.generation,
                            "Dropping frame from superseded socket"
                        );
                        self.observer.stale_frame_dropped(&self.key);
                        continue;
                    }
                    match inbound.event {
                        SocketEvent::Text(text) => self.dispatch(&text),
                        SocketEvent::Closed { code, .. } if code == NORMAL_CLOSURE => {
                            return Exit::ClosedNormally;
                        }
                        SocketEvent::Closed { code, reason } => {
                            return Exit::Disrupted {
                                message: format!("socket closed with code {code}: {reason}"),
                                sink: None,
                            };
                        }
                        SocketEvent::Error(e) => {
                            return Exit::Disrupted { message: format!("socket error: {e}"), sink: None };
                        }
                    }
                }
                payload = next_beat(&mut heartbeat) => {
                    trace!("Sending heartbeat");
                    if let Err(e) = sink.send_text(payload).await {
                        return Exit::Disrupted { message: format!("heartbeat failed: {e}"), sink: Some(sink) };
                    }
                }
            }
        }
    }

    /// Decode one frame and fan its events out in order.
    fn dispatch(&self, raw: &str) {
        self.observer.frame_received(&self.key);

        let Some(decoded) = decode_frame(self.adapter.as_ref(), raw) else {
            self.observer.decode_failed(&self.key);
            return;
        };

        let events = decoded.into_events();
        if events.is_empty() {
            return;
        }

        let count = events.len();
        for event in events {
            self.listener.on_event(&StreamEvent {
                key: Arc::clone(&self.key),
                generation: self.generation,
                event,
            });
        }
        self.observer.events_delivered(&self.key, count);
    }

    /// Detach readers, close the socket with 1000 and go idle.
    async fn teardown(&self, sink: Option<Box<dyn SocketSink>>, readers: &mut Vec<JoinHandle<()>>) {
        self.set_state(SessionState::Closing);

        for reader in readers.drain(..) {
            reader.abort();
        }

        if let Some(mut sink) = sink {
            if let Err(e) = sink.close(NORMAL_CLOSURE).await {
                debug!(error = %e, "Close frame not delivered");
            }
        }

        self.set_state(SessionState::Idle);
        info!("Stream session closed");
    }

    fn set_state(&self, state: SessionState) {
        self.state_tx.send_replace(state);
        self.observer.state_changed(&self.key, state);
    }
}

/// Forward one socket's events, tagged with its generation, until the
/// socket ends or the session goes away.
fn spawn_reader(
    generation: u64,
    mut events: BoxStream<'static, SocketEvent>,
    inbox: mpsc::UnboundedSender<Inbound>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            if inbox.send(Inbound { generation, event }).is_err() {
                break;
            }
        }
    })
}

/// Resolve on the next heartbeat tick, or never if there is no heartbeat.
async fn next_beat(heartbeat: &mut Option<(Interval, String)>) -> String {
    match heartbeat {
        Some((ticker, payload)) => {
            ticker.tick().await;
            payload.clone()
        }
        None => std::future::pending().await,
    }
}
