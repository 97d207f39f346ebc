//! Stream Multiplexer - Consumer Subscription Surface
//!
//! The only entry point UI-facing code uses for live data. Sessions are
//! shared: every listener subscribed to the same
//! (exchange, symbol, stream, timeframe) tuple hangs off one socket, and
//! the session is torn down when the last listener leaves.
//!
//! A subscription whose options are disabled or incomplete is valid but
//! inactive: nothing is opened. Changing options through
//! [`Subscription::update`] tears down the previous tuple and opens the
//! new one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use super::stream_session::{SessionHandle, SessionSettings, StreamSession};
use crate::adapters::exchanges::ExchangeRegistry;
use crate::domain::{StreamKey, StreamType, Timeframe};
use crate::error::FeedError;
use crate::ports::listener::{ChannelListener, StreamEvent, StreamListener, StreamNotification};
use crate::ports::observer::{NoopObserver, SessionObserver, SessionState};
use crate::ports::transport::Connector;

/// What a consumer wants to stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeOptions {
    pub exchange: String,
    pub symbol: String,
    pub stream_type: StreamType,
    pub timeframe: Option<Timeframe>,
    /// `false` keeps the subscription inactive.
    pub enabled: bool,
}

impl SubscribeOptions {
    pub fn kline(exchange: &str, symbol: &str, timeframe: Timeframe) -> Self {
        Self {
            exchange: exchange.to_string(),
            symbol: symbol.to_string(),
            stream_type: StreamType::Kline,
            timeframe: Some(timeframe),
            enabled: true,
        }
    }

    pub fn depth(exchange: &str, symbol: &str) -> Self {
        Self {
            exchange: exchange.to_string(),
            symbol: symbol.to_string(),
            stream_type: StreamType::Depth,
            timeframe: None,
            enabled: true,
        }
    }

    pub fn trades(exchange: &str, symbol: &str) -> Self {
        Self {
            exchange: exchange.to_string(),
            symbol: symbol.to_string(),
            stream_type: StreamType::Trade,
            timeframe: None,
            enabled: true,
        }
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Session identity, or `None` when nothing should be opened.
    pub fn key(&self) -> Option<StreamKey> {
        if !self.enabled || self.exchange.trim().is_empty() || self.symbol.trim().is_empty() {
            return None;
        }
        Some(StreamKey::new(
            self.exchange.trim(),
            self.symbol.trim(),
            self.stream_type,
            self.timeframe,
        ))
    }
}

/// Fan-out of one session's callbacks to every attached listener, in
/// attach order.
#[derive(Default)]
struct ListenerSet {
    listeners: RwLock<Vec<(Uuid, Arc<dyn StreamListener>)>>,
}

impl ListenerSet {
    fn add(&self, listener: Arc<dyn StreamListener>) -> Uuid {
        let id = Uuid::new_v4();
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    /// Returns the number of listeners left.
    fn remove(&self, id: Uuid) -> usize {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len()
    }

    // Callbacks run outside the lock so a listener may unsubscribe from
    // inside its own callback.
    fn snapshot(&self) -> Vec<Arc<dyn StreamListener>> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect()
    }
}

impl StreamListener for ListenerSet {
    fn on_event(&self, event: &StreamEvent) {
        for listener in self.snapshot() {
            listener.on_event(event);
        }
    }

    fn on_connection_error(&self, message: &str) {
        for listener in self.snapshot() {
            listener.on_connection_error(message);
        }
    }
}

struct SharedSession {
    handle: SessionHandle,
    listeners: Arc<ListenerSet>,
}

struct Inner {
    registry: Arc<ExchangeRegistry>,
    connector: Arc<dyn Connector>,
    observer: Arc<dyn SessionObserver>,
    settings: SessionSettings,
    sessions: Mutex<HashMap<StreamKey, SharedSession>>,
}

impl Inner {
    fn attach(&self, key: &StreamKey, listener: Arc<dyn StreamListener>) -> Result<Uuid, FeedError> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(shared) = sessions.get(key) {
            if !shared.handle.is_ended() {
                let id = shared.listeners.add(listener);
                debug!(stream = %key, "Listener joined shared session");
                return Ok(id);
            }
            // Closed by the peer; its listeners keep their ended session.
            sessions.remove(key);
            debug!(stream = %key, "Replacing ended session");
        }

        let capabilities = self.registry.lookup(&key.exchange)?;
        let listeners = Arc::new(ListenerSet::default());
        let handle = StreamSession::spawn(
            key.clone(),
            Arc::clone(&capabilities.wire),
            Arc::clone(&self.connector),
            Arc::clone(&listeners) as Arc<dyn StreamListener>,
            Arc::clone(&self.observer),
            self.settings.clone(),
        )?;
        let id = listeners.add(listener);
        sessions.insert(key.clone(), SharedSession { handle, listeners });

        info!(stream = %key, "Stream session opened");
        Ok(id)
    }

    fn detach(&self, key: &StreamKey, id: Uuid) {
        let removed = {
            let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(shared) = sessions.get(key) else {
                return;
            };
            if shared.listeners.remove(id) > 0 {
                return;
            }
            sessions.remove(key)
        };

        if let Some(shared) = removed {
            info!(stream = %key, "Last listener left, closing session");
            shared.handle.close();
        }
    }
}

/// Shared-session subscription manager. Cheap to clone.
#[derive(Clone)]
pub struct StreamMultiplexer {
    inner: Arc<Inner>,
}

impl StreamMultiplexer {
    pub fn new(
        registry: Arc<ExchangeRegistry>,
        connector: Arc<dyn Connector>,
        settings: SessionSettings,
    ) -> Self {
        Self::with_observer(registry, connector, settings, Arc::new(NoopObserver))
    }

    pub fn with_observer(
        registry: Arc<ExchangeRegistry>,
        connector: Arc<dyn Connector>,
        settings: SessionSettings,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                connector,
                observer,
                settings,
                sessions: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Start delivering events for `options` to `listener`.
    ///
    /// # Errors
    /// Configuration errors (unknown exchange, kline without timeframe)
    /// before any socket is opened.
    pub fn subscribe(
        &self,
        options: SubscribeOptions,
        listener: Arc<dyn StreamListener>,
    ) -> Result<Subscription, FeedError> {
        let active = match options.key() {
            Some(key) => {
                let id = self.inner.attach(&key, Arc::clone(&listener))?;
                Some((key, id))
            }
            None => None,
        };

        Ok(Subscription {
            mux: Arc::downgrade(&self.inner),
            options,
            listener,
            active,
        })
    }

    /// Like [`subscribe`](Self::subscribe) but delivers into a channel.
    pub fn subscribe_channel(
        &self,
        options: SubscribeOptions,
    ) -> Result<(Subscription, mpsc::UnboundedReceiver<StreamNotification>), FeedError> {
        let (listener, rx) = ChannelListener::new();
        let subscription = self.subscribe(options, Arc::new(listener))?;
        Ok((subscription, rx))
    }

    /// Number of live sessions (not listeners). Sessions the peer closed
    /// are not counted.
    pub fn active_sessions(&self) -> usize {
        self.inner
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|shared| !shared.handle.is_ended())
            .count()
    }

    pub fn session_states(&self) -> Vec<(StreamKey, SessionState)> {
        self.inner
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(key, shared)| (key.clone(), shared.handle.state()))
            .collect()
    }

    /// Tear every session down and wait for them to finish.
    pub async fn shutdown(&self) {
        let sessions: Vec<SharedSession> = self
            .inner
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, shared)| shared)
            .collect();

        info!(sessions = sessions.len(), "Closing all stream sessions");
        for shared in sessions {
            shared.handle.shutdown().await;
        }
    }
}

/// Handle for one listener's subscription. Dropping it unsubscribes.
pub struct Subscription {
    mux: Weak<Inner>,
    options: SubscribeOptions,
    listener: Arc<dyn StreamListener>,
    active: Option<(StreamKey, Uuid)>,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn key(&self) -> Option<&StreamKey> {
        self.active.as_ref().map(|(key, _)| key)
    }

    pub fn options(&self) -> &SubscribeOptions {
        &self.options
    }

    /// Detach the listener. Safe to call more than once.
    pub fn unsubscribe(&mut self) {
        let Some((key, id)) = self.active.take() else {
            return;
        };
        if let Some(inner) = self.mux.upgrade() {
            inner.detach(&key, id);
        }
    }

    /// Switch to new options. The new tuple is opened before the old one is
    /// released, so on error the previous subscription stays intact.
    ///
    /// # Errors
    /// Configuration errors for the new tuple.
    pub fn update(&mut self, options: SubscribeOptions) -> Result<(), FeedError> {
        let next_key = options.key();
        if next_key.as_ref() == self.key() {
            self.options = options;
            return Ok(());
        }

        let Some(inner) = self.mux.upgrade() else {
            self.active = None;
            self.options = options;
            return Ok(());
        };

        let next = match next_key {
            Some(key) => {
                let id = inner.attach(&key, Arc::clone(&self.listener))?;
                Some((key, id))
            }
            None => None,
        };

        if let Some((key, id)) = self.active.take() {
            inner.detach(&key, id);
        }
        self.active = next;
        self.options = options;
        Ok(())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("options", &self.options)
            .field("active", &self.active.is_some())
            .finish_non_exhaustive()
    }
}
