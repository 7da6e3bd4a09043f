//! The connection engine
//!
//! A single background task owns all connection state: the transport handle,
//! pending calls, subscriptions, the ID counter and the status. Client handles
//! talk to it through a command channel; transports, timers and the
//! authentication task feed it events on two more channels. Nothing else
//! mutates that state, so no locks are involved.
//!
//! # Connection generations
//!
//! Every connection attempt gets a new generation number. Transport events and
//! authentication results carry the generation they belong to, and anything from
//! an older generation is ignored. This is how a discarded transport, or a late
//! authentication result, is kept from touching the current connection.

use crate::client::{ClientInner, JsonClient};
use crate::connection_state::{ConnectionManager, ConnectionState, ConnectionStatus};
use crate::credentials::Credentials;
use crate::hooks::{Hooks, TraceDirection};
use crate::metrics::ClientMetrics;
use crate::reconnect::ReconnectionStrategy;
use crate::request::{MessageIdGenerator, PendingCalls, ReplySender};
use crate::subscription::{ClientSubscription, ClientSubscriptionManager};
use crate::transport::{Payload, TaggedEvent, Transport, TransportEvent, TransportHandle, TransportSink};
use jsonservices_core::{codec, Error, Incoming, LogoutMessage, RequestEnvelope, Result, NORMAL_CLOSURE};
use serde_json::Value;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};

/// Requests from client handles
pub(crate) enum Command {
    Connect {
        credentials: Option<Arc<dyn Credentials>>,
        reply: oneshot::Sender<Result<String>>,
    },
    Call {
        method: String,
        params: Value,
        reply: ReplySender,
    },
    Notify {
        method: String,
        params: Value,
        reply: oneshot::Sender<Result<()>>,
    },
    NextId {
        reply: oneshot::Sender<String>,
    },
    AddSubscription {
        subscription: ClientSubscription,
    },
    RemoveSubscription {
        subscription_id: String,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
}

/// Events the engine schedules for itself
pub(crate) enum Internal {
    Authenticated { generation: u64, result: Result<String> },
    Reconnect { generation: u64 },
}

/// Receiving ends of the engine's event channels
pub(crate) struct EngineEvents {
    transport: mpsc::UnboundedReceiver<TaggedEvent>,
    internal: mpsc::UnboundedReceiver<Internal>,
}

/// Everything the engine needs from the builder
pub(crate) struct EngineSettings {
    pub(crate) url: String,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) credentials: Arc<dyn Credentials>,
    pub(crate) strategy: Option<Box<dyn ReconnectionStrategy>>,
    pub(crate) auth_timeout: Option<Duration>,
    pub(crate) hooks: Hooks,
    pub(crate) metrics: Option<Arc<ClientMetrics>>,
}

pub(crate) struct Engine {
    url: String,
    transport: Arc<dyn Transport>,
    default_credentials: Arc<dyn Credentials>,
    attempt_credentials: Arc<dyn Credentials>,
    auth_timeout: Option<Duration>,
    connection: ConnectionManager,
    handle: Option<Box<dyn TransportHandle>>,
    generation: u64,
    ids: MessageIdGenerator,
    pending: PendingCalls,
    subscriptions: ClientSubscriptionManager,
    waiters: Vec<oneshot::Sender<Result<String>>>,
    last_session_id: Option<String>,
    reconnecting: bool,
    hooks: Hooks,
    metrics: Option<Arc<ClientMetrics>>,
    client: Weak<ClientInner>,
    transport_tx: mpsc::UnboundedSender<TaggedEvent>,
    internal_tx: mpsc::UnboundedSender<Internal>,
}

impl Engine {
    pub(crate) fn new(settings: EngineSettings) -> (Self, EngineEvents, watch::Receiver<ConnectionStatus>) {
        let (connection, status) = ConnectionManager::new(settings.strategy);
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();

        let engine = Self {
            url: settings.url,
            transport: settings.transport,
            attempt_credentials: Arc::clone(&settings.credentials),
            default_credentials: settings.credentials,
            auth_timeout: settings.auth_timeout,
            connection,
            handle: None,
            generation: 0,
            ids: MessageIdGenerator::new(),
            pending: PendingCalls::new(),
            subscriptions: ClientSubscriptionManager::new(),
            waiters: Vec::new(),
            last_session_id: None,
            reconnecting: false,
            hooks: settings.hooks,
            metrics: settings.metrics,
            client: Weak::new(),
            transport_tx,
            internal_tx,
        };
        let events = EngineEvents {
            transport: transport_rx,
            internal: internal_rx,
        };
        (engine, events, status)
    }

    /// Link the engine to the client it serves, for the authentication step
    pub(crate) fn attach(mut self, client: Weak<ClientInner>) -> Self {
        self.client = client;
        self
    }

    /// Process commands and events until every client handle is dropped
    pub(crate) async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>, mut events: EngineEvents) {
        tracing::debug!(url = %self.url, "engine started");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(tagged) = events.transport.recv() => self.handle_transport(tagged),
                Some(internal) = events.internal.recv() => self.handle_internal(internal),
            }
            if let Some(metrics) = &self.metrics {
                metrics.update_connection_state(self.connection.state());
            }
        }
        self.shutdown();
        tracing::debug!(url = %self.url, "engine stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { credentials, reply } => self.connect(credentials, reply),
            Command::Call { method, params, reply } => self.call(method, params, reply),
            Command::Notify { method, params, reply } => {
                let _ = reply.send(self.notify(method, params));
            }
            Command::NextId { reply } => {
                let _ = reply.send(self.ids.next_id());
            }
            Command::AddSubscription { subscription } => {
                tracing::debug!(
                    subscription_id = subscription.subscription_id(),
                    event = subscription.event_name(),
                    "subscription added"
                );
                self.subscriptions.add(subscription);
                if let Some(metrics) = &self.metrics {
                    metrics.record_subscriptions(1);
                }
            }
            Command::RemoveSubscription { subscription_id } => {
                if self.subscriptions.remove(&subscription_id).is_some() {
                    tracing::debug!(subscription_id = %subscription_id, "subscription removed");
                    if let Some(metrics) = &self.metrics {
                        metrics.record_subscriptions(-1);
                    }
                }
            }
            Command::Disconnect { reply } => {
                self.disconnect();
                let _ = reply.send(());
            }
        }
    }

    fn connect(&mut self, credentials: Option<Arc<dyn Credentials>>, reply: oneshot::Sender<Result<String>>) {
        match self.connection.state() {
            ConnectionState::Connected => {
                let session = self.connection.status().session_id.clone().unwrap_or_default();
                let _ = reply.send(Ok(session));
            }
            ConnectionState::Connecting | ConnectionState::Authenticating => {
                self.waiters.push(reply);
            }
            ConnectionState::Disconnected | ConnectionState::Closing => {
                self.waiters.push(reply);
                let credentials = credentials.unwrap_or_else(|| Arc::clone(&self.default_credentials));
                self.open(credentials);
            }
        }
    }

    fn open(&mut self, credentials: Arc<dyn Credentials>) {
        self.generation += 1;
        self.attempt_credentials = credentials;
        self.connection.connecting();
        tracing::info!(url = %self.url, generation = self.generation, "connecting");

        let sink = TransportSink::new(self.generation, self.transport_tx.clone());
        self.handle = Some(self.transport.open(&self.url, sink));
    }

    fn call(&mut self, method: String, params: Value, reply: ReplySender) {
        if !self.connection.state().is_open() || self.handle.is_none() {
            self.report(&Error::NotConnected);
            let _ = reply.send(Err(Error::NotConnected));
            return;
        }

        let id = self.ids.next_id();
        let text = match codec::encode_request(&RequestEnvelope::call(method.as_str(), params, id.as_str())) {
            Ok(text) => text,
            Err(e) => {
                self.report(&e);
                let _ = reply.send(Err(e));
                return;
            }
        };

        tracing::debug!(id = %id, method = %method, "sending call");
        self.pending.register(id.clone(), method, reply);
        if let Err(e) = self.send_text(text) {
            self.report(&e);
            self.pending.fail(&id, e);
        }
    }

    fn notify(&mut self, method: String, params: Value) -> Result<()> {
        if !self.connection.state().is_open() || self.handle.is_none() {
            self.report(&Error::NotConnected);
            return Err(Error::NotConnected);
        }

        let text = codec::encode_request(&RequestEnvelope::notification(method.as_str(), params))?;
        tracing::debug!(method = %method, "sending notification");
        self.send_text(text)
    }

    fn send_text(&mut self, text: String) -> Result<()> {
        let handle = self.handle.as_mut().ok_or(Error::NotConnected)?;
        self.hooks.trace(TraceDirection::Outgoing, &text);
        handle.send(text)
    }

    fn disconnect(&mut self) {
        if self.handle.is_none() || !self.connection.state().is_open() {
            tracing::debug!("disconnect ignored, not connected");
            return;
        }

        self.connection.closing();
        let logout = codec::encode_params(&LogoutMessage::default())
            .and_then(|params| codec::encode_request(&RequestEnvelope::notification(LogoutMessage::NAME, params)));
        if let Err(e) = logout.and_then(|text| self.send_text(text)) {
            self.report(&e);
        }

        self.discard_transport();
        let error = Error::ConnectionClosed {
            code: NORMAL_CLOSURE,
            reason: String::new(),
        };
        self.pending.fail_all(&error);
        self.fail_waiters(&error);
        self.connection.disconnected();
        tracing::info!(url = %self.url, "disconnected");
    }

    /// Close the transport and ignore anything it reports afterwards
    fn discard_transport(&mut self) {
        self.generation += 1;
        if let Some(mut handle) = self.handle.take() {
            handle.close();
        }
    }

    fn handle_transport(&mut self, tagged: TaggedEvent) {
        if tagged.generation != self.generation || self.handle.is_none() {
            tracing::trace!(generation = tagged.generation, event = ?tagged.event, "stale transport event ignored");
            return;
        }

        match tagged.event {
            TransportEvent::Open => self.on_open(),
            TransportEvent::Error(message) => self.on_error(message),
            TransportEvent::Message(payload) => self.on_message(payload),
            TransportEvent::Close { code, reason } => self.on_close(code, reason),
        }
    }

    fn on_open(&mut self) {
        if self.connection.state() != ConnectionState::Connecting {
            return;
        }

        let Some(inner) = self.client.upgrade() else {
            // every handle is gone; the command channel closes next
            return;
        };

        self.connection.authenticating();
        tracing::debug!(url = %self.url, "transport open, authenticating");

        let client = JsonClient::handshake(inner);
        let credentials = Arc::clone(&self.attempt_credentials);
        let internal = self.internal_tx.clone();
        let generation = self.generation;
        let limit = self.auth_timeout;
        // the handshake handle keeps the engine alive, so the task must end
        tokio::spawn(async move {
            let result = match limit {
                Some(limit) => tokio::time::timeout(limit, credentials.authenticate(&client))
                    .await
                    .unwrap_or_else(|_| {
                        Err(Error::AuthenticationFailed(format!(
                            "Authentication timed out after {} ms",
                            limit.as_millis()
                        )))
                    }),
                None => credentials.authenticate(&client).await,
            };
            drop(client);
            let _ = internal.send(Internal::Authenticated { generation, result });
        });
    }

    fn on_error(&mut self, message: String) {
        if self.connection.state() == ConnectionState::Connecting {
            let error = Error::ConnectFailed {
                url: self.url.clone(),
                message,
            };
            self.discard_transport();
            self.attempt_failed(error);
        } else {
            // the close event that follows does the cleanup
            self.report(&Error::WebSocket(message));
        }
    }

    fn on_message(&mut self, payload: Payload) {
        let text = payload.into_text();
        self.hooks.trace(TraceDirection::Incoming, &text);

        match codec::decode(&text) {
            Ok(Incoming::Reply { id, outcome }) => {
                if let Err(error) = &outcome {
                    if self.pending.contains(&id) {
                        self.report(&Error::JsonRpc(error.clone()));
                    }
                }
                match self.pending.settle(&id, outcome) {
                    Some(method) => tracing::debug!(id = %id, method = %method, "call settled"),
                    None => tracing::debug!(id = %id, "reply for unknown call dropped"),
                }
            }
            Ok(Incoming::Event { name, args }) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_event(&name);
                }
                let delivered = self.subscriptions.broadcast(&name, &args);
                tracing::trace!(event = %name, delivered, "event dispatched");
            }
            Ok(Incoming::Unroutable) => {
                self.report(&Error::Parse("frame has neither an id nor a method".into()));
            }
            Err(e) => self.report(&e),
        }
    }

    fn on_close(&mut self, code: u16, reason: String) {
        let previous = self.connection.state();
        self.handle = None;
        self.connection.disconnected();

        let error = Error::ConnectionClosed {
            code,
            reason: reason.clone(),
        };
        let rejected = self.pending.fail_all(&error);
        tracing::info!(url = %self.url, code, reason = %reason, rejected, "connection closed");

        if previous == ConnectionState::Connecting {
            // closed before it ever opened
            self.attempt_failed(Error::ConnectFailed {
                url: self.url.clone(),
                message: format!("closed with code {}", code),
            });
            return;
        }

        self.reconnecting = false;
        if code != NORMAL_CLOSURE {
            self.report(&error);
            self.maybe_reconnect();
        }

        let result = self.last_session_id.clone().ok_or(error);
        self.resolve_waiters(result);
    }

    /// A connection attempt failed before the transport opened
    ///
    /// The waiters fail. Only an automatic reconnection attempt is retried; a
    /// failed manual connect is left to the caller.
    fn attempt_failed(&mut self, error: Error) {
        tracing::warn!(url = %self.url, error = %error, "connection failed");
        self.report(&error);
        self.connection.disconnected();
        self.fail_waiters(&error);
        if std::mem::take(&mut self.reconnecting) {
            self.maybe_reconnect();
        }
    }

    fn maybe_reconnect(&mut self) {
        match self.connection.next_reconnect_delay() {
            Some(delay) => self.schedule_reconnect(delay),
            None => tracing::info!(
                attempt = self.connection.status().reconnect_count,
                enabled = self.connection.reconnect_enabled(),
                "not reconnecting"
            ),
        }
    }

    fn schedule_reconnect(&mut self, delay: Duration) {
        let attempt = self.connection.status().reconnect_count;
        tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "reconnect scheduled");

        let internal = self.internal_tx.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = internal.send(Internal::Reconnect { generation });
        });
    }

    fn handle_internal(&mut self, internal: Internal) {
        match internal {
            Internal::Authenticated { generation, result } => {
                if generation != self.generation || self.connection.state() != ConnectionState::Authenticating {
                    tracing::debug!(generation, "stale authentication result ignored");
                    return;
                }
                match result {
                    Ok(session_id) => self.on_authenticated(session_id),
                    Err(e) => self.on_authentication_failed(e),
                }
            }
            Internal::Reconnect { generation } => {
                // a manual connect or disconnect since scheduling cancels the attempt
                if generation != self.generation || self.connection.state() != ConnectionState::Disconnected {
                    return;
                }
                self.reconnecting = true;
                if let Some(metrics) = &self.metrics {
                    metrics.record_reconnection_attempt();
                }
                let credentials = Arc::clone(&self.attempt_credentials);
                self.open(credentials);
            }
        }
    }

    fn on_authenticated(&mut self, session_id: String) {
        tracing::info!(url = %self.url, session_id = %session_id, "connected");
        self.connection.connected(session_id.clone());
        self.last_session_id = Some(session_id.clone());
        if std::mem::take(&mut self.reconnecting) {
            if let Some(metrics) = &self.metrics {
                metrics.record_reconnection_success();
            }
        }
        self.resolve_waiters(Ok(session_id));
    }

    fn on_authentication_failed(&mut self, error: Error) {
        let error = if error.is_server_error() {
            // already reported when the reply was settled
            error
        } else {
            let error = Error::AuthenticationFailed(error.to_string());
            self.report(&error);
            error
        };
        tracing::warn!(url = %self.url, error = %error, "authentication failed");

        self.discard_transport();
        self.pending.fail_all(&Error::ConnectionClosed {
            code: NORMAL_CLOSURE,
            reason: String::new(),
        });
        self.connection.disconnected();
        self.reconnecting = false;
        self.fail_waiters(&error);
    }

    fn resolve_waiters(&mut self, result: Result<String>) {
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(result.clone());
        }
    }

    fn fail_waiters(&mut self, error: &Error) {
        self.resolve_waiters(Err(error.clone()));
    }

    fn report(&self, error: &Error) {
        self.hooks.report(error);
        if let Some(metrics) = &self.metrics {
            metrics.record_error(error);
        }
    }

    fn shutdown(&mut self) {
        self.discard_transport();
        let error = Error::ConnectionClosed {
            code: NORMAL_CLOSURE,
            reason: String::new(),
        };
        self.pending.fail_all(&error);
        self.fail_waiters(&error);
        self.connection.disconnected();
    }
}
