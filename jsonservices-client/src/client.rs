//! JSON-RPC client over a persistent connection
//!
//! This module provides the main [`JsonClient`] type. The client is a thin
//! handle: every operation is forwarded to the connection engine task, which
//! owns the transport and all connection state.
//!
//! # Client Lifecycle
//!
//! 1. **Build**: [`ClientBuilder`](crate::ClientBuilder) spawns the engine
//! 2. **Connect**: open the transport and authenticate, explicitly or on first use
//! 3. **Use**: make calls, send notifications, subscribe to events
//! 4. **Reconnect** (optional): after an abnormal close, per the configured strategy
//! 5. **Disconnect**: log out and close; the client can connect again later
//!
//! # Cloning
//!
//! `JsonClient` is cheaply cloneable using `Arc` internally. All clones
//! share the same connection and state. The engine stops once the last clone
//! is dropped.

use crate::connection_state::ConnectionStatus;
use crate::credentials::Credentials;
use crate::engine::Command;
use crate::hooks::Hooks;
use crate::metrics::ClientMetrics;
use crate::subscription::{ClientSubscription, Subscription};
use jsonservices_core::{
    codec, resolve_name, Error, Message, MessageRegistry, ObservabilityGuard, Result, SubscriptionMessage,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot, watch};

/// State shared by every clone of a client
pub(crate) struct ClientInner {
    pub(crate) url: String,
    pub(crate) commands: mpsc::UnboundedSender<Command>,
    pub(crate) status: watch::Receiver<ConnectionStatus>,
    pub(crate) registry: MessageRegistry,
    pub(crate) hooks: Hooks,
    pub(crate) metrics: Option<Arc<ClientMetrics>>,
    /// Keeps exporters alive for as long as the client
    pub(crate) _observability: Option<ObservabilityGuard>,
}

/// JSON-RPC client
///
/// # Examples
///
/// ```rust,no_run
/// use jsonservices_client::{ClientBuilder, Subscription};
/// use jsonservices_core::VersionRequest;
///
/// # async fn example() -> jsonservices_core::Result<()> {
/// let client = ClientBuilder::new("ws://localhost:8765").build()?;
///
/// // connects and authenticates on first use
/// let version = client.call(&VersionRequest::default()).await?;
/// println!("{} {}", version.product_name, version.product_version);
///
/// let unsubscriber = client
///     .subscribe(Subscription::new("OrderShipped", |args| println!("shipped: {}", args)))
///     .await?;
/// unsubscriber.unsubscribe().await?;
///
/// client.disconnect().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct JsonClient {
    inner: Arc<ClientInner>,
    /// Set on the handle given to credentials: calls skip the connect step
    handshake: bool,
}

impl JsonClient {
    pub(crate) fn new(inner: Arc<ClientInner>) -> Self {
        Self {
            inner,
            handshake: false,
        }
    }

    pub(crate) fn handshake(inner: Arc<ClientInner>) -> Self {
        Self {
            inner,
            handshake: true,
        }
    }

    /// Endpoint this client connects to
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Current connection status
    pub fn status(&self) -> ConnectionStatus {
        self.inner.status.borrow().clone()
    }

    /// Whether the connection is authenticated and usable
    pub fn is_connected(&self) -> bool {
        self.inner.status.borrow().is_connected()
    }

    /// Session of the current connection
    pub fn session_id(&self) -> Option<String> {
        self.inner.status.borrow().session_id.clone()
    }

    /// Abnormal closes since the last successful authentication
    pub fn reconnect_count(&self) -> u32 {
        self.inner.status.borrow().reconnect_count
    }

    /// Receiver that observes every status change
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status.clone()
    }

    /// Connect with the configured credentials
    ///
    /// Resolves with the session ID. Concurrent calls share one attempt, and
    /// calling it while connected returns the current session.
    pub async fn connect(&self) -> Result<String> {
        self.connect_inner(None).await
    }

    /// Connect with specific credentials
    ///
    /// The credentials are ignored if an attempt is already in flight. They are
    /// kept for automatic reconnection.
    pub async fn connect_with(&self, credentials: Arc<dyn Credentials>) -> Result<String> {
        self.connect_inner(Some(credentials)).await
    }

    #[tracing::instrument(skip(self, credentials), fields(url = %self.inner.url))]
    async fn connect_inner(&self, credentials: Option<Arc<dyn Credentials>>) -> Result<String> {
        let (reply, rx) = oneshot::channel();
        self.send_command(Command::Connect { credentials, reply })?;
        rx.await.map_err(|_| engine_stopped())?
    }

    /// Log out and close the connection
    ///
    /// Does nothing unless connected. Calls still pending fail with a
    /// connection-closed error.
    pub async fn disconnect(&self) {
        let (reply, rx) = oneshot::channel();
        if self.send_command(Command::Disconnect { reply }).is_ok() {
            let _ = rx.await;
        }
    }

    /// Wire name of a message: its declared name, else its registered name
    pub fn name_of<M: Message>(&self, message: Option<&M>) -> Result<String> {
        resolve_name(&self.inner.registry, message).map_err(|e| self.report(e))
    }

    /// Call a typed message and wait for its response
    ///
    /// Connects first if needed. There is no timeout: the call settles when
    /// the reply arrives or the connection closes.
    pub async fn call<M: Message>(&self, message: &M) -> Result<M::Response> {
        let method = self.name_of(Some(message))?;
        let params = codec::encode_params(message)?;
        let result = self.call_raw(method, params).await?;
        codec::decode_result(result).map_err(|e| self.report(e))
    }

    /// Call a method with raw parameters
    #[tracing::instrument(skip(self, params))]
    pub async fn call_raw(&self, method: String, params: Value) -> Result<Value> {
        self.ensure_connected().await?;

        let started = Instant::now();
        let (reply, rx) = oneshot::channel();
        self.send_command(Command::Call {
            method: method.clone(),
            params,
            reply,
        })?;
        let result = rx.await.map_err(|_| engine_stopped())?;

        if let Some(metrics) = &self.inner.metrics {
            metrics.record_call(&method, result.is_ok(), started.elapsed().as_secs_f64());
        }
        if let Err(e) = &result {
            tracing::debug!(error = %e, "call failed");
        }
        result
    }

    /// Send a typed one-way message
    pub async fn notify<M: Message>(&self, message: &M) -> Result<()> {
        let method = self.name_of(Some(message))?;
        let params = codec::encode_params(message)?;
        self.notify_raw(method, params).await
    }

    /// Send a one-way message with raw parameters
    ///
    /// Fails with [`Error::NotConnected`] if the connection is lost between the
    /// connect step and the send.
    pub async fn notify_raw(&self, method: String, params: Value) -> Result<()> {
        self.ensure_connected().await?;

        let (reply, rx) = oneshot::channel();
        self.send_command(Command::Notify {
            method: method.clone(),
            params,
            reply,
        })?;
        rx.await.map_err(|_| engine_stopped())??;

        if let Some(metrics) = &self.inner.metrics {
            metrics.record_notification(&method);
        }
        Ok(())
    }

    /// Subscribe to a server event
    ///
    /// The handler is in place before the subscription request goes out, so
    /// events pushed right after the server confirms are not missed. It is
    /// removed again if the server refuses. Dropping the returned
    /// [`Unsubscriber`] keeps the subscription active.
    pub async fn subscribe(&self, subscription: Subscription) -> Result<Unsubscriber> {
        self.ensure_connected().await?;

        let (reply, rx) = oneshot::channel();
        self.send_command(Command::NextId { reply })?;
        let subscription_id = rx.await.map_err(|_| engine_stopped())?;

        let subscription = ClientSubscription::new(subscription_id.clone(), subscription);
        let request = subscription.subscription_message();
        let unsubscriber = Unsubscriber {
            client: JsonClient::new(Arc::clone(&self.inner)),
            subscription_id: subscription_id.clone(),
            message: subscription.unsubscription_message(),
        };
        self.send_command(Command::AddSubscription { subscription })?;

        if let Err(e) = self.call(&request).await {
            let _ = self.send_command(Command::RemoveSubscription { subscription_id });
            return Err(e);
        }
        Ok(unsubscriber)
    }

    async fn ensure_connected(&self) -> Result<()> {
        if self.handshake || self.is_connected() {
            return Ok(());
        }
        self.connect().await.map(|_| ())
    }

    fn send_command(&self, command: Command) -> Result<()> {
        self.inner.commands.send(command).map_err(|_| engine_stopped())
    }

    /// Pass an error through the diagnostic hook on its way to the caller
    fn report(&self, error: Error) -> Error {
        self.inner.hooks.report(&error);
        if let Some(metrics) = &self.inner.metrics {
            metrics.record_error(&error);
        }
        error
    }
}

impl std::fmt::Debug for JsonClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonClient")
            .field("url", &self.inner.url)
            .field("status", &*self.inner.status.borrow())
            .field("handshake", &self.handshake)
            .finish()
    }
}

fn engine_stopped() -> Error {
    Error::Internal("client engine stopped".into())
}

/// Cancels a subscription
#[must_use = "dropping the unsubscriber keeps the subscription active"]
#[derive(Debug)]
pub struct Unsubscriber {
    client: JsonClient,
    subscription_id: String,
    message: SubscriptionMessage,
}

impl Unsubscriber {
    /// ID of the subscription this cancels
    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// Remove the handler, then tell the server
    pub async fn unsubscribe(self) -> Result<()> {
        self.client.send_command(Command::RemoveSubscription {
            subscription_id: self.subscription_id.clone(),
        })?;
        self.client.call(&self.message).await?;
        Ok(())
    }
}
