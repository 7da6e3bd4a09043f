//! Client builder and connection options
//!
//! The `ClientBuilder` provides a fluent API for configuring client behavior
//! before connecting. It allows you to:
//! - Tune or disable automatic reconnection
//! - Supply default credentials and a custom transport
//! - Register wire names for message types
//! - Install diagnostic and trace hooks
//! - Configure observability (OpenTelemetry)
//!
//! # Examples
//!
//! ```rust,no_run
//! use jsonservices_client::{ClientBuilder, CredentialsBase, ExponentialBackoff};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> jsonservices_core::Result<()> {
//! // Fixed-delay reconnection, as configured by the options
//! let client = ClientBuilder::new("ws://localhost:8765")
//!     .reconnect_interval(Duration::from_secs(2))
//!     .max_reconnects(0)
//!     .credentials(Arc::new(CredentialsBase::with_user("root", "s3cr3t")))
//!     .connect()
//!     .await?;
//!
//! // Exponential backoff and observability
//! let client2 = ClientBuilder::new("ws://localhost:8765")
//!     .with_reconnect(Box::new(ExponentialBackoff::default()))
//!     .with_default_observability()
//!     .service_name("my-client")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use crate::client::{ClientInner, JsonClient};
use crate::credentials::{Credentials, CredentialsBase};
use crate::engine::{Engine, EngineSettings};
use crate::hooks::{Hooks, TraceFrame};
use crate::metrics::ClientMetrics;
use crate::reconnect::{FixedDelay, ReconnectionStrategy};
use crate::transport::{Transport, WebSocketTransport};
use jsonservices_core::{Error, MessageRegistry, ObservabilityConfig, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Connection options
///
/// Field names are camelCase in serialized form, and missing fields take
/// their defaults:
///
/// ```rust
/// use jsonservices_client::ClientOptions;
///
/// let options: ClientOptions = serde_json::from_str(r#"{"maxReconnects": 0}"#).unwrap();
/// assert!(options.reconnect);
/// assert_eq!(options.reconnect_interval_ms, 5000);
/// assert_eq!(options.max_reconnects, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientOptions {
    /// Reconnect after an abnormal close
    pub reconnect: bool,
    /// Delay before each reconnection attempt
    pub reconnect_interval_ms: u64,
    /// Attempts before giving up, `0` for unlimited
    pub max_reconnects: u32,
    /// Limit on the credentials' authentication step, `0` for none
    pub auth_timeout_ms: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            reconnect: true,
            reconnect_interval_ms: 5000,
            max_reconnects: 10,
            auth_timeout_ms: 30_000,
        }
    }
}

impl ClientOptions {
    /// The fixed-delay strategy these options describe, if reconnection is on
    pub fn strategy(&self) -> Option<Box<dyn ReconnectionStrategy>> {
        self.reconnect.then(|| {
            Box::new(
                FixedDelay::new(Duration::from_millis(self.reconnect_interval_ms))
                    .with_max_attempts(self.max_reconnects),
            ) as Box<dyn ReconnectionStrategy>
        })
    }

    /// The authentication limit, if any
    pub fn auth_timeout(&self) -> Option<Duration> {
        (self.auth_timeout_ms > 0).then(|| Duration::from_millis(self.auth_timeout_ms))
    }
}

/// Builder for configuring and creating a [`JsonClient`]
pub struct ClientBuilder {
    url: String,
    options: ClientOptions,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
    credentials: Option<Arc<dyn Credentials>>,
    transport: Option<Arc<dyn Transport>>,
    registry: MessageRegistry,
    hooks: Hooks,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
    enable_metrics: bool,
}

impl ClientBuilder {
    /// Create a new client builder with default options
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            options: ClientOptions::default(),
            reconnect_strategy: None,
            credentials: None,
            transport: None,
            registry: MessageRegistry::new(),
            hooks: Hooks::default(),
            observability_config: None,
            service_name: None,
            enable_metrics: false,
        }
    }

    /// Replace all connection options
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Delay before each reconnection attempt
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.options.reconnect_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Reconnection attempts before giving up, `0` for unlimited
    pub fn max_reconnects(mut self, max: u32) -> Self {
        self.options.max_reconnects = max;
        self
    }

    /// Give up on authentication that takes longer than `timeout`
    ///
    /// The attempt then fails like any other authentication failure.
    /// `Duration::ZERO` waits indefinitely.
    pub fn auth_timeout(mut self, timeout: Duration) -> Self {
        self.options.auth_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Reconnect with a custom strategy instead of the fixed delay
    pub fn with_reconnect(mut self, strategy: Box<dyn ReconnectionStrategy>) -> Self {
        self.reconnect_strategy = Some(strategy);
        self.options.reconnect = true;
        self
    }

    /// Disable automatic reconnection
    pub fn without_reconnect(mut self) -> Self {
        self.options.reconnect = false;
        self.reconnect_strategy = None;
        self
    }

    /// Credentials used when `connect` is called without any
    pub fn credentials(mut self, credentials: Arc<dyn Credentials>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Use a custom transport instead of WebSocket
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Register the wire name of a message type that doesn't declare one
    pub fn register_message<M: 'static>(mut self, name: impl Into<String>) -> Self {
        self.registry.register::<M>(name);
        self
    }

    /// Receive every error the client surfaces internally
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.hooks.on_error = Some(Arc::new(hook));
        self
    }

    /// Receive every raw frame sent or received
    pub fn on_trace<F>(mut self, hook: F) -> Self
    where
        F: Fn(&TraceFrame<'_>) + Send + Sync + 'static,
    {
        self.hooks.on_trace = Some(Arc::new(hook));
        self
    }

    /// Enable OpenTelemetry observability with custom configuration
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    /// Enable OpenTelemetry observability with default configuration
    pub fn with_default_observability(mut self) -> Self {
        self.observability_config = Some(ObservabilityConfig::default());
        self
    }

    /// Record client metrics on the global meter provider
    ///
    /// Implied by the observability options; use this when the application
    /// installs its own provider.
    pub fn with_metrics(mut self) -> Self {
        self.enable_metrics = true;
        self
    }

    /// Set service name for observability (used if observability is enabled)
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Create the client without connecting
    ///
    /// Spawns the connection engine, so it must be called within a Tokio
    /// runtime.
    pub fn build(self) -> Result<JsonClient> {
        tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Internal(format!("client must be built within a Tokio runtime: {}", e)))?;

        let (observability, metrics) = match self.observability_config {
            Some(mut config) => {
                if let Some(name) = &self.service_name {
                    config.service_name = name.clone();
                }
                let guard = jsonservices_core::init_observability(config.clone())
                    .map_err(|e| Error::Internal(format!("Failed to initialize observability: {}", e)))?;
                let metrics = ClientMetrics::new(config.service_name.as_str());
                (Some(guard), Some(Arc::new(metrics)))
            }
            None if self.enable_metrics => {
                let name = self.service_name.clone().unwrap_or_else(|| "jsonservices".to_string());
                (None, Some(Arc::new(ClientMetrics::new(name))))
            }
            None => (None, None),
        };

        let strategy = match self.reconnect_strategy {
            Some(strategy) => Some(strategy),
            None => self.options.strategy(),
        };

        let (engine, events, status) = Engine::new(EngineSettings {
            url: self.url.clone(),
            transport: self.transport.unwrap_or_else(|| Arc::new(WebSocketTransport)),
            credentials: self.credentials.unwrap_or_else(|| Arc::new(CredentialsBase::new())),
            strategy,
            auth_timeout: self.options.auth_timeout(),
            hooks: self.hooks.clone(),
            metrics: metrics.clone(),
        });

        let (commands, commands_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(ClientInner {
            url: self.url,
            commands,
            status,
            registry: self.registry,
            hooks: self.hooks,
            metrics,
            _observability: observability,
        });

        let engine = engine.attach(Arc::downgrade(&inner));
        tokio::spawn(engine.run(commands_rx, events));

        Ok(JsonClient::new(inner))
    }

    /// Build the client and connect it
    pub async fn connect(self) -> Result<JsonClient> {
        let client = self.build()?;
        client.connect().await?;
        Ok(client)
    }
}
