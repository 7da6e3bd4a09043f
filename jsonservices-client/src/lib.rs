//! Stateful JSON-RPC client over WebSocket
//!
//! This crate provides a JSON-RPC client that keeps one persistent connection
//! open and multiplexes calls, notifications and server-pushed events over it.
//! Connection setup, authentication and reconnection happen behind the scenes.
//!
//! # Core Features
//!
//! - **Calls**: typed request/response over a single connection, any number in flight
//! - **Notifications**: one-way messages without a reply
//! - **Authentication**: pluggable credentials run before the connection is usable
//! - **Subscriptions**: server events dispatched to local handlers, with filters
//! - **Auto-Reconnection**: fixed delay by default, or exponential backoff
//! - **Observability**: tracing, diagnostic and trace hooks, OpenTelemetry metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use jsonservices_client::{ClientBuilder, CredentialsBase, EventFilter, Subscription};
//! use jsonservices_core::VersionRequest;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ClientBuilder::new("ws://localhost:8765")
//!         .credentials(Arc::new(CredentialsBase::with_user("root", "s3cr3t")))
//!         .on_error(|e| eprintln!("client error: {}", e))
//!         .build()?;
//!
//!     let session_id = client.connect().await?;
//!     println!("session {}", session_id);
//!
//!     let version = client.call(&VersionRequest::default()).await?;
//!     println!("server {}", version.product_version);
//!
//!     let _subscription = client
//!         .subscribe(
//!             Subscription::new("OrderShipped", |args| println!("shipped: {}", args))
//!                 .with_filter(EventFilter::new().with("Customer", "acme")),
//!         )
//!         .await?;
//!
//!     client.disconnect().await;
//!     Ok(())
//! }
//! ```
//!
//! # Message Names
//!
//! A message goes on the wire under the name it declares through
//! [`Message::message_name`](jsonservices_core::Message::message_name), which
//! `#[derive(Message)]` from `jsonservices-macros` fills in. Types that don't
//! declare a name can be registered with
//! [`ClientBuilder::register_message`].

mod client;
mod client_builder;
mod connection_state;
mod credentials;
mod engine;
mod event_filter;
mod hooks;
mod metrics;
mod reconnect;
mod request;
mod subscription;
mod transport;

pub use client::{JsonClient, Unsubscriber};
pub use client_builder::{ClientBuilder, ClientOptions};
pub use connection_state::{ConnectionManager, ConnectionState, ConnectionStatus};
pub use credentials::{Credentials, CredentialsBase};
pub use event_filter::{bool_matches, matches, number_matches, string_matches, value_matches, EventFilter};
pub use hooks::{ErrorHook, TraceDirection, TraceFrame, TraceHook};
pub use metrics::ClientMetrics;
pub use reconnect::{ExponentialBackoff, FixedDelay, NoReconnect, ReconnectionStrategy};
pub use request::{MessageIdGenerator, PendingCalls, ReplySender};
pub use subscription::{ClientSubscription, ClientSubscriptionManager, EventHandler, Subscription};
pub use transport::{
    Payload, Transport, TransportEvent, TransportHandle, TransportSink, WebSocketTransport, ABNORMAL_CLOSURE,
    NO_STATUS_RECEIVED,
};
