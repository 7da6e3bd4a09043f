//! Core types for the jsonservices client
//!
//! This crate holds everything that doesn't depend on a live connection:
//!
//! - **Types**: outgoing request envelopes and incoming frame routing
//! - **Messages**: the [`Message`] capability, wire-name resolution and the built-in
//!   protocol messages (authentication, logout, subscriptions, version)
//! - **Codec**: encoding and decoding of frames
//! - **Error handling**: the shared [`Error`] type and its error codes
//! - **Observability**: `tracing` and OpenTelemetry bootstrap
//!
//! The `jsonservices-client` crate builds the connection engine on top of it.
//!
//! # Example
//!
//! ```rust
//! use jsonservices_core::{codec, resolve_name, MessageRegistry, RequestEnvelope, VersionRequest};
//!
//! let message = VersionRequest::default();
//! let method = resolve_name(&MessageRegistry::new(), Some(&message)).unwrap();
//! let params = codec::encode_params(&message).unwrap();
//!
//! let text = codec::encode_request(&RequestEnvelope::call(method, params, "1")).unwrap();
//! assert!(text.contains("rpc.version"));
//! ```

pub mod codec;
pub mod error;
pub mod message;
pub mod messages;
pub mod observability;
pub mod types;

pub use error::{Error, JsonRpcErrorData, Result, CONNECTION_CLOSED, CONNECTION_FAILED, NORMAL_CLOSURE};
pub use message::{resolve_name, Message, MessageRegistry, Void};
pub use messages::{
    AuthRequest, AuthResponse, AuthenticatedIdentity, LogoutMessage, SubscriptionDescriptor,
    SubscriptionMessage, VersionRequest, VersionResponse, PASSWORD_KEY, USER_NAME_KEY,
};
pub use observability::{init_observability, ObservabilityConfig, ObservabilityGuard};
pub use types::{Id, Incoming, IncomingFrame, RequestEnvelope, JSONRPC_VERSION};
