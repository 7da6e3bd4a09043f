//! Wire envelopes exchanged with a JSON-RPC service
//!
//! Outgoing traffic is always a [`RequestEnvelope`]: a correlated call when it
//! carries an `id`, a fire-and-forget notification when it doesn't. Incoming
//! traffic is parsed leniently into an [`IncomingFrame`] and then classified into
//! an [`Incoming`] value that the client routes:
//!
//! 1. **Reply**: the frame carries a non-empty `id`; it settles a pending call
//! 2. **Event**: no `id` but a `method`; it is broadcast to subscriptions
//! 3. **Unroutable**: neither; reported and dropped
//!
//! # Correlation IDs
//!
//! The client emits string IDs, but servers are free to echo them back as
//! numbers. Both forms are normalized to the same string key.

use crate::error::JsonRpcErrorData;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Protocol version stamped on every outgoing envelope
pub const JSONRPC_VERSION: &str = "2.0";

/// Correlation ID as it appears on the wire
///
/// # Examples
///
/// ```rust
/// use jsonservices_core::Id;
///
/// let id: Id = serde_json::from_str("17").unwrap();
/// assert_eq!(id.correlation_key().as_deref(), Some("17"));
///
/// let empty: Id = serde_json::from_str("\"\"").unwrap();
/// assert_eq!(empty.correlation_key(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    /// String identifier, what this client sends
    String(String),
    /// Numeric identifier
    Number(i64),
    /// Null identifier
    Null,
}

impl Id {
    /// Key used to look the ID up among pending calls
    ///
    /// Returns `None` for null and empty IDs, which can't correlate anything.
    pub fn correlation_key(&self) -> Option<String> {
        match self {
            Id::String(s) if s.is_empty() => None,
            Id::String(s) => Some(s.clone()),
            Id::Number(n) => Some(n.to_string()),
            Id::Null => None,
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::String(s) => write!(f, "\"{}\"", s),
            Id::Number(n) => write!(f, "{}", n),
            Id::Null => write!(f, "null"),
        }
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::String(s)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::String(s.to_string())
    }
}

/// Outgoing JSON-RPC envelope
///
/// `id` present means a reply is expected; absent means a notification.
///
/// # Examples
///
/// ```rust
/// use jsonservices_core::RequestEnvelope;
/// use serde_json::json;
///
/// let call = RequestEnvelope::call("rpc.version", json!({}), "1");
/// assert_eq!(
///     serde_json::to_value(&call).unwrap(),
///     json!({"jsonrpc": "2.0", "method": "rpc.version", "params": {}, "id": "1"})
/// );
///
/// let note = RequestEnvelope::notification("rpc.logout", json!({}));
/// assert!(!serde_json::to_string(&note).unwrap().contains("\"id\""));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Always "2.0"
    pub jsonrpc: String,

    /// Wire name of the message
    pub method: String,

    /// Serialized message body
    pub params: Value,

    /// Correlation ID, omitted for notifications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl RequestEnvelope {
    /// Create a correlated call envelope
    pub fn call(method: impl Into<String>, params: Value, id: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id: Some(id.into()),
        }
    }

    /// Create a notification envelope
    pub fn notification(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id: None,
        }
    }
}

/// Any frame received from the server, before routing
///
/// Every field is optional so that replies, errors and pushed events share one
/// parse step. [`IncomingFrame::classify`] decides what the frame is.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct IncomingFrame {
    /// Protocol version, not validated
    #[serde(default)]
    pub jsonrpc: Option<String>,

    /// Correlation ID of a reply
    #[serde(default)]
    pub id: Option<Id>,

    /// Event name of a pushed notification
    #[serde(default)]
    pub method: Option<String>,

    /// Event arguments of a pushed notification
    #[serde(default)]
    pub params: Option<Value>,

    /// Successful reply payload
    #[serde(default)]
    pub result: Option<Value>,

    /// Failed reply payload, kept raw until the frame is routed
    #[serde(default)]
    pub error: Option<Value>,
}

/// A routed incoming frame
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// Reply to a pending call
    Reply {
        /// Normalized correlation key
        id: String,
        /// `Ok(result)` when the frame has no error field, the server error otherwise
        outcome: Result<Value, JsonRpcErrorData>,
    },
    /// Event pushed by the server
    Event {
        /// Event name
        name: String,
        /// Event arguments, `Value::Null` when absent
        args: Value,
    },
    /// Frame with neither a usable ID nor a method
    Unroutable,
}

impl IncomingFrame {
    /// Decide how the frame is routed
    ///
    /// A usable `id` wins over `method`: such a frame is always a reply. The
    /// error field, when present, takes precedence over `result`.
    pub fn classify(self) -> Incoming {
        if let Some(id) = self.id.as_ref().and_then(Id::correlation_key) {
            let outcome = match self.error {
                Some(error) => Err(JsonRpcErrorData::from_reply(error)),
                None => Ok(self.result.unwrap_or(Value::Null)),
            };
            return Incoming::Reply { id, outcome };
        }

        match self.method {
            Some(name) => Incoming::Event {
                name,
                args: self.params.unwrap_or(Value::Null),
            },
            None => Incoming::Unroutable,
        }
    }
}
