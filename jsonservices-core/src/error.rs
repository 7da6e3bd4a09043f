//! Error types for jsonservices
//!
//! Two types live here:
//!
//! - **Error**: everything a client operation can fail with (uses thiserror)
//! - **JsonRpcErrorData**: the `error` object of a JSON-RPC reply, as sent by the server
//!
//! # Error Codes
//!
//! Besides the standard JSON-RPC 2.0 codes, the client reports two of its own:
//!
//! - `-32003` ([`CONNECTION_CLOSED`]): the connection went away while a call was pending
//! - `-32004` ([`CONNECTION_FAILED`]): the connection or its authentication step failed
//!
//! Both clean and abnormal closes carry `-32003`; only the message differs.
//!
//! # Examples
//!
//! ```rust
//! use jsonservices_core::{Error, CONNECTION_CLOSED};
//!
//! let error = Error::ConnectionClosed { code: 1006, reason: String::new() };
//! assert_eq!(error.code(), Some(CONNECTION_CLOSED));
//! assert_eq!(error.to_string(), "Connection was aborted. Error code: 1006");
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Code carried by every call rejected because the connection closed
pub const CONNECTION_CLOSED: i32 = -32003;

/// Code carried by failed connection attempts, including failed authentication
pub const CONNECTION_FAILED: i32 = -32004;

/// WebSocket close code of an intentional, clean close
pub const NORMAL_CLOSURE: u16 = 1000;

/// Result type for jsonservices operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for jsonservices operations
///
/// The type is `Clone` because a single transport close is fanned out to every
/// pending call, each of which receives its own copy.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Error reported by the server in the `error` field of a reply
    #[error("{0}")]
    JsonRpc(#[from] JsonRpcErrorData),

    /// The transport could not be opened
    #[error("Couldn't connect to {url}{}", suffix(.message))]
    ConnectFailed {
        /// Endpoint the client tried to reach
        url: String,
        /// Transport-level description, may be empty
        message: String,
    },

    /// The credentials failed to produce a session
    #[error("{0}")]
    AuthenticationFailed(String),

    /// The connection closed while the operation was in flight
    ///
    /// A clean close (code 1000) and an abnormal one only differ in wording.
    #[error("{}", closed_message(.code))]
    ConnectionClosed {
        /// WebSocket close code
        code: u16,
        /// Close reason sent by the peer, if any
        reason: String,
    },

    /// A message was about to be sent but no transport is available
    #[error("WebSocket not connected")]
    NotConnected,

    /// No wire name could be found for a message type
    #[error("{0} doesn't declare a message name and isn't registered")]
    UnknownMessageName(String),

    /// An incoming frame was not valid JSON-RPC
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization or deserialization of a payload failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// WebSocket transport layer error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Unexpected internal failure, such as the engine task having stopped
    #[error("Internal error: {0}")]
    Internal(String),
}

fn suffix(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!(": {}", message)
    }
}

fn closed_message(code: &u16) -> String {
    if *code == NORMAL_CLOSURE {
        "Connection was closed.".to_string()
    } else {
        format!("Connection was aborted. Error code: {}", code)
    }
}

impl Error {
    /// Machine-readable code of this error, if it has one
    ///
    /// Server errors keep the server's own code.
    pub fn code(&self) -> Option<i32> {
        match self {
            Error::JsonRpc(data) => Some(data.code),
            Error::ConnectFailed { .. } | Error::AuthenticationFailed(_) => Some(CONNECTION_FAILED),
            Error::ConnectionClosed { .. } => Some(CONNECTION_CLOSED),
            Error::Parse(_) => Some(JsonRpcErrorData::PARSE_ERROR),
            _ => None,
        }
    }

    /// Short label used for logs and metric attributes
    pub fn kind(&self) -> &'static str {
        match self {
            Error::JsonRpc(_) => "server",
            Error::ConnectFailed { .. } => "connect",
            Error::AuthenticationFailed(_) => "authentication",
            Error::ConnectionClosed { .. } => "closed",
            Error::NotConnected => "not_connected",
            Error::UnknownMessageName(_) => "message_name",
            Error::Parse(_) => "parse",
            Error::Serialization(_) => "serialization",
            Error::WebSocket(_) => "websocket",
            Error::Internal(_) => "internal",
        }
    }

    /// Whether this error came from the server rather than from the client
    pub fn is_server_error(&self) -> bool {
        matches!(self, Error::JsonRpc(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// JSON-RPC 2.0 error object as carried in a reply
///
/// # Examples
///
/// ```rust
/// use jsonservices_core::JsonRpcErrorData;
/// use serde_json::json;
///
/// let error = JsonRpcErrorData::with_data(-32603, "Internal error", json!({"trace": "..."}));
/// assert_eq!(error.to_string(), "[-32603] Internal error");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorData {
    /// Numeric error code
    pub code: i32,

    /// Human-readable error message
    pub message: String,

    /// Optional additional error information
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcErrorData {
    /// Invalid JSON was received
    pub const PARSE_ERROR: i32 = -32700;
    /// The JSON sent is not a valid request object
    pub const INVALID_REQUEST: i32 = -32600;
    /// The method does not exist
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid method parameters
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal JSON-RPC error
    pub const INTERNAL_ERROR: i32 = -32603;

    /// Create an error with code and message
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create an error carrying additional data
    pub fn with_data(code: i32, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Create a parse error (-32700)
    pub fn parse_error() -> Self {
        Self::new(Self::PARSE_ERROR, "Parse error")
    }

    /// Create an invalid request error (-32600)
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::new(Self::INVALID_REQUEST, msg)
    }

    /// Create a method not found error (-32601)
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::new(Self::METHOD_NOT_FOUND, format!("Method not found: {}", method.into()))
    }

    /// Create an invalid params error (-32602)
    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::new(Self::INVALID_PARAMS, msg)
    }

    /// Create an internal error (-32603)
    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::new(Self::INTERNAL_ERROR, msg)
    }

    /// Read the `error` member of a reply
    ///
    /// Objects that are not well-formed error objects become an internal
    /// error carrying the raw value as data, keeping any usable message.
    pub fn from_reply(value: serde_json::Value) -> Self {
        if let Ok(error) = serde_json::from_value::<Self>(value.clone()) {
            return error;
        }
        let message = match &value {
            serde_json::Value::String(s) => s.clone(),
            other => other
                .get("message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("Internal error")
                .to_string(),
        };
        Self::with_data(Self::INTERNAL_ERROR, message, value)
    }
}

impl std::fmt::Display for JsonRpcErrorData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcErrorData {}
