//! Codec for outgoing envelopes and incoming frames
//!
//! Encoding failures become [`Error::Serialization`]; anything unparseable on the
//! way in becomes [`Error::Parse`], which the client reports through its
//! diagnostic hook and then drops.
//!
//! # Examples
//!
//! ```rust
//! use jsonservices_core::{codec, Incoming, RequestEnvelope};
//! use serde_json::json;
//!
//! let text = codec::encode_request(&RequestEnvelope::call("rpc.version", json!({}), "1")).unwrap();
//! assert!(text.contains("\"id\":\"1\""));
//!
//! let incoming = codec::decode(r#"{"id":"1","result":{"ProductName":"svc"}}"#).unwrap();
//! assert!(matches!(incoming, Incoming::Reply { .. }));
//! ```

use crate::error::{Error, Result};
use crate::message::Message;
use crate::types::{Incoming, IncomingFrame, RequestEnvelope};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Encode any serializable value to a JSON string
pub fn encode<T: Serialize>(msg: &T) -> Result<String> {
    serde_json::to_string(msg).map_err(|e| Error::Serialization(e.to_string()))
}

/// Encode an outgoing envelope
pub fn encode_request(request: &RequestEnvelope) -> Result<String> {
    encode(request)
}

/// Serialize a message body into envelope params
pub fn encode_params<M: Message>(message: &M) -> Result<Value> {
    serde_json::to_value(message).map_err(|e| Error::Serialization(e.to_string()))
}

/// Convert a reply payload into the message's response type
pub fn decode_result<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::Serialization(e.to_string()))
}

/// Parse and classify an incoming text frame
///
/// Batches (JSON arrays) are not part of the protocol and fail to parse.
pub fn decode(data: &str) -> Result<Incoming> {
    decode_frame(data).map(IncomingFrame::classify)
}

/// Parse an incoming text frame without routing it
pub fn decode_frame(data: &str) -> Result<IncomingFrame> {
    serde_json::from_str(data).map_err(|e| Error::Parse(format!("{}: {}", e, truncate(data))))
}

/// Decode a binary frame as UTF-8 text, replacing invalid sequences
pub fn text_from_binary(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}

fn truncate(data: &str) -> &str {
    const LIMIT: usize = 128;
    match data.char_indices().nth(LIMIT) {
        Some((index, _)) => &data[..index],
        None => data,
    }
}
