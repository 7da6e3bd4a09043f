//! Message capability and wire-name resolution
//!
//! Every request or notification body implements [`Message`]. The wire
//! `method` of a message is resolved in this order:
//!
//! 1. the name the message declares through [`Message::message_name`]
//! 2. the name registered for its concrete type in a [`MessageRegistry`]
//! 3. otherwise resolution fails with [`Error::UnknownMessageName`]
//!
//! An absent message resolves to the literal `"null"`.
//!
//! # Examples
//!
//! ```rust
//! use jsonservices_core::{resolve_name, Message, MessageRegistry, Void};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Ping;
//!
//! impl Message for Ping {
//!     type Response = Void;
//! }
//!
//! let mut registry = MessageRegistry::new();
//! registry.register::<Ping>("Ping");
//! assert_eq!(resolve_name(&registry, Some(&Ping)).unwrap(), "Ping");
//! assert_eq!(resolve_name(&registry, None::<&Ping>).unwrap(), "null");
//! ```

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::{type_name, TypeId};
use std::collections::HashMap;

/// Response type of messages whose reply carries nothing of interest
///
/// Deserializes from any JSON value, including `null` and objects.
pub type Void = serde::de::IgnoredAny;

/// A request or notification body with a wire name
pub trait Message: Serialize + Send + Sync + 'static {
    /// Type the reply's `result` deserializes into
    type Response: DeserializeOwned + Send + 'static;

    /// Wire name declared by the message itself
    ///
    /// Returning `None` defers to the [`MessageRegistry`].
    fn message_name(&self) -> Option<&str> {
        None
    }
}

/// Wire names for message types that don't declare one
#[derive(Debug, Clone, Default)]
pub struct MessageRegistry {
    names: HashMap<TypeId, String>,
}

impl MessageRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the wire name of `M`
    ///
    /// Registering the same type twice replaces the earlier name.
    pub fn register<M: 'static>(&mut self, name: impl Into<String>) {
        self.names.insert(TypeId::of::<M>(), name.into());
    }

    /// Look up the registered name of `M`
    pub fn get<M: 'static>(&self) -> Option<&str> {
        self.names.get(&TypeId::of::<M>()).map(String::as_str)
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no type is registered
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Resolve the wire name of a message
pub fn resolve_name<M: Message>(registry: &MessageRegistry, message: Option<&M>) -> Result<String> {
    let Some(message) = message else {
        return Ok("null".to_string());
    };

    if let Some(name) = message.message_name() {
        return Ok(name.to_string());
    }

    registry
        .get::<M>()
        .map(str::to_string)
        .ok_or_else(|| Error::UnknownMessageName(type_name::<M>().to_string()))
}
