//! Derive macros for jsonservices messages
//!
//! # `#[derive(Message)]`
//!
//! Implements `jsonservices_core::Message` for a request or notification type,
//! so the client can resolve its wire name without a registry entry.
//!
//! ```ignore
//! use jsonservices_macros::Message;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Message)]
//! #[message(name = "JsonServices.Tests.Messages.GetVersion", response = GetVersionResponse)]
//! struct GetVersion {
//!     #[serde(rename = "IsInternal")]
//!     is_internal: bool,
//! }
//!
//! #[derive(Deserialize)]
//! struct GetVersionResponse {
//!     #[serde(rename = "Version")]
//!     version: String,
//! }
//! ```
//!
//! Both attribute keys are optional:
//!
//! - `name` defaults to the type's identifier
//! - `response` defaults to `jsonservices_core::Void`, for messages whose reply
//!   carries nothing of interest

mod message;

use proc_macro::TokenStream;

/// Derive `jsonservices_core::Message`
///
/// Accepts a `#[message(name = "...", response = Type)]` attribute.
#[proc_macro_derive(Message, attributes(message))]
pub fn derive_message(input: TokenStream) -> TokenStream {
    message::derive_message_impl(input)
}
