//! Built-in protocol messages
//!
//! These are the service-level operations every server exposes: authentication,
//! logout, event subscription and version discovery. Field names follow the
//! server's PascalCase convention.

use crate::message::{Message, Void};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameter key holding the user name
pub const USER_NAME_KEY: &str = "UserName";

/// Parameter key holding the password
pub const PASSWORD_KEY: &str = "Password";

/// Authenticates the connection and opens a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthRequest {
    /// Flat credential parameters, e.g. `UserName` and `Password`
    pub parameters: BTreeMap<String, String>,
}

impl AuthRequest {
    /// Wire name of the authenticate operation
    pub const NAME: &'static str = "rpc.authenticate";

    /// Create a request carrying the given parameters
    pub fn new(parameters: BTreeMap<String, String>) -> Self {
        Self { parameters }
    }
}

impl Message for AuthRequest {
    type Response = AuthResponse;

    fn message_name(&self) -> Option<&str> {
        Some(Self::NAME)
    }
}

/// Reply to [`AuthRequest`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AuthResponse {
    /// Parameters echoed or added by the server
    pub parameters: Option<BTreeMap<String, String>>,

    /// Session opened for this connection
    pub session_id: String,

    /// Identity the server resolved, if it reports one
    pub authenticated_identity: Option<AuthenticatedIdentity>,
}

/// Identity attached to an authenticated session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AuthenticatedIdentity {
    /// User name
    pub name: String,
    /// Authentication scheme used by the server
    pub authentication_type: String,
    /// Whether the identity is authenticated
    pub is_authenticated: bool,
}

/// Ends the session; sent as a notification before closing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogoutMessage {}

impl LogoutMessage {
    /// Wire name of the logout operation
    pub const NAME: &'static str = "rpc.logout";
}

impl Message for LogoutMessage {
    type Response = Void;

    fn message_name(&self) -> Option<&str> {
        Some(Self::NAME)
    }
}

/// One entry of a [`SubscriptionMessage`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubscriptionDescriptor {
    /// Client-assigned subscription ID
    pub subscription_id: String,

    /// `true` to subscribe, `false` to unsubscribe
    pub enabled: bool,

    /// Event the subscription listens to
    pub event_name: String,

    /// Server-side filter, omitted when unsubscribing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_filter: Option<BTreeMap<String, String>>,
}

/// Enables or disables event subscriptions on the server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubscriptionMessage {
    /// Descriptors to apply
    pub subscriptions: Vec<SubscriptionDescriptor>,
}

impl SubscriptionMessage {
    /// Wire name of the subscription operation
    pub const NAME: &'static str = "rpc.subscription";
}

impl Message for SubscriptionMessage {
    type Response = Void;

    fn message_name(&self) -> Option<&str> {
        Some(Self::NAME)
    }
}

/// Asks the server for its product and engine versions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionRequest {}

impl VersionRequest {
    /// Wire name of the version operation
    pub const NAME: &'static str = "rpc.version";
}

impl Message for VersionRequest {
    type Response = VersionResponse;

    fn message_name(&self) -> Option<&str> {
        Some(Self::NAME)
    }
}

/// Reply to [`VersionRequest`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct VersionResponse {
    /// Name of the hosting product
    pub product_name: String,
    /// Version of the hosting product
    pub product_version: String,
    /// Version of the service engine
    pub engine_version: String,
}
