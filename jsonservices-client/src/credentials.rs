//! Authentication strategies
//!
//! Right after the transport opens, the engine calls
//! [`Credentials::authenticate`] exactly once and waits for a session ID before
//! the connection counts as established. The client passed in is a handshake
//! handle: its calls go straight to the open transport instead of waiting for
//! the connection to finish.
//!
//! Any error aborts the connection attempt. Server errors keep their own code;
//! everything else is reported with the connection-failed code.

use crate::client::JsonClient;
use async_trait::async_trait;
use jsonservices_core::{AuthRequest, Result, PASSWORD_KEY, USER_NAME_KEY};
use std::collections::BTreeMap;

/// Produces a session for a freshly opened connection
#[async_trait]
pub trait Credentials: Send + Sync {
    /// Authenticate and return the session ID
    async fn authenticate(&self, client: &JsonClient) -> Result<String>;
}

/// Default credentials: a flat parameter map sent with `rpc.authenticate`
///
/// # Examples
///
/// ```rust
/// use jsonservices_client::CredentialsBase;
///
/// let credentials = CredentialsBase::with_user("root", "s3cr3t").parameter("Tenant", "acme");
/// assert_eq!(credentials.parameters().get("UserName").map(String::as_str), Some("root"));
/// assert_eq!(credentials.parameters().len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialsBase {
    parameters: BTreeMap<String, String>,
}

impl CredentialsBase {
    /// Anonymous credentials, no parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// User name and password under the `UserName` / `Password` keys
    pub fn with_user(user_name: impl Into<String>, password: impl Into<String>) -> Self {
        Self::new()
            .parameter(USER_NAME_KEY, user_name)
            .parameter(PASSWORD_KEY, password)
    }

    /// Add a parameter
    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// The parameters sent to the server
    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }
}

#[async_trait]
impl Credentials for CredentialsBase {
    async fn authenticate(&self, client: &JsonClient) -> Result<String> {
        let response = client.call(&AuthRequest::new(self.parameters.clone())).await?;
        Ok(response.session_id)
    }
}
