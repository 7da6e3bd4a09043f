//! Correlation of outgoing calls with their replies
//!
//! # Call Lifecycle
//!
//! 1. **Generate ID**: [`MessageIdGenerator`] hands out the next ID
//! 2. **Register**: the caller's reply channel is stored under that ID
//! 3. **Send**: the envelope goes out on the transport
//! 4. **Settle**: the matching reply removes the entry, then completes it
//!
//! Registration happens strictly before the send, so even an immediate reply
//! finds its entry. Every entry is removed exactly once: by its reply, by a
//! failed send, or by [`PendingCalls::fail_all`] when the connection closes.
//!
//! Both types are owned by the engine task and need no locking.

use jsonservices_core::{Error, JsonRpcErrorData, Result};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::oneshot;

/// Channel a settled call is delivered on
pub type ReplySender = oneshot::Sender<Result<Value>>;

/// Monotonic ID source shared by calls and subscriptions
///
/// IDs start at `"1"` and are never reused for the lifetime of the client.
#[derive(Debug, Default)]
pub struct MessageIdGenerator {
    last: u64,
}

impl MessageIdGenerator {
    /// Create a generator whose first ID is `"1"`
    pub fn new() -> Self {
        Self::default()
    }

    /// Next unused ID
    pub fn next_id(&mut self) -> String {
        self.last += 1;
        self.last.to_string()
    }
}

/// A call waiting for its reply
#[derive(Debug)]
struct PendingCall {
    method: String,
    tx: ReplySender,
}

impl PendingCall {
    fn settle(self, result: Result<Value>) {
        // the caller may have stopped waiting; nothing to do then
        let _ = self.tx.send(result);
    }
}

/// Outstanding calls keyed by correlation ID
#[derive(Debug, Default)]
pub struct PendingCalls {
    pending: HashMap<String, PendingCall>,
}

impl PendingCalls {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a call before sending it
    ///
    /// IDs come from [`MessageIdGenerator`] and never repeat, so an existing
    /// entry is not expected; if one exists it is rejected and replaced.
    pub fn register(&mut self, id: String, method: impl Into<String>, tx: ReplySender) {
        let call = PendingCall {
            method: method.into(),
            tx,
        };
        if let Some(previous) = self.pending.insert(id, call) {
            previous.settle(Err(Error::Internal("duplicate correlation id".into())));
        }
    }

    /// Settle the call matching `id` with a server reply
    ///
    /// Returns the settled call's method, or `None` when no call was waiting
    /// (already settled or never sent), in which case the reply is dropped.
    pub fn settle(&mut self, id: &str, outcome: std::result::Result<Value, JsonRpcErrorData>) -> Option<String> {
        let call = self.pending.remove(id)?;
        let method = call.method.clone();
        call.settle(outcome.map_err(Error::JsonRpc));
        Some(method)
    }

    /// Reject a call that could not be sent
    pub fn fail(&mut self, id: &str, error: Error) -> bool {
        match self.pending.remove(id) {
            Some(call) => {
                call.settle(Err(error));
                true
            }
            None => false,
        }
    }

    /// Reject every outstanding call with the same error
    ///
    /// Returns the number of calls rejected.
    pub fn fail_all(&mut self, error: &Error) -> usize {
        let count = self.pending.len();
        for (_, call) in self.pending.drain() {
            call.settle(Err(error.clone()));
        }
        count
    }

    /// Whether a call with `id` is waiting
    pub fn contains(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    /// Number of outstanding calls
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no call is outstanding
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
