//! Event subscriptions
//!
//! A [`Subscription`] is what the caller asks for: an event name, a handler and
//! an optional [`EventFilter`]. Once the client assigns it an ID it becomes a
//! [`ClientSubscription`], which knows how to describe itself to the server and
//! lives in the engine's [`ClientSubscriptionManager`] until it is removed.
//!
//! Handlers are plain synchronous callbacks run on the engine task, in the order
//! their subscriptions were added. They must not block; a handler that needs to
//! await should spawn a task.

use crate::event_filter::EventFilter;
use jsonservices_core::{SubscriptionDescriptor, SubscriptionMessage};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Callback invoked with the arguments of a matching event
pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Request to receive a named server event
///
/// # Examples
///
/// ```rust
/// use jsonservices_client::{EventFilter, Subscription};
///
/// let subscription = Subscription::new("OrderShipped", |args| {
///     println!("shipped: {}", args);
/// })
/// .with_filter(EventFilter::new().with("Warehouse", "north"));
/// assert_eq!(subscription.event_name(), "OrderShipped");
/// ```
#[derive(Clone)]
pub struct Subscription {
    event_name: String,
    event_filter: Option<EventFilter>,
    handler: EventHandler,
}

impl Subscription {
    /// Subscribe to `event_name` with `handler`
    pub fn new<F>(event_name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        Self {
            event_name: event_name.into(),
            event_filter: None,
            handler: Arc::new(handler),
        }
    }

    /// Only receive events whose arguments match `filter`
    pub fn with_filter(mut self, filter: EventFilter) -> Self {
        self.event_filter = Some(filter);
        self
    }

    /// Event name
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// Filter, if any
    pub fn event_filter(&self) -> Option<&EventFilter> {
        self.event_filter.as_ref()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("event_name", &self.event_name)
            .field("event_filter", &self.event_filter)
            .finish_non_exhaustive()
    }
}

/// A subscription with its client-assigned ID
#[derive(Clone)]
pub struct ClientSubscription {
    subscription_id: String,
    event_name: String,
    event_filter: Option<EventFilter>,
    handler: EventHandler,
}

impl ClientSubscription {
    /// Attach an ID to a subscription request
    pub fn new(subscription_id: impl Into<String>, subscription: Subscription) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            event_name: subscription.event_name,
            event_filter: subscription.event_filter,
            handler: subscription.handler,
        }
    }

    /// Client-assigned ID
    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// Event name
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// Message enabling this subscription on the server, filter included
    pub fn subscription_message(&self) -> SubscriptionMessage {
        SubscriptionMessage {
            subscriptions: vec![SubscriptionDescriptor {
                subscription_id: self.subscription_id.clone(),
                enabled: true,
                event_name: self.event_name.clone(),
                event_filter: self.event_filter.clone().map(Into::into),
            }],
        }
    }

    /// Message disabling this subscription on the server
    pub fn unsubscription_message(&self) -> SubscriptionMessage {
        SubscriptionMessage {
            subscriptions: vec![SubscriptionDescriptor {
                subscription_id: self.subscription_id.clone(),
                enabled: false,
                event_name: self.event_name.clone(),
                event_filter: None,
            }],
        }
    }

    /// Whether the event arguments pass this subscription's filter
    pub fn matches(&self, event_args: &Value) -> bool {
        crate::event_filter::matches(self.event_filter.as_ref(), Some(event_args))
    }

    /// Run the handler; a panicking handler is logged and otherwise ignored
    pub fn invoke(&self, event_args: &Value) {
        let result = catch_unwind(AssertUnwindSafe(|| (self.handler)(event_args)));
        if result.is_err() {
            tracing::error!(
                subscription_id = %self.subscription_id,
                event = %self.event_name,
                "event handler panicked"
            );
        }
    }
}

impl fmt::Debug for ClientSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSubscription")
            .field("subscription_id", &self.subscription_id)
            .field("event_name", &self.event_name)
            .field("event_filter", &self.event_filter)
            .finish_non_exhaustive()
    }
}

/// Local registry of active subscriptions
///
/// Owned by the engine task, so no locking is involved.
#[derive(Debug, Default)]
pub struct ClientSubscriptionManager {
    subscriptions: HashMap<String, ClientSubscription>,
    by_event: HashMap<String, Vec<String>>,
}

impl ClientSubscriptionManager {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription; returns the ID that removes it again
    ///
    /// Adding an ID that is already present replaces the earlier subscription.
    pub fn add(&mut self, subscription: ClientSubscription) -> String {
        let id = subscription.subscription_id.clone();
        self.remove(&id);

        self.by_event
            .entry(subscription.event_name.clone())
            .or_default()
            .push(id.clone());
        self.subscriptions.insert(id.clone(), subscription);
        id
    }

    /// Remove a subscription; returns it if it was registered
    pub fn remove(&mut self, subscription_id: &str) -> Option<ClientSubscription> {
        let subscription = self.subscriptions.remove(subscription_id)?;
        if let Some(ids) = self.by_event.get_mut(&subscription.event_name) {
            ids.retain(|id| id != subscription_id);
            if ids.is_empty() {
                self.by_event.remove(&subscription.event_name);
            }
        }
        Some(subscription)
    }

    /// Invoke every matching handler for the event; returns how many ran
    pub fn broadcast(&self, event_name: &str, event_args: &Value) -> usize {
        let Some(ids) = self.by_event.get(event_name) else {
            return 0;
        };

        let mut invoked = 0;
        for subscription in ids.iter().filter_map(|id| self.subscriptions.get(id)) {
            if subscription.matches(event_args) {
                subscription.invoke(event_args);
                invoked += 1;
            }
        }
        invoked
    }

    /// Number of active subscriptions
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether no subscription is active
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Event names with at least one subscription
    pub fn event_names(&self) -> Vec<String> {
        self.by_event.keys().cloned().collect()
    }
}
