//! Connection state machine
//!
//! The engine moves through these states:
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──open──▶ Authenticating ──session──▶ Connected
//!      ▲                        │                      │                       │
//!      └────── error ───────────┴──── auth failure ────┴──── close ────────────┘
//!                                                                 Connected ──disconnect──▶ Closing ──▶ Disconnected
//! ```
//!
//! [`ConnectionManager`] owns the current [`ConnectionStatus`] and the
//! reconnection strategy, and publishes every change on a `watch` channel so
//! client handles can read the status without talking to the engine.

use crate::reconnect::ReconnectionStrategy;
use std::time::Duration;
use tokio::sync::watch;

/// Lifecycle state of the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No transport
    Disconnected,
    /// Transport handshake in flight
    Connecting,
    /// Transport open, authentication call in flight
    Authenticating,
    /// Authenticated and usable
    Connected,
    /// Logging out and closing
    Closing,
}

impl ConnectionState {
    /// Numeric value reported by the connection state gauge
    pub fn as_gauge(self) -> u64 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Authenticating => 2,
            ConnectionState::Connected => 3,
            ConnectionState::Closing => 4,
        }
    }

    /// Whether a transport is open and may carry frames
    ///
    /// True while authenticating: the authentication call itself travels on the
    /// not-yet-settled connection.
    pub fn is_open(self) -> bool {
        matches!(self, ConnectionState::Authenticating | ConnectionState::Connected)
    }
}

/// Snapshot of the connection published to client handles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    /// Current state
    pub state: ConnectionState,
    /// Session of the current connection; only set while connected
    pub session_id: Option<String>,
    /// Reconnection attempts since the last successful authentication
    pub reconnect_count: u32,
}

impl ConnectionStatus {
    /// Whether the connection is authenticated and usable
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            session_id: None,
            reconnect_count: 0,
        }
    }
}

/// Owner of the connection status and reconnection policy
pub struct ConnectionManager {
    status: ConnectionStatus,
    strategy: Option<Box<dyn ReconnectionStrategy>>,
    publisher: watch::Sender<ConnectionStatus>,
}

impl ConnectionManager {
    /// Create a manager; `None` disables reconnection
    pub fn new(strategy: Option<Box<dyn ReconnectionStrategy>>) -> (Self, watch::Receiver<ConnectionStatus>) {
        let (publisher, receiver) = watch::channel(ConnectionStatus::default());
        let manager = Self {
            status: ConnectionStatus::default(),
            strategy,
            publisher,
        };
        (manager, receiver)
    }

    /// Current snapshot
    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        self.status.state
    }

    /// Another receiver of the published status
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.publisher.subscribe()
    }

    /// Transport handshake started
    pub fn connecting(&mut self) {
        self.transition(ConnectionState::Connecting);
    }

    /// Transport open, authentication started
    pub fn authenticating(&mut self) {
        self.transition(ConnectionState::Authenticating);
    }

    /// Authentication succeeded
    ///
    /// Stores the session and resets the reconnect counter and strategy.
    pub fn connected(&mut self, session_id: String) {
        self.status.session_id = Some(session_id);
        self.status.reconnect_count = 0;
        if let Some(strategy) = self.strategy.as_mut() {
            strategy.reset();
        }
        self.transition(ConnectionState::Connected);
    }

    /// Logout in progress
    pub fn closing(&mut self) {
        self.transition(ConnectionState::Closing);
    }

    /// Transport gone; the session is cleared with it
    pub fn disconnected(&mut self) {
        self.status.session_id = None;
        self.transition(ConnectionState::Disconnected);
    }

    /// Count an abnormal close and ask the strategy when to reconnect
    ///
    /// The counter is bumped even when reconnection is disabled or exhausted.
    pub fn next_reconnect_delay(&mut self) -> Option<Duration> {
        self.status.reconnect_count = self.status.reconnect_count.saturating_add(1);
        let attempt = self.status.reconnect_count;
        self.publish();
        self.strategy.as_mut()?.next_delay(attempt)
    }

    /// Whether a reconnection strategy is configured
    pub fn reconnect_enabled(&self) -> bool {
        self.strategy.is_some()
    }

    fn transition(&mut self, state: ConnectionState) {
        tracing::trace!(from = ?self.status.state, to = ?state, "connection state change");
        self.status.state = state;
        self.publish();
    }

    fn publish(&self) {
        self.publisher.send_replace(self.status.clone());
    }
}
