//! OpenTelemetry metrics for the client
//!
//! Instruments are created from the global meter provider, so nothing is
//! exported until the application installs one (see
//! `jsonservices_core::init_observability`).
//!
//! | Instrument | Kind | Attributes |
//! |---|---|---|
//! | `jsonservices.client.connection.state` | gauge | |
//! | `jsonservices.client.calls.total` | counter | `method`, `status` |
//! | `jsonservices.client.call.duration` | histogram (s) | `method`, `status` |
//! | `jsonservices.client.notifications.sent` | counter | `method` |
//! | `jsonservices.client.errors.total` | counter | `kind` |
//! | `jsonservices.client.reconnection.attempts` | counter | |
//! | `jsonservices.client.reconnection.success` | counter | |
//! | `jsonservices.client.events.received` | counter | `event` |
//! | `jsonservices.client.subscriptions.active` | up/down counter | |

use crate::connection_state::ConnectionState;
use jsonservices_core::Error;
use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, Meter, UpDownCounter},
    InstrumentationScope, KeyValue,
};

/// Client instruments
pub struct ClientMetrics {
    connection_state: Gauge<u64>,
    calls_total: Counter<u64>,
    call_duration: Histogram<f64>,
    notifications_sent: Counter<u64>,
    errors_total: Counter<u64>,
    reconnection_attempts: Counter<u64>,
    reconnection_success: Counter<u64>,
    events_received: Counter<u64>,
    subscriptions_active: UpDownCounter<i64>,
}

impl ClientMetrics {
    /// Instruments from the global provider under the given scope name
    pub fn new(service_name: impl Into<String>) -> Self {
        let scope = InstrumentationScope::builder(service_name.into())
            .with_version(env!("CARGO_PKG_VERSION"))
            .build();
        Self::with_meter(&global::meter_with_scope(scope))
    }

    /// Instruments from a specific meter
    pub fn with_meter(meter: &Meter) -> Self {
        Self {
            connection_state: meter
                .u64_gauge("jsonservices.client.connection.state")
                .with_description(
                    "Connection state (0=disconnected, 1=connecting, 2=authenticating, 3=connected, 4=closing)",
                )
                .build(),
            calls_total: meter
                .u64_counter("jsonservices.client.calls.total")
                .with_description("Calls sent, by method and outcome")
                .build(),
            call_duration: meter
                .f64_histogram("jsonservices.client.call.duration")
                .with_description("Time from call to settlement")
                .with_unit("s")
                .build(),
            notifications_sent: meter
                .u64_counter("jsonservices.client.notifications.sent")
                .with_description("One-way notifications sent")
                .build(),
            errors_total: meter
                .u64_counter("jsonservices.client.errors.total")
                .with_description("Errors surfaced by the client, by kind")
                .build(),
            reconnection_attempts: meter
                .u64_counter("jsonservices.client.reconnection.attempts")
                .with_description("Reconnection attempts started")
                .build(),
            reconnection_success: meter
                .u64_counter("jsonservices.client.reconnection.success")
                .with_description("Reconnections that authenticated again")
                .build(),
            events_received: meter
                .u64_counter("jsonservices.client.events.received")
                .with_description("Server events received, by name")
                .build(),
            subscriptions_active: meter
                .i64_up_down_counter("jsonservices.client.subscriptions.active")
                .with_description("Subscriptions currently registered")
                .build(),
        }
    }

    /// Record the current connection state
    pub fn update_connection_state(&self, state: ConnectionState) {
        self.connection_state.record(state.as_gauge(), &[]);
    }

    /// Record a settled call
    pub fn record_call(&self, method: &str, succeeded: bool, duration_secs: f64) {
        let status = if succeeded { "success" } else { "error" };
        let attributes = [
            KeyValue::new("method", method.to_string()),
            KeyValue::new("status", status),
        ];
        self.calls_total.add(1, &attributes);
        self.call_duration.record(duration_secs, &attributes);
    }

    /// Record a notification
    pub fn record_notification(&self, method: &str) {
        self.notifications_sent
            .add(1, &[KeyValue::new("method", method.to_string())]);
    }

    /// Record a surfaced error
    pub fn record_error(&self, error: &Error) {
        self.errors_total.add(1, &[KeyValue::new("kind", error.kind())]);
    }

    /// Record a reconnection attempt
    pub fn record_reconnection_attempt(&self) {
        self.reconnection_attempts.add(1, &[]);
    }

    /// Record a reconnection that authenticated
    pub fn record_reconnection_success(&self) {
        self.reconnection_success.add(1, &[]);
    }

    /// Record a received server event
    pub fn record_event(&self, event_name: &str) {
        self.events_received
            .add(1, &[KeyValue::new("event", event_name.to_string())]);
    }

    /// Track subscription registrations (`+1`) and removals (`-1`)
    pub fn record_subscriptions(&self, delta: i64) {
        self.subscriptions_active.add(delta, &[]);
    }
}

impl std::fmt::Debug for ClientMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientMetrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_provider() {
        let metrics = ClientMetrics::new("test-client");
        metrics.update_connection_state(ConnectionState::Connecting);
        metrics.update_connection_state(ConnectionState::Connected);
        metrics.record_call("rpc.version", true, 0.02);
        metrics.record_call("GetVersion", false, 0.5);
        metrics.record_notification("rpc.logout");
        metrics.record_error(&Error::NotConnected);
        metrics.record_reconnection_attempt();
        metrics.record_reconnection_success();
        metrics.record_event("OrderShipped");
        metrics.record_subscriptions(1);
        metrics.record_subscriptions(-1);
    }

    #[test]
    fn test_with_custom_meter() {
        let meter = global::meter("test-client-meter");
        let metrics = ClientMetrics::with_meter(&meter);
        metrics.record_call("Ping", true, 0.001);
    }
}
