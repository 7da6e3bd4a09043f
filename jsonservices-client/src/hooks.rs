//! Diagnostic and trace hooks
//!
//! The diagnostic hook sees every error the client surfaces internally: parse
//! errors, server errors, authentication and connection failures. The trace
//! hook sees every raw frame in both directions. Both are optional and purely
//! observational; leaving them unset changes nothing.
//!
//! Hooks run on the engine task or the calling task, so they must be quick.

use jsonservices_core::Error;
use std::fmt;
use std::sync::Arc;

/// Receives every internally surfaced error
pub type ErrorHook = Arc<dyn Fn(&Error) + Send + Sync>;

/// Receives every raw frame
pub type TraceHook = Arc<dyn Fn(&TraceFrame<'_>) + Send + Sync>;

/// Direction of a traced frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceDirection {
    /// Sent by the client
    Outgoing,
    /// Received from the server
    Incoming,
}

/// A raw frame passed to the trace hook
#[derive(Debug, Clone, Copy)]
pub struct TraceFrame<'a> {
    /// Which way the frame travelled
    pub direction: TraceDirection,
    /// Frame text, binary frames already decoded as UTF-8
    pub data: &'a str,
}

/// The configured hooks
#[derive(Clone, Default)]
pub(crate) struct Hooks {
    pub(crate) on_error: Option<ErrorHook>,
    pub(crate) on_trace: Option<TraceHook>,
}

impl Hooks {
    /// Log an error and hand it to the diagnostic hook
    pub(crate) fn report(&self, error: &Error) {
        tracing::debug!(kind = error.kind(), code = ?error.code(), error = %error, "client error");
        if let Some(hook) = &self.on_error {
            hook(error);
        }
    }

    /// Hand a raw frame to the trace hook
    pub(crate) fn trace(&self, direction: TraceDirection, data: &str) {
        if let Some(hook) = &self.on_trace {
            hook(&TraceFrame { direction, data });
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_error", &self.on_error.is_some())
            .field("on_trace", &self.on_trace.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_default_hooks_are_noops() {
        let hooks = Hooks::default();
        hooks.report(&Error::NotConnected);
        hooks.trace(TraceDirection::Outgoing, "{}");
    }

    #[test]
    fn test_hooks_receive_errors_and_frames() {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let frames = Arc::new(Mutex::new(Vec::new()));
        let hooks = Hooks {
            on_error: Some({
                let errors = Arc::clone(&errors);
                Arc::new(move |e: &Error| errors.lock().unwrap().push(e.to_string()))
            }),
            on_trace: Some({
                let frames = Arc::clone(&frames);
                Arc::new(move |f: &TraceFrame<'_>| {
                    frames.lock().unwrap().push((f.direction, f.data.to_string()))
                })
            }),
        };

        hooks.report(&Error::NotConnected);
        hooks.trace(TraceDirection::Incoming, r#"{"id":"1"}"#);

        assert_eq!(*errors.lock().unwrap(), vec!["WebSocket not connected".to_string()]);
        assert_eq!(
            *frames.lock().unwrap(),
            vec![(TraceDirection::Incoming, r#"{"id":"1"}"#.to_string())]
        );
    }
}
