//! Reconnection strategies
//!
//! After an abnormal close the engine bumps its reconnect counter and asks the
//! strategy for the delay before attempt number `attempt` (1-based). `None`
//! means give up. A successful authentication resets the counter and calls
//! [`ReconnectionStrategy::reset`].
//!
//! - [`FixedDelay`]: the same delay every time, what [`ClientOptions`](crate::ClientOptions) builds
//! - [`ExponentialBackoff`]: doubling delay with an upper bound and optional jitter
//! - [`NoReconnect`]: never reconnect
//!
//! For the attempt limits below, `0` means unlimited.

use std::time::Duration;

/// Decides whether and when to reconnect
pub trait ReconnectionStrategy: Send + Sync {
    /// Delay before reconnection attempt `attempt` (starting at 1), or `None` to stop
    fn next_delay(&mut self, attempt: u32) -> Option<Duration>;

    /// Called once a connection is authenticated again
    fn reset(&mut self);
}

fn within_limit(max_attempts: u32, attempt: u32) -> bool {
    max_attempts == 0 || attempt <= max_attempts
}

/// Waits the same delay before every attempt
///
/// # Examples
///
/// ```rust
/// use jsonservices_client::{FixedDelay, ReconnectionStrategy};
/// use std::time::Duration;
///
/// let mut strategy = FixedDelay::new(Duration::from_secs(5)).with_max_attempts(2);
/// assert_eq!(strategy.next_delay(1), Some(Duration::from_secs(5)));
/// assert_eq!(strategy.next_delay(2), Some(Duration::from_secs(5)));
/// assert_eq!(strategy.next_delay(3), None);
/// ```
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: u32,
}

impl FixedDelay {
    /// Unlimited attempts spaced by `delay`
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: 0,
        }
    }

    /// Limit the number of attempts; `0` means unlimited
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        within_limit(self.max_attempts, attempt).then_some(self.delay)
    }

    fn reset(&mut self) {}
}

/// Doubles the delay after every attempt, up to a maximum
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    min_delay: Duration,
    max_delay: Duration,
    max_attempts: u32,
    jitter: bool,
    last_attempt: u32,
}

impl ExponentialBackoff {
    /// Unlimited attempts starting at `min_delay`, capped at `max_delay`
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay,
            max_attempts: 0,
            jitter: false,
            last_attempt: 0,
        }
    }

    /// Limit the number of attempts; `0` means unlimited
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Add up to 25% random delay on top of each computed delay
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(30))
            .with_max_attempts(10)
            .with_jitter()
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        self.last_attempt = attempt;
        if !within_limit(self.max_attempts, attempt) {
            return None;
        }

        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        let base = (self.min_delay.as_millis() as u64).saturating_mul(factor);
        let delay = base.min(self.max_delay.as_millis() as u64);

        if self.jitter {
            use rand::Rng;
            let jitter = rand::thread_rng().gen_range(0..=delay / 4);
            return Some(Duration::from_millis(delay + jitter));
        }
        Some(Duration::from_millis(delay))
    }

    fn reset(&mut self) {
        self.last_attempt = 0;
    }
}

/// Never reconnects
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReconnect;

impl ReconnectionStrategy for NoReconnect {
    fn next_delay(&mut self, _attempt: u32) -> Option<Duration> {
        None
    }

    fn reset(&mut self) {}
}
