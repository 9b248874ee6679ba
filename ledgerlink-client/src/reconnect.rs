//! Reconnection delay strategies
//!
//! When a link is lost and the client was not closed on purpose, the engine
//! asks its strategy how long to wait before the next connect. The attempt
//! number passed in is the per-endpoint attempt counter, so delays start
//! over after a failover or a successful handshake.
//!
//! # Built-in Strategies
//!
//! - **AttemptScaledBackoff**: delay grows linearly with the attempt count,
//!   scaled so that the last allowed attempt waits about one connect timeout
//!   (the default)
//! - **FixedDelay**: constant delay between attempts
//!
//! # Examples
//!
//! ```rust
//! use ledgerlink_client::{AttemptScaledBackoff, ReconnectionStrategy};
//! use std::time::Duration;
//!
//! let mut backoff = AttemptScaledBackoff::new(Duration::from_secs(4), Duration::from_secs(1))
//!     .with_max_attempts(4);
//! assert_eq!(backoff.next_delay(0), Duration::from_secs(1));
//! assert_eq!(backoff.next_delay(3), Duration::from_secs(4));
//! ```

use std::time::Duration;

/// Computes the wait before a reconnect
pub trait ReconnectionStrategy: Send + Sync {
    /// Delay before reconnecting, given the current per-endpoint attempt count
    fn next_delay(&mut self, attempt: u32) -> Duration;

    /// Called once a connection reaches ready
    fn reset(&mut self) {}
}

/// Linear backoff scaled by the attempt budget
///
/// `delay = max(min_delay, (attempt + 1) * factor)` where `factor` is
/// `(connect_timeout - 1s) / (max_attempts - 1)` when more than one attempt
/// is allowed and one second otherwise. The delay never exceeds
/// `max(connect_timeout, min_delay)`.
#[derive(Debug, Clone)]
pub struct AttemptScaledBackoff {
    connect_timeout: Duration,
    min_delay: Duration,
    max_attempts: Option<u32>,
}

impl AttemptScaledBackoff {
    pub fn new(connect_timeout: Duration, min_delay: Duration) -> Self {
        Self {
            connect_timeout,
            min_delay,
            max_attempts: None,
        }
    }

    /// Scale the delays to this many attempts per endpoint
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    fn factor(&self) -> Duration {
        match self.max_attempts {
            Some(max) if max > 1 => {
                self.connect_timeout.saturating_sub(Duration::from_secs(1)) / (max - 1)
            }
            _ => Duration::from_secs(1),
        }
    }

    /// Upper bound of any delay this strategy returns
    pub fn ceiling(&self) -> Duration {
        self.connect_timeout.max(self.min_delay)
    }
}

impl Default for AttemptScaledBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(4), Duration::from_secs(1))
    }
}

impl ReconnectionStrategy for AttemptScaledBackoff {
    fn next_delay(&mut self, attempt: u32) -> Duration {
        let scaled = self.factor().saturating_mul(attempt.saturating_add(1));
        scaled.max(self.min_delay).min(self.ceiling())
    }
}

/// Constant delay between attempts
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&mut self, _attempt: u32) -> Duration {
        self.delay
    }
}
