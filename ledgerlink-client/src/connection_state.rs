//! Connection lifecycle and endpoint failover
//!
//! # Lifecycle
//!
//! ```text
//! Idle → Connecting ─┬→ Open → Ready ─→ Retrying → Connecting ...
//!        Racing ─────┘                └→ Closing → Closed
//!                                         Destroyed (terminal, from anywhere)
//! ```
//!
//! `Open` only means the socket is up. `Ready` is entered after the
//! post-open handshake completes.
//!
//! # Failover
//!
//! Each connect increments a per-endpoint attempt counter. Once the counter
//! exceeds the configured maximum the cursor moves to the next endpoint
//! (wrapping around, which starts a new round) and the counter restarts.
//! With a single endpoint there is nowhere to go and the attempt budget is
//! exhausted.

use ledgerlink_core::{Error, Result};

/// Endpoints used when none of the configured ones are usable
pub const DEFAULT_ENDPOINTS: &[&str] = &[
    "wss://xrplcluster.com",
    "wss://xrpl.link",
    "wss://s2.ripple.com",
];

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Connecting,
    Racing,
    Open,
    Ready,
    Retrying,
    Closing,
    Closed,
    Destroyed,
}

impl LifecycleState {
    /// Numeric value for the state gauge
    pub fn as_gauge(self) -> i64 {
        match self {
            LifecycleState::Idle => 0,
            LifecycleState::Connecting => 1,
            LifecycleState::Racing => 2,
            LifecycleState::Open => 3,
            LifecycleState::Ready => 4,
            LifecycleState::Retrying => 5,
            LifecycleState::Closing => 6,
            LifecycleState::Closed => 7,
            LifecycleState::Destroyed => 8,
        }
    }
}

/// Check a single endpoint URL
pub fn validate_endpoint(endpoint: &str) -> Result<String> {
    let endpoint = endpoint.trim();
    let lower = endpoint.to_ascii_lowercase();
    let rest = lower
        .strip_prefix("wss://")
        .or_else(|| lower.strip_prefix("ws://"));
    match rest {
        Some(host) if !host.is_empty() => Ok(endpoint.to_string()),
        _ => Err(Error::InvalidEndpoint(endpoint.to_string())),
    }
}

/// Ordered, deduplicated endpoints with a cursor
#[derive(Debug, Clone)]
pub struct EndpointList {
    endpoints: Vec<String>,
    cursor: usize,
}

impl EndpointList {
    /// Keep valid, distinct endpoints in order; fall back to the defaults
    /// when none survive
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut endpoints: Vec<String> = Vec::new();
        for candidate in candidates {
            match validate_endpoint(candidate.as_ref()) {
                Ok(endpoint) => {
                    if !endpoints.contains(&endpoint) {
                        endpoints.push(endpoint);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "ignoring endpoint"),
            }
        }

        if endpoints.is_empty() {
            endpoints = DEFAULT_ENDPOINTS.iter().map(|e| e.to_string()).collect();
        }

        Self {
            endpoints,
            cursor: 0,
        }
    }

    pub fn current(&self) -> &str {
        &self.endpoints[self.cursor]
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.endpoints.iter().map(String::as_str)
    }

    /// Move to the next endpoint; true when the cursor wrapped to the first
    pub fn advance(&mut self) -> bool {
        self.cursor = (self.cursor + 1) % self.endpoints.len();
        self.cursor == 0
    }

    /// Point the cursor at `index`; true if it moved
    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.endpoints.len() || index == self.cursor {
            return false;
        }
        self.cursor = index;
        true
    }
}

/// Result of starting a connect attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Go ahead with the current endpoint
    Proceed,
    /// The budget for the previous endpoint ran out; now on `endpoint`
    Switched { endpoint: String, wrapped: bool },
    /// No attempts left and nowhere to fail over to
    Exhausted { endpoint: String, attempts: u32 },
}

/// Tracks lifecycle state, endpoint cursor and attempt counting
#[derive(Debug)]
pub struct ConnectionManager {
    endpoints: EndpointList,
    state: LifecycleState,
    attempts: u32,
    max_attempts: Option<u32>,
}

impl ConnectionManager {
    pub fn new(endpoints: EndpointList, max_attempts: Option<u32>) -> Self {
        Self {
            endpoints,
            state: LifecycleState::Idle,
            attempts: 0,
            max_attempts,
        }
    }

    #[cfg(test)]
    fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn set_state(&mut self, state: LifecycleState) {
        if self.state != state {
            tracing::debug!(from = ?self.state, to = ?state, "lifecycle transition");
            self.state = state;
        }
    }

    pub fn endpoints(&self) -> &EndpointList {
        &self.endpoints
    }

    pub fn current(&self) -> &str {
        self.endpoints.current()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    fn over_budget(&self) -> bool {
        self.max_attempts
            .is_some_and(|max| self.attempts > max)
    }

    /// Count a single-endpoint connect attempt
    ///
    /// The budget check is strict: `max_attempts` attempts are allowed per
    /// endpoint and the one after that fails over.
    pub fn begin_attempt(&mut self) -> AttemptOutcome {
        self.attempts += 1;
        if !self.over_budget() {
            return AttemptOutcome::Proceed;
        }

        if self.endpoints.len() > 1 {
            let wrapped = self.endpoints.advance();
            self.attempts = 1;
            AttemptOutcome::Switched {
                endpoint: self.endpoints.current().to_string(),
                wrapped,
            }
        } else {
            AttemptOutcome::Exhausted {
                endpoint: self.endpoints.current().to_string(),
                attempts: self.attempts - 1,
            }
        }
    }

    /// Count a racing round across every endpoint
    pub fn begin_round(&mut self) -> AttemptOutcome {
        self.attempts += 1;
        if self.over_budget() {
            AttemptOutcome::Exhausted {
                endpoint: self.endpoints.iter().collect::<Vec<_>>().join(", "),
                attempts: self.attempts - 1,
            }
        } else {
            AttemptOutcome::Proceed
        }
    }

    /// The handshake completed
    pub fn mark_ready(&mut self) {
        self.attempts = 0;
        self.set_state(LifecycleState::Ready);
    }

    /// Start over on the same endpoint with a fresh budget
    pub fn reset_attempts(&mut self) {
        self.attempts = 0;
    }

    /// Fail over to the next endpoint right away
    ///
    /// Returns the new endpoint and whether the cursor wrapped.
    pub fn force_next(&mut self) -> (String, bool) {
        let wrapped = self.endpoints.advance();
        self.attempts = 0;
        (self.endpoints.current().to_string(), wrapped)
    }

    /// Adopt the endpoint at `index` (a race winner); true if it changed
    pub fn adopt(&mut self, index: usize) -> bool {
        let moved = self.endpoints.select(index);
        if moved {
            self.attempts = 0;
        }
        moved
    }
}
