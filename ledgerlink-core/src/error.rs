//! Error types for ledgerlink
//!
//! A single `Error` enum covers every failure a caller can observe. It is
//! `Clone` because one failure is frequently fanned out to many waiters at
//! once: a destroyed client rejects every pending call and subscription
//! handle with the same value, and fatal errors also travel inside
//! `error` events on the client's event bus.
//!
//! # Error Categories
//!
//! - **Caller input**: `InvalidRequest`, `InvalidEndpoint`
//! - **Transport**: `WebSocket` (only ever logged or carried in events,
//!   recovery is automatic)
//! - **Per-call**: `Timeout`, `Superseded`
//! - **Terminal**: `Closed`, `Destroyed`, `AttemptsExhausted`
//! - **Processing**: `Serialization`, `Internal`

use std::time::Duration;
use thiserror::Error;

/// Result type for ledgerlink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Application-level error type for ledgerlink operations
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    /// The request handed to `send` is not usable
    ///
    /// Not an object, no `command` string, or an `unsubscribe` that would
    /// only drop the `ledger` stream. Never reaches the network.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// An endpoint URL was rejected
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Serialization or deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// WebSocket transport layer error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// The call did not receive a reply in time
    #[error("Call timeout after {} seconds", .0.as_secs_f64())]
    Timeout(Duration),

    /// A tracked `path_find` flow was replaced by a newer one before it got
    /// its first reply
    #[error("Path find request superseded by a newer one")]
    Superseded,

    /// The client was closed deliberately
    #[error("Client in closed state")]
    Closed,

    /// The client was destroyed; no further calls are possible
    #[error("Connection destroyed")]
    Destroyed,

    /// Every allowed connection attempt failed and there is no other
    /// endpoint to fail over to
    #[error("Max. connection attempts exceeded: {attempts} attempts to {endpoint}")]
    AttemptsExhausted {
        /// Endpoint that was being retried
        endpoint: String,
        /// Attempts made before giving up
        attempts: u32,
    },

    /// Unexpected internal condition
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error means the client will not carry the call any
    /// further on its own
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Error::Closed | Error::Destroyed | Error::AttemptsExhausted { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let error = Error::Timeout(Duration::from_secs(5));
        assert_eq!(error.to_string(), "Call timeout after 5 seconds");
    }

    #[test]
    fn test_exhausted_display() {
        let error = Error::AttemptsExhausted {
            endpoint: "wss://node.example".to_string(),
            attempts: 3,
        };
        let display = error.to_string();
        assert!(display.contains("3 attempts"));
        assert!(display.contains("wss://node.example"));
    }

    #[test]
    fn test_terminal_classification() {
        assert!(Error::Closed.is_terminal());
        assert!(Error::Destroyed.is_terminal());
        assert!(Error::AttemptsExhausted {
            endpoint: String::new(),
            attempts: 1
        }
        .is_terminal());
        assert!(!Error::Timeout(Duration::from_secs(1)).is_terminal());
        assert!(!Error::InvalidRequest("x".into()).is_terminal());
    }

    #[test]
    fn test_from_serde_error() {
        let serde_error = serde_json::from_str::<serde_json::Value>("{nope").unwrap_err();
        match Error::from(serde_error) {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            other => panic!("Expected Serialization error, got {other:?}"),
        }
    }
}
