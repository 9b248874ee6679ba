//! Protocol types, codec and telemetry for ledgerlink
//!
//! This crate holds everything about talking to a ledger node that does not
//! involve a socket:
//!
//! - **Types**: validated requests, the correlation envelope, send options,
//!   `server_info` and `ledgerClosed` shapes
//! - **Codec**: encoding requests into frames and decoding inbound frames
//!   into a tagged union, once, at the boundary
//! - **Telemetry**: latency and fee windows, ledger range parsing and the
//!   derived connection snapshot
//! - **Error handling**: the one error type every operation returns
//! - **Observability**: `tracing` subscriber and OpenTelemetry setup
//!
//! The `ledgerlink-client` crate builds the connection engine on top.
//!
//! # Example
//!
//! ```rust
//! use ledgerlink_core::{codec, Envelope, Request};
//! use serde_json::json;
//!
//! let request = Request::from_value(json!({"command": "server_info", "id": 1})).unwrap();
//! let frame = codec::encode_request(&request, &Envelope::new(1, Some(json!(1)))).unwrap();
//! assert!(frame.contains("\"internalId\":1"));
//! ```

pub mod codec;
pub mod error;
pub mod observability;
pub mod telemetry;
pub mod types;

pub use codec::{Inbound, Push, Reply};
pub use error::{Error, Result};
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use telemetry::{ConnectionState, FeePolicy, LedgerRange, ServerState};
pub use types::{Envelope, LedgerClosed, Request, SendOptions, ServerInfo};
