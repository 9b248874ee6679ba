//! ledgerlink - resilient WebSocket client for ledger nodes
//!
//! Convenience crate re-exporting the ledgerlink sub-crates, for a single
//! dependency that covers both the protocol layer and the client.
//!
//! # Architecture
//!
//! - **ledgerlink-core**: request validation, the correlation envelope,
//!   codec, node telemetry, errors and observability setup
//! - **ledgerlink-client**: the connection engine with failover, replay,
//!   readiness gating and the event bus
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ledgerlink::{ClientBuilder, EventKind, SendOptions};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ClientBuilder::new()
//!         .with_endpoint("wss://xrplcluster.com")
//!         .connect()
//!         .await?;
//!
//!     let _closes = client.on(EventKind::Ledger, |event| async move {
//!         println!("{:?}", event);
//!     });
//!
//!     client.ready().await?;
//!     let fee = client
//!         .send(json!({"command": "fee"}), SendOptions::new())
//!         .await?;
//!     println!("{}", fee);
//!
//!     println!("{:?}", client.get_state().await?);
//!     client.close().await;
//!     Ok(())
//! }
//! ```

pub use ledgerlink_client as client;
pub use ledgerlink_core as core;

pub use ledgerlink_client::{
    ClientBuilder, ClientEvent, ClientOptions, EventKind, LedgerClient, ReinstateOptions,
};
pub use ledgerlink_core::{ConnectionState, Error, Result, SendOptions};
