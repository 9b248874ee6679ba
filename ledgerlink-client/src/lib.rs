//! Resilient JSON-over-WebSocket client for ledger nodes
//!
//! One logical connection multiplexes concurrent calls, long-lived
//! subscriptions and unsolicited pushes. The client fails over between
//! endpoints, reconnects with a bounded backoff, replays subscriptions after
//! every reconnect and keeps live telemetry (latency, fee estimate, validated
//! ledger range) about the node it is talking to.
//!
//! # Core Features
//!
//! - **Correlation**: every call is wrapped in an envelope carrying a
//!   monotonic id and the caller's own id, restored on the reply
//! - **Readiness gating**: calls wait until the post-open handshake finished
//!   unless sent with `send_if_not_ready`
//! - **Failover**: per-endpoint attempt budget, cursor rotation with `round`
//!   and `nodeswitch` events, or racing every endpoint at once
//! - **Liveliness watchdog**: a link with no ledger close for too long is
//!   dropped and reconnected
//! - **Events**: one bus per client with typed topics, async handlers and
//!   unsubscribe handles
//! - **Observability**: `tracing` logs everywhere, optional OpenTelemetry
//!   metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ledgerlink_client::{ClientBuilder, EventKind};
//! use ledgerlink_core::SendOptions;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ClientBuilder::new()
//!         .with_endpoints(["wss://xrplcluster.com", "wss://s2.ripple.com"])
//!         .connect()
//!         .await?;
//!
//!     let _ledgers = client.on(EventKind::Ledger, |event| async move {
//!         println!("{:?}", event);
//!     });
//!
//!     client.ready().await?;
//!     let account = client
//!         .send(
//!             json!({"command": "account_info", "account": "rEXAMPLE"}),
//!             SendOptions::new().with_timeout(std::time::Duration::from_secs(10)),
//!         )
//!         .await?;
//!     println!("{}", account);
//!
//!     client.destroy().await;
//!     Ok(())
//! }
//! ```

mod client;
mod client_builder;
mod connection_state;
mod dispatch;
mod engine;
mod events;
mod metrics;
mod race;
mod reconnect;
mod request;
mod scheduler;
mod transport;

pub use client::{LedgerClient, ReinstateOptions};
pub use client_builder::{ClientBuilder, ClientOptions};
pub use connection_state::{validate_endpoint, EndpointList, LifecycleState, DEFAULT_ENDPOINTS};
pub use events::{ClientEvent, EventKind, EventStream, ListenerHandle};
pub use metrics::ClientMetrics;
pub use reconnect::{AttemptScaledBackoff, FixedDelay, ReconnectionStrategy};
pub use transport::{
    Connector, Outbound, TransportEvent, TransportLink, TransportOptions, TransportPeer,
    TungsteniteConnector,
};
