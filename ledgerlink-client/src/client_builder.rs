//! Client configuration and builder
//!
//! [`ClientOptions`] carries every tunable with its default and can be
//! loaded from JSON (camelCase keys, all optional). [`ClientBuilder`] takes
//! endpoints, options and optional overrides (connector, reconnect strategy,
//! observability) and spawns the engine.
//!
//! # Examples
//!
//! ```rust,no_run
//! use ledgerlink_client::{ClientBuilder, ClientOptions};
//! use ledgerlink_core::ObservabilityConfig;
//!
//! # async fn example() -> ledgerlink_core::Result<()> {
//! // Built-in endpoint list, default options
//! let client = ClientBuilder::new().connect().await?;
//!
//! // Two endpoints, failover after two attempts, with logging
//! let options: ClientOptions = serde_json::from_str(r#"{"maxConnectionAttempts": 2}"#)?;
//! let client2 = ClientBuilder::new()
//!     .with_endpoints(["wss://one.example", "wss://two.example"])
//!     .with_options(options)
//!     .with_observability(ObservabilityConfig::logs_only("my-app"))
//!     .connect()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::connection_state::{ConnectionManager, EndpointList};
use crate::engine::{self, EngineParts};
use crate::events::EventBus;
use crate::metrics::ClientMetrics;
use crate::reconnect::{AttemptScaledBackoff, ReconnectionStrategy};
use crate::transport::{Connector, TungsteniteConnector};
use crate::LedgerClient;
use ledgerlink_core::{Error, FeePolicy, ObservabilityConfig, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Client tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientOptions {
    /// A link must report open within this; also caps the reconnect delay
    pub connect_attempt_timeout_seconds: u64,
    /// Liveliness watchdog deadline
    pub assume_offline_after_seconds: u64,
    /// Attempts per endpoint before failing over; unlimited when unset or 0
    pub max_connection_attempts: Option<u32>,
    pub min_reconnect_delay_ms: u64,
    /// Fee used when the node reports no base fee
    pub fee_drops_default: f64,
    /// Larger fee estimates are discarded
    pub fee_drops_max: f64,
    /// Race every endpoint instead of trying them in order
    pub try_all_nodes: bool,
    /// Extra headers on the WebSocket upgrade request
    pub headers: HashMap<String, String>,
    /// Events buffered per subscriber before it starts skipping
    pub event_capacity: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        let fees = FeePolicy::default();
        Self {
            connect_attempt_timeout_seconds: 4,
            assume_offline_after_seconds: 20,
            max_connection_attempts: None,
            min_reconnect_delay_ms: 1000,
            fee_drops_default: fees.default_drops,
            fee_drops_max: fees.max_drops,
            try_all_nodes: false,
            headers: HashMap::new(),
            event_capacity: 1024,
        }
    }
}

impl ClientOptions {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_attempt_timeout_seconds)
    }

    pub fn assume_offline_after(&self) -> Duration {
        Duration::from_secs(self.assume_offline_after_seconds)
    }

    pub fn min_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.min_reconnect_delay_ms)
    }

    pub fn fee_policy(&self) -> FeePolicy {
        FeePolicy {
            default_drops: self.fee_drops_default,
            max_drops: self.fee_drops_max,
        }
    }

    /// Per-endpoint attempt budget; `0` means no limit
    pub fn max_attempts(&self) -> Option<u32> {
        self.max_connection_attempts.filter(|max| *max > 0)
    }

    /// Backoff matching these options
    pub fn backoff(&self) -> AttemptScaledBackoff {
        let backoff = AttemptScaledBackoff::new(self.connect_timeout(), self.min_reconnect_delay());
        match self.max_attempts() {
            Some(max) => backoff.with_max_attempts(max),
            None => backoff,
        }
    }
}

/// Builder for configuring and spawning a [`LedgerClient`]
#[derive(Default)]
pub struct ClientBuilder {
    endpoints: Vec<String>,
    options: ClientOptions,
    connector: Option<Arc<dyn Connector>>,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
    metrics: bool,
}

impl ClientBuilder {
    /// A builder using the built-in endpoint list
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoints.push(endpoint.into());
        self
    }

    /// Add several endpoints, in order of preference
    pub fn with_endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints.extend(endpoints.into_iter().map(Into::into));
        self
    }

    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Open links through `connector` instead of real WebSockets
    pub fn with_connector(mut self, connector: impl Connector) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Replace the backoff derived from the options
    pub fn with_reconnect(mut self, strategy: Box<dyn ReconnectionStrategy>) -> Self {
        self.reconnect_strategy = Some(strategy);
        self
    }

    /// Initialise logging/tracing/metrics export and record client metrics
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self.metrics = true;
        self
    }

    /// Record client metrics on whatever meter provider is installed
    pub fn with_metrics(mut self) -> Self {
        self.metrics = true;
        self
    }

    /// Set service name for observability (used if observability is enabled)
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Spawn the client; it starts connecting right away
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn connect(self) -> Result<LedgerClient> {
        let mut service_name = self.service_name;
        if let Some(mut config) = self.observability_config {
            if let Some(name) = &service_name {
                config.service_name = name.clone();
            }
            service_name = Some(config.service_name.clone());
            ledgerlink_core::init_observability(config).map_err(|e| {
                Error::Internal(format!("Failed to initialize observability: {}", e))
            })?;
        }
        let metrics = self.metrics.then(|| {
            let name = service_name.unwrap_or_else(|| "ledgerlink".to_string());
            Arc::new(ClientMetrics::new(name))
        });

        let endpoints = EndpointList::new(&self.endpoints);
        tracing::info!(
            endpoints = endpoints.len(),
            first = %endpoints.current(),
            try_all_nodes = self.options.try_all_nodes,
            "starting client"
        );

        let strategy = self
            .reconnect_strategy
            .unwrap_or_else(|| Box::new(self.options.backoff()));
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(TungsteniteConnector));
        let bus = EventBus::new(self.options.event_capacity);
        let connection = ConnectionManager::new(endpoints, self.options.max_attempts());

        let commands = engine::spawn(EngineParts {
            connector,
            options: self.options,
            connection,
            strategy,
            bus: Arc::clone(&bus),
            metrics,
        });
        Ok(LedgerClient::new(commands, bus))
    }
}
