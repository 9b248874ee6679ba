//! OpenTelemetry instruments for the client
//!
//! Created when the builder is asked for metrics; recorded from the engine
//! task. Nothing leaves the process unless a meter provider is installed
//! (see `ledgerlink_core::init_observability`).
//!
//! # Instruments
//!
//! - **ledgerlink.client.state**: lifecycle state (gauge, see
//!   `LifecycleState::as_gauge`)
//! - **ledgerlink.client.calls**: completed calls by command and outcome
//! - **ledgerlink.client.call.duration**: submission to settlement, seconds
//! - **ledgerlink.client.call.timeouts**: calls rejected by their timeout
//! - **ledgerlink.client.reconnects**: reconnects scheduled
//! - **ledgerlink.client.endpoint.switches**: failovers and race adoptions
//! - **ledgerlink.client.ledgers**: ledger closes seen
//! - **ledgerlink.client.round_trip**: `server_info` round trip, milliseconds
//! - **ledgerlink.client.fee**: latest accepted fee estimate, drops

use crate::connection_state::LifecycleState;
use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, Meter},
    InstrumentationScope, KeyValue,
};

/// Client metrics
pub struct ClientMetrics {
    pub state: Gauge<i64>,
    pub calls: Counter<u64>,
    pub call_duration: Histogram<f64>,
    pub call_timeouts: Counter<u64>,
    pub reconnects: Counter<u64>,
    pub endpoint_switches: Counter<u64>,
    pub ledgers: Counter<u64>,
    pub round_trip: Histogram<f64>,
    pub fee: Gauge<f64>,
}

impl ClientMetrics {
    /// Instruments on the global meter provider, scoped to `service_name`
    pub fn new(service_name: impl Into<String>) -> Self {
        let scope = InstrumentationScope::builder(service_name.into())
            .with_version(env!("CARGO_PKG_VERSION"))
            .build();
        Self::new_with_meter(&global::meter_with_scope(scope))
    }

    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            state: meter
                .i64_gauge("ledgerlink.client.state")
                .with_description("Connection lifecycle state")
                .build(),
            calls: meter
                .u64_counter("ledgerlink.client.calls")
                .with_description("Calls settled, by command and outcome")
                .build(),
            call_duration: meter
                .f64_histogram("ledgerlink.client.call.duration")
                .with_description("Time from submission to reply")
                .with_unit("s")
                .build(),
            call_timeouts: meter
                .u64_counter("ledgerlink.client.call.timeouts")
                .with_description("Calls rejected by their timeout")
                .build(),
            reconnects: meter
                .u64_counter("ledgerlink.client.reconnects")
                .with_description("Reconnects scheduled after a lost link")
                .build(),
            endpoint_switches: meter
                .u64_counter("ledgerlink.client.endpoint.switches")
                .with_description("Moves to another endpoint")
                .build(),
            ledgers: meter
                .u64_counter("ledgerlink.client.ledgers")
                .with_description("Ledger closes received")
                .build(),
            round_trip: meter
                .f64_histogram("ledgerlink.client.round_trip")
                .with_description("server_info round trip")
                .with_unit("ms")
                .build(),
            fee: meter
                .f64_gauge("ledgerlink.client.fee")
                .with_description("Latest accepted fee estimate")
                .with_unit("drops")
                .build(),
        }
    }

    pub fn record_state(&self, state: LifecycleState) {
        self.state.record(state.as_gauge(), &[]);
    }

    pub fn record_call(&self, command: &str, outcome: &str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("command", command.to_string()),
            KeyValue::new("outcome", outcome.to_string()),
        ];
        self.calls.add(1, attributes);
        self.call_duration.record(duration_secs, attributes);
    }

    pub fn record_timeout(&self, command: &str) {
        self.call_timeouts
            .add(1, &[KeyValue::new("command", command.to_string())]);
        self.calls.add(
            1,
            &[
                KeyValue::new("command", command.to_string()),
                KeyValue::new("outcome", "timeout"),
            ],
        );
    }

    pub fn record_reconnect(&self, endpoint: &str) {
        self.reconnects
            .add(1, &[KeyValue::new("endpoint", endpoint.to_string())]);
    }

    pub fn record_switch(&self, endpoint: &str) {
        self.endpoint_switches
            .add(1, &[KeyValue::new("endpoint", endpoint.to_string())]);
    }

    pub fn record_ledger(&self) {
        self.ledgers.add(1, &[]);
    }

    pub fn record_server_info(&self, round_trip_ms: Option<f64>, fee_drops: Option<f64>) {
        if let Some(round_trip) = round_trip_ms {
            self.round_trip.record(round_trip, &[]);
        }
        if let Some(fee) = fee_drops {
            self.fee.record(fee, &[]);
        }
    }
}

impl std::fmt::Debug for ClientMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientMetrics").finish_non_exhaustive()
    }
}
