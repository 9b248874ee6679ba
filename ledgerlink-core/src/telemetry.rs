//! Network telemetry derived from `server_info` replies and ledger closes
//!
//! [`ServerState`] is pure data: callers pass in the current instant, so it
//! can be driven from a virtual clock in tests. It keeps bounded rolling
//! windows of round-trip latency and fee estimates, the validated ledger
//! range and the reserve values, and computes a [`ConnectionState`]
//! snapshot on demand.

use crate::types::{LedgerClosed, ServerInfo};
use serde::Serialize;
use std::collections::VecDeque;
use tokio::time::Instant;

/// Latency samples kept in the rolling window
pub const LATENCY_HISTORY: usize = 10;
/// Fee samples kept in the rolling window
pub const FEE_HISTORY: usize = 5;
/// Safety factor applied to the node-reported fee
pub const FEE_CUSHION: f64 = 1.2;

const DROPS_PER_XRP: f64 = 1_000_000.0;

/// Fee estimate bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeePolicy {
    /// Estimate recorded, unscaled, when the node reports no base fee; also
    /// the snapshot fee while history is empty
    pub default_drops: f64,
    /// Estimates above this are discarded
    pub max_drops: f64,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            default_drops: 12.0,
            max_drops: 3600.0,
        }
    }
}

/// Parsed validated ledger range such as `"100-105,110"`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerRange {
    parts: Vec<(u64, Option<u64>)>,
}

impl LedgerRange {
    /// Parse a comma separated list of `lo-hi` ranges and single indexes
    ///
    /// `""` and `"empty"` give an empty range; malformed parts are skipped.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw == "empty" {
            return Self::default();
        }

        let parts = raw
            .split(',')
            .filter_map(|part| match part.trim().split_once('-') {
                Some((lo, hi)) => Some((lo.trim().parse().ok()?, Some(hi.trim().parse().ok()?))),
                None => Some((part.trim().parse().ok()?, None)),
            })
            .collect();

        Self { parts }
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Highest index, taken from the tail of the range string
    pub fn last(&self) -> Option<u64> {
        self.parts.last().map(|(lo, hi)| hi.unwrap_or(*lo))
    }

    /// Ledgers implied by the range: `hi - lo` per range, 1 per single index
    pub fn count(&self) -> u64 {
        self.parts
            .iter()
            .map(|(lo, hi)| match hi {
                Some(hi) => hi.saturating_sub(*lo),
                None => 1,
            })
            .fold(0u64, |total, n| total.saturating_add(n))
    }
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    at: Instant,
    value: f64,
}

fn push_capped(history: &mut VecDeque<Sample>, sample: Sample, cap: usize) {
    history.push_back(sample);
    while history.len() > cap {
        history.pop_front();
    }
}

fn statistic(history: &VecDeque<Sample>, now: Instant) -> Statistic {
    let last = history.back();
    Statistic {
        last: last.map(|s| s.value),
        avg: (!history.is_empty())
            .then(|| history.iter().map(|s| s.value).sum::<f64>() / history.len() as f64),
        sec_ago: last.map(|s| now.saturating_duration_since(s.at).as_secs_f64()),
    }
}

/// Everything the client learns about the node it is connected to
#[derive(Debug, Clone)]
pub struct ServerState {
    policy: FeePolicy,
    validated_ledgers: String,
    reserve_base: Option<f64>,
    reserve_inc: Option<f64>,
    latency: VecDeque<Sample>,
    fee: VecDeque<Sample>,
    server_info: Option<ServerInfo>,
    last_contact: Option<Instant>,
}

impl ServerState {
    pub fn new(policy: FeePolicy) -> Self {
        Self {
            policy,
            validated_ledgers: String::new(),
            reserve_base: None,
            reserve_inc: None,
            latency: VecDeque::with_capacity(LATENCY_HISTORY + 1),
            fee: VecDeque::with_capacity(FEE_HISTORY + 1),
            server_info: None,
            last_contact: None,
        }
    }

    /// Record any inbound frame
    pub fn touch(&mut self, now: Instant) {
        self.last_contact = Some(now);
    }

    /// Fold a `server_info` reply into the state
    ///
    /// Returns the fee estimate if one was accepted into history.
    pub fn record_server_info(
        &mut self,
        info: ServerInfo,
        latency_ms: Option<f64>,
        now: Instant,
    ) -> Option<f64> {
        if let Some(latency) = latency_ms {
            push_capped(
                &mut self.latency,
                Sample { at: now, value: latency },
                LATENCY_HISTORY,
            );
        }

        if !info.complete_ledgers.is_empty() {
            self.validated_ledgers = info.complete_ledgers.clone();
        }

        let mut accepted = None;
        if let Some(validated) = &info.validated_ledger {
            if let Some(base) = validated.reserve_base_xrp {
                self.reserve_base = Some(base);
            }
            if let Some(inc) = validated.reserve_inc_xrp {
                self.reserve_inc = Some(inc);
            }
        }

        let fee = self.estimate_fee(&info);
        if fee > 0.0 && fee <= self.policy.max_drops {
            push_capped(&mut self.fee, Sample { at: now, value: fee }, FEE_HISTORY);
            accepted = Some(fee);
        }

        self.server_info = Some(info);
        accepted
    }

    /// `load_factor × base fee × cushion`, or the configured default as is
    /// when the node reports no base fee
    fn estimate_fee(&self, info: &ServerInfo) -> f64 {
        match info.validated_ledger.as_ref().and_then(|v| v.base_fee_xrp) {
            Some(xrp) => info.load_factor.unwrap_or(1.0) * xrp * DROPS_PER_XRP * FEE_CUSHION,
            None => self.policy.default_drops,
        }
    }

    /// Fold a `ledgerClosed` message (or ledger subscription ack) into the state
    pub fn record_ledger_closed(&mut self, ledger: &LedgerClosed) {
        if !ledger.validated_ledgers.is_empty() {
            self.validated_ledgers = ledger.validated_ledgers.clone();
        }
        if let Some(base) = ledger.reserve_base {
            self.reserve_base = Some(base as f64 / DROPS_PER_XRP);
        }
        if let Some(inc) = ledger.reserve_inc {
            self.reserve_inc = Some(inc as f64 / DROPS_PER_XRP);
        }
    }

    pub fn ledger_range(&self) -> LedgerRange {
        LedgerRange::parse(&self.validated_ledgers)
    }

    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    pub fn latency_samples(&self) -> usize {
        self.latency.len()
    }

    pub fn fee_samples(&self) -> impl Iterator<Item = f64> + '_ {
        self.fee.iter().map(|s| s.value)
    }

    /// Seconds since the last inbound frame
    pub fn sec_last_contact(&self, now: Instant) -> Option<f64> {
        self.last_contact
            .map(|at| now.saturating_duration_since(at).as_secs_f64())
    }

    /// Derived read-only view of the connection
    pub fn snapshot(&self, online: bool, uri: &str, now: Instant) -> ConnectionState {
        let range = self.ledger_range();
        let info = self.server_info.as_ref();

        let mut fee = statistic(&self.fee, now);
        if self.fee.is_empty() {
            fee.last = Some(self.policy.default_drops);
            fee.avg = Some(self.policy.default_drops);
        }

        ConnectionState {
            online,
            latency_ms: statistic(&self.latency, now),
            server: ServerSummary {
                version: info.map(|i| i.build_version.clone()).unwrap_or_default(),
                uptime: info.map(|i| i.uptime).unwrap_or_default(),
                public_key: info.map(|i| i.pubkey_node.clone()).unwrap_or_default(),
                uri: uri.to_string(),
            },
            ledger: LedgerSummary {
                last: range.last(),
                validated: self.validated_ledgers.clone(),
                count: range.count(),
            },
            fee,
            reserve: Reserve {
                base: self.reserve_base,
                owner: self.reserve_inc,
            },
            sec_last_contact: self.sec_last_contact(now),
        }
    }
}

/// last / average / age of a rolling window
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistic {
    pub last: Option<f64>,
    pub avg: Option<f64>,
    pub sec_ago: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSummary {
    pub version: String,
    pub uptime: u64,
    pub public_key: String,
    pub uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSummary {
    pub last: Option<u64>,
    pub validated: String,
    pub count: u64,
}

/// Reserves in XRP
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reserve {
    pub base: Option<f64>,
    pub owner: Option<f64>,
}

/// Snapshot returned by `get_state` and carried by `state` events
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    pub online: bool,
    pub latency_ms: Statistic,
    pub server: ServerSummary,
    pub ledger: LedgerSummary,
    pub fee: Statistic,
    pub reserve: Reserve,
    pub sec_last_contact: Option<f64>,
}
