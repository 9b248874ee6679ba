//! Protocol types for the ledger node WebSocket API
//!
//! Requests are plain JSON objects carrying a `command` field. On the wire
//! every outbound request has its `id` replaced by a correlation
//! [`Envelope`], so many calls can share one socket and replies can be
//! routed back to whoever asked. The caller's own id survives inside the
//! envelope and is put back on the reply before it is handed over.
//!
//! # Persistent commands
//!
//! `subscribe`, `unsubscribe` and `path_find` change server-side state that
//! is lost when a connection drops. The client tracks them and sends them
//! again after every reconnect, unless the caller opts out with
//! [`SendOptions::with_no_replay`].

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Stream the client itself depends on for liveliness
pub const LEDGER_STREAM: &str = "ledger";

/// Prefix of every external id the client generates for its own requests
pub const INTERNAL_ID_PREFIX: &str = "_LedgerLink_Internal";

/// External id of the client's own ledger stream subscription
pub const LEDGER_SUBSCRIPTION_ID: &str = "_LedgerLink_Internal_Subscription";

const SERVER_INFO_ID_PREFIX: &str = "_LedgerLink_Internal_ServerInfo";

/// Build the external id of an internal `server_info` request
///
/// The send timestamp (milliseconds on the client clock) is embedded after
/// an `@` so the round trip can be measured from the reply alone.
pub fn server_info_probe_id(sent_at_ms: u64) -> String {
    format!("{}@{}", SERVER_INFO_ID_PREFIX, sent_at_ms)
}

/// Extract the send timestamp from an internal `server_info` external id
pub fn probe_sent_at(external_id: &Value) -> Option<u64> {
    let id = external_id.as_str()?;
    let (prefix, millis) = id.rsplit_once('@')?;
    if prefix != SERVER_INFO_ID_PREFIX {
        return None;
    }
    millis.parse().ok()
}

/// Correlation envelope replacing the `id` of every outbound request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Monotonic call id assigned by the client
    #[serde(rename = "internalId")]
    pub internal_id: u64,
    /// Id supplied by the caller, if any
    #[serde(
        rename = "externalId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub external_id: Option<Value>,
}

impl Envelope {
    /// Create an envelope for a call
    pub fn new(internal_id: u64, external_id: Option<Value>) -> Self {
        Self {
            internal_id,
            external_id,
        }
    }

    /// Whether this envelope belongs to one of the client's own requests
    pub fn is_internal(&self) -> bool {
        self.external_id
            .as_ref()
            .and_then(Value::as_str)
            .is_some_and(|id| id.starts_with(INTERNAL_ID_PREFIX))
    }
}

/// Per-call options for [`send`](../../ledgerlink_client/struct.LedgerClient.html#method.send)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SendOptions {
    /// Transmit even if the connection has not reached `Ready`
    pub send_if_not_ready: bool,
    /// Do not track a persistent command for replay after reconnects
    pub no_replay_after_reconnect: bool,
    /// Reject the call if no reply arrives within this duration
    pub timeout: Option<Duration>,
    /// Start the timeout only once the call is actually transmitted
    pub timeout_starts_when_online: bool,
}

impl SendOptions {
    /// Default options: queue until ready, replay persistent commands, no timeout
    pub fn new() -> Self {
        Self::default()
    }

    /// Transmit even if the connection is not ready yet
    pub fn with_send_if_not_ready(mut self) -> Self {
        self.send_if_not_ready = true;
        self
    }

    /// Do not replay this persistent command after reconnects
    pub fn with_no_replay(mut self) -> Self {
        self.no_replay_after_reconnect = true;
        self
    }

    /// Reject the call after `timeout` without a reply
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Count the timeout from transmission instead of submission
    pub fn with_timeout_starts_when_online(mut self) -> Self {
        self.timeout_starts_when_online = true;
        self
    }
}

/// A validated request ready to be wrapped in an envelope
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    command: String,
    external_id: Option<Value>,
    body: Map<String, Value>,
}

impl Request {
    /// Validate a caller-supplied request object
    ///
    /// The `command` is trimmed and lower-cased; the `id`, if any, is kept
    /// aside as the external id.
    pub fn from_value(value: Value) -> Result<Self> {
        let mut body = match value {
            Value::Object(map) => map,
            _ => {
                return Err(Error::InvalidRequest(
                    "expecting object containing `command`".to_string(),
                ))
            }
        };

        let command = match body.remove("command") {
            Some(Value::String(command)) => command.trim().to_lowercase(),
            _ => {
                return Err(Error::InvalidRequest(
                    "`command` must be a string".to_string(),
                ))
            }
        };
        if command.is_empty() {
            return Err(Error::InvalidRequest("`command` is empty".to_string()));
        }

        let external_id = body.remove("id").filter(|id| !id.is_null());

        Ok(Self {
            command,
            external_id,
            body,
        })
    }

    /// Build a request from parts
    pub fn new(command: impl Into<String>, external_id: Option<Value>) -> Self {
        Self {
            command: command.into(),
            external_id,
            body: Map::new(),
        }
    }

    /// Add a field to the request body
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.body.insert(key.into(), value);
        self
    }

    /// `server_info` request used for handshakes, polls and race probes
    pub fn server_info(sent_at_ms: u64) -> Self {
        Self::new("server_info", Some(Value::String(server_info_probe_id(sent_at_ms))))
    }

    /// The client's own ledger stream subscription
    pub fn ledger_subscription() -> Self {
        Self::new("subscribe", Some(Value::String(LEDGER_SUBSCRIPTION_ID.into())))
            .with_field("streams", Value::Array(vec![Value::String(LEDGER_STREAM.into())]))
    }

    /// Normalised command name
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Caller-supplied id
    pub fn external_id(&self) -> Option<&Value> {
        self.external_id.as_ref()
    }

    /// Request fields other than `id` and `command`
    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    /// `subcommand` field, as used by `path_find`
    pub fn subcommand(&self) -> Option<&str> {
        self.body.get("subcommand").and_then(Value::as_str)
    }

    /// Whether the command changes server-side state that must be replayed
    pub fn is_persistent(&self) -> bool {
        matches!(
            self.command.as_str(),
            "subscribe" | "unsubscribe" | "path_find"
        )
    }

    /// A `path_find` status probe: never tracked, never evicts
    pub fn is_path_find_status(&self) -> bool {
        self.command == "path_find" && self.subcommand() == Some("status")
    }

    /// Whether this is a `subscribe` whose stream list includes `stream`
    pub fn subscribes_stream(&self, stream: &str) -> bool {
        self.command == "subscribe" && self.has_stream(stream)
    }

    fn has_stream(&self, stream: &str) -> bool {
        self.body
            .get("streams")
            .and_then(Value::as_array)
            .is_some_and(|streams| streams.iter().any(|s| s.as_str() == Some(stream)))
    }

    /// Remove the `ledger` stream from an `unsubscribe` request
    ///
    /// The client relies on the ledger stream, so it is never unsubscribed.
    /// Fails when dropping it leaves a request with nothing to do.
    pub fn strip_ledger_unsubscribe(&mut self) -> Result<()> {
        if self.command != "unsubscribe" || !self.has_stream(LEDGER_STREAM) {
            return Ok(());
        }

        let remaining = match self.body.get_mut("streams").and_then(Value::as_array_mut) {
            Some(streams) => {
                streams.retain(|s| s.as_str() != Some(LEDGER_STREAM));
                streams.len()
            }
            None => 0,
        };

        if remaining == 0 {
            self.body.remove("streams");
            if self.body.is_empty() {
                return Err(Error::InvalidRequest(
                    "Unsubscribing from (just) the ledger stream is not allowed".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Subset of a `server_info` reply the client cares about
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerInfo {
    pub build_version: String,
    pub complete_ledgers: String,
    pub pubkey_node: String,
    pub server_state: String,
    pub uptime: u64,
    pub load_factor: Option<f64>,
    pub validated_ledger: Option<ValidatedLedger>,
}

/// `validated_ledger` section of `server_info`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ValidatedLedger {
    pub seq: Option<u64>,
    pub base_fee_xrp: Option<f64>,
    pub reserve_base_xrp: Option<f64>,
    pub reserve_inc_xrp: Option<f64>,
}

impl ServerInfo {
    /// Parse the `info` object out of a reply or a bare result
    pub fn from_reply(message: &Value) -> Option<Self> {
        let info = message
            .get("result")
            .and_then(|result| result.get("info"))
            .or_else(|| message.get("info"))?;
        serde_json::from_value(info.clone()).ok()
    }

    /// Whether the node reports at least one validated ledger
    pub fn has_ledgers(&self) -> bool {
        !crate::telemetry::LedgerRange::parse(&self.complete_ledgers).is_empty()
    }
}

/// Payload of a `ledgerClosed` stream message
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LedgerClosed {
    pub ledger_index: Option<u64>,
    pub validated_ledgers: String,
    pub reserve_base: Option<u64>,
    pub reserve_inc: Option<u64>,
    pub fee_base: Option<u64>,
    pub txn_count: Option<u64>,
}

impl LedgerClosed {
    /// Parse a `ledgerClosed` message or a ledger subscription result
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}
