//! Wire codec for ledger node frames
//!
//! Outbound, a [`Request`] is flattened back into a JSON object with the
//! correlation [`Envelope`] in place of its `id`. Inbound, every text frame
//! is decoded exactly once into [`Inbound`]: either a [`Reply`] carrying an
//! envelope, or an unsolicited [`Push`] classified by shape.
//!
//! # Push classification
//!
//! Checked in order, first match wins:
//!
//! 1. `type == "ledgerClosed"` with a non-empty `validated_ledgers` range
//! 2. `type == "path_find"`
//! 3. `type == "transaction"`
//! 4. a `validation_public_key` field
//! 5. `type == "PROXY"` (cluster metadata)
//! 6. anything else is [`Push::Unknown`]
//!
//! # Examples
//!
//! ```rust
//! use ledgerlink_core::{codec, Envelope, Request};
//! use serde_json::json;
//!
//! let request = Request::from_value(json!({"command": "ping", "id": "p1"})).unwrap();
//! let envelope = Envelope::new(1, request.external_id().cloned());
//! let frame = codec::encode_request(&request, &envelope).unwrap();
//!
//! let echoed = frame.replace("\"command\":\"ping\"", "\"result\":{},\"status\":\"success\"");
//! match codec::decode(&echoed).unwrap() {
//!     codec::Inbound::Reply(reply) => assert_eq!(reply.envelope.internal_id, 1),
//!     codec::Inbound::Push(_) => unreachable!(),
//! }
//! ```

use crate::error::{Error, Result};
use crate::types::{Envelope, LedgerClosed, Request};
use serde_json::{Map, Value};

/// Encode a request with its correlation envelope as a text frame
pub fn encode_request(request: &Request, envelope: &Envelope) -> Result<String> {
    let mut frame = Map::with_capacity(request.body().len() + 2);
    frame.insert("id".to_string(), serde_json::to_value(envelope)?);
    frame.insert(
        "command".to_string(),
        Value::String(request.command().to_string()),
    );
    for (key, value) in request.body() {
        frame.insert(key.clone(), value.clone());
    }
    Ok(serde_json::to_string(&Value::Object(frame))?)
}

/// A decoded inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Direct reply to one of our requests
    Reply(Reply),
    /// Unsolicited or subscription message
    Push(Push),
}

/// Reply carrying a correlation envelope
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub envelope: Envelope,
    /// Full message as received
    pub message: Value,
}

impl Reply {
    /// The message with the caller's own id put back in place of the envelope
    pub fn restored_message(&self) -> Value {
        let mut message = self.message.clone();
        if let Value::Object(map) = &mut message {
            match &self.envelope.external_id {
                Some(id) => {
                    map.insert("id".to_string(), id.clone());
                }
                None => {
                    map.remove("id");
                }
            }
        }
        message
    }

    /// Value a caller's result handle resolves with
    ///
    /// The inner `result` when present, otherwise the whole restored message.
    pub fn caller_value(&self) -> Value {
        match self.message.get("result") {
            Some(result) => result.clone(),
            None => self.restored_message(),
        }
    }

    /// Classify the restored message as if it were a push
    pub fn as_push(&self) -> Push {
        classify_push(self.restored_message())
    }
}

/// Unsolicited message, decoded once and matched exhaustively afterwards
#[derive(Debug, Clone, PartialEq)]
pub enum Push {
    LedgerClosed { ledger: LedgerClosed, message: Value },
    PathFind(Value),
    Transaction(Value),
    Validation(Value),
    ClusterInfo(Value),
    Unknown(Value),
}

impl Push {
    /// The raw message behind the variant
    pub fn message(&self) -> &Value {
        match self {
            Push::LedgerClosed { message, .. } => message,
            Push::PathFind(message)
            | Push::Transaction(message)
            | Push::Validation(message)
            | Push::ClusterInfo(message)
            | Push::Unknown(message) => message,
        }
    }
}

/// Decode one inbound text frame
pub fn decode(text: &str) -> Result<Inbound> {
    let message: Value = serde_json::from_str(text)?;
    if !message.is_object() {
        return Err(Error::Serialization(
            "inbound frame is not a JSON object".to_string(),
        ));
    }

    let envelope = message
        .get("id")
        .filter(|id| id.is_object())
        .and_then(|id| serde_json::from_value::<Envelope>(id.clone()).ok());

    Ok(match envelope {
        Some(envelope) => Inbound::Reply(Reply { envelope, message }),
        None => Inbound::Push(classify_push(message)),
    })
}

/// Classify a message by shape
pub fn classify_push(message: Value) -> Push {
    let kind = message.get("type").and_then(Value::as_str);

    if kind == Some("ledgerClosed") {
        if let Some(ledger) = LedgerClosed::from_value(&message) {
            if !ledger.validated_ledgers.is_empty() {
                return Push::LedgerClosed { ledger, message };
            }
        }
    }

    match kind {
        Some("path_find") => Push::PathFind(message),
        Some("transaction") => Push::Transaction(message),
        _ if message.get("validation_public_key").is_some() => Push::Validation(message),
        Some("PROXY") => Push::ClusterInfo(message),
        _ => Push::Unknown(message),
    }
}
