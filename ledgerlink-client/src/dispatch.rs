//! Inbound message classification
//!
//! Pure routing: given a decoded message and what (if anything) in the
//! registry it matched, decide which notifications to emit and which state
//! updates to apply. The engine executes the resulting [`Route`]s in order.

use crate::events::ClientEvent;
use crate::request::SubscriptionKind;
use ledgerlink_core::types::LEDGER_SUBSCRIPTION_ID;
use ledgerlink_core::{LedgerClosed, Push};
use serde_json::Value;

/// One step the engine takes for an inbound message
#[derive(Debug, Clone)]
pub enum Route {
    /// Publish a notification
    Emit(ClientEvent),
    /// Fold a ledger close into server state and poll `server_info`
    RecordLedger(LedgerClosed),
    /// Cluster metadata, captured once
    ClusterInfo(Value),
    /// Nothing wanted this message
    Unhandled(Value),
}

fn is_ledger_subscription_ack(message: &Value) -> bool {
    message.get("id").and_then(Value::as_str) == Some(LEDGER_SUBSCRIPTION_ID)
}

/// Route a push (or a subscription reply seen as a push)
///
/// `matched` is the kind of tracked subscription the message's envelope
/// matched; `internal` marks messages carrying one of the client's own ids.
pub fn classify(push: Push, matched: Option<SubscriptionKind>, internal: bool) -> Vec<Route> {
    let mut routes = Vec::with_capacity(3);

    let message = push.message();
    if is_ledger_subscription_ack(message) {
        return routes;
    }
    routes.push(Route::Emit(ClientEvent::Message(message.clone())));

    match push {
        Push::LedgerClosed { ledger, message } => {
            routes.push(Route::RecordLedger(ledger));
            routes.push(Route::Emit(ClientEvent::Ledger(message)));
        }
        Push::PathFind(message) => routes.push(Route::Emit(ClientEvent::Path(message))),
        Push::Transaction(message) => routes.push(Route::Emit(ClientEvent::Transaction(message))),
        Push::Validation(message) => routes.push(Route::Emit(ClientEvent::Validation(message))),
        other => match matched {
            Some(SubscriptionKind::PathFind) => {
                routes.push(Route::Emit(ClientEvent::Path(other.message().clone())));
            }
            Some(SubscriptionKind::LedgerStream) => {
                let message = other.message();
                let payload = message.get("result").cloned().unwrap_or_else(|| message.clone());
                routes.push(Route::Emit(ClientEvent::Ledger(payload)));
            }
            Some(SubscriptionKind::Other) => {}
            None => match other {
                Push::ClusterInfo(message) => routes.push(Route::ClusterInfo(message)),
                other if !internal => routes.push(Route::Unhandled(other.message().clone())),
                _ => {}
            },
        },
    }

    routes
}
