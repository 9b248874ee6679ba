//! Racing several endpoints
//!
//! [`first_ok`] polls a set of candidate futures concurrently and returns
//! the first success within a window. Everything still running is dropped
//! with the combinator, which for transport probes means their links close.

use crate::transport::{TransportEvent, TransportLink};
use futures::stream::{FuturesUnordered, StreamExt};
use ledgerlink_core::codec::{self, Inbound, Reply};
use ledgerlink_core::{Envelope, Request, ServerInfo};
use std::future::Future;
use std::time::Duration;

/// Internal id used by race probes; never allocated by the registry
pub const PROBE_ID: u64 = 0;

/// First candidate to succeed within `window`, or `None`
pub async fn first_ok<I, F, T, E>(candidates: I, window: Duration) -> Option<T>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = std::result::Result<T, E>>,
    E: std::fmt::Display,
{
    let mut running: FuturesUnordered<F> = candidates.into_iter().collect();
    let race = async {
        while let Some(outcome) = running.next().await {
            match outcome {
                Ok(winner) => return Some(winner),
                Err(e) => tracing::debug!(error = %e, "race candidate failed"),
            }
        }
        None
    };
    tokio::time::timeout(window, race).await.ok().flatten()
}

/// A probed endpoint that answered with usable ledgers
#[derive(Debug)]
pub struct Winner {
    pub index: usize,
    pub endpoint: String,
    pub link: TransportLink,
    /// The probe's `server_info` reply
    pub reply: Reply,
}

/// Wait for `link` to open, send a `server_info` probe and accept the link
/// once the node reports a non-empty validated ledger range
pub async fn probe(
    index: usize,
    endpoint: String,
    mut link: TransportLink,
    sent_at_ms: u64,
) -> std::result::Result<Winner, String> {
    let request = Request::server_info(sent_at_ms);
    let envelope = Envelope::new(PROBE_ID, request.external_id().cloned());
    let frame = codec::encode_request(&request, &envelope).map_err(|e| e.to_string())?;

    loop {
        match link.next_event().await {
            TransportEvent::Open => {
                if !link.send(frame.clone()) {
                    return Err(format!("{endpoint}: link gone before probe"));
                }
            }
            TransportEvent::Message(text) => {
                let Ok(Inbound::Reply(reply)) = codec::decode(&text) else {
                    continue;
                };
                if reply.envelope.internal_id != PROBE_ID {
                    continue;
                }
                match ServerInfo::from_reply(&reply.message) {
                    Some(info) if info.has_ledgers() => {
                        return Ok(Winner {
                            index,
                            endpoint,
                            link,
                            reply,
                        })
                    }
                    _ => return Err(format!("{endpoint}: no validated ledgers")),
                }
            }
            TransportEvent::Error(e) => {
                tracing::debug!(endpoint = %endpoint, error = %e, "race candidate error");
            }
            TransportEvent::Closed { reason, .. } => {
                return Err(format!("{endpoint}: closed ({reason})"));
            }
        }
    }
}
