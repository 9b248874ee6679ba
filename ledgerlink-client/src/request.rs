//! Correlation registry
//!
//! Every call gets the next id from a monotonic counter and is wrapped in an
//! [`Envelope`] carrying that id and the caller's own id. Replies are matched
//! back by internal id against three collections, in order:
//!
//! 1. **pending** one-shot calls, removed when answered
//! 2. **internal** bookkeeping requests (ledger stream subscription,
//!    handshake and polling `server_info`), never visible to callers and
//!    never replayed by a flush
//! 3. **subscriptions**, persistent commands that stay tracked after their
//!    first reply and are re-sent after every reconnect
//!
//! Each call remembers the link generation it was last written to, so a
//! flush on the same link never sends it twice while a new link always gets
//! a fresh copy.
//!
//! # path_find
//!
//! At most one `path_find` flow is tracked. Any non-status `path_find`
//! (create or close) replaces the tracked one, rejecting its handle with
//! [`Error::Superseded`] if it never got a reply. Status probes are plain
//! one-shot calls.

use ledgerlink_core::codec::{self, Reply};
use ledgerlink_core::{Envelope, Error, Request, Result, SendOptions};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Where a call's outcome is delivered
pub type Responder = oneshot::Sender<Result<Value>>;

/// What an internal request is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalPurpose {
    /// The client's own `ledger` stream subscription
    LedgerStream,
    /// `server_info` sent right after a link opened
    Handshake { generation: u64 },
    /// `server_info` sent after a ledger close
    ServerInfoPoll,
}

/// Shape of a tracked subscription, used to classify its pushes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    PathFind,
    LedgerStream,
    Other,
}

/// A call waiting for its reply
#[derive(Debug)]
pub struct PendingCall {
    id: u64,
    request: Request,
    options: SendOptions,
    responder: Option<Responder>,
    sent_on: Option<u64>,
    timeout_armed: bool,
    submitted_at: Instant,
}

impl PendingCall {
    fn new(id: u64, request: Request, options: SendOptions, responder: Responder) -> Self {
        Self {
            id,
            request,
            options,
            responder: Some(responder),
            sent_on: None,
            timeout_armed: false,
            submitted_at: Instant::now(),
        }
    }

    fn envelope(&self) -> Envelope {
        Envelope::new(self.id, self.request.external_id().cloned())
    }

    fn settle(&mut self, outcome: Result<Value>) -> bool {
        match self.responder.take() {
            Some(responder) => {
                let _ = responder.send(outcome);
                true
            }
            None => false,
        }
    }

    fn kind(&self) -> SubscriptionKind {
        if self.request.command() == "path_find" {
            SubscriptionKind::PathFind
        } else if self.request.subscribes_stream(ledgerlink_core::types::LEDGER_STREAM) {
            SubscriptionKind::LedgerStream
        } else {
            SubscriptionKind::Other
        }
    }
}

/// A frame ready to be written to the current link
#[derive(Debug)]
pub struct Outgoing {
    pub id: u64,
    pub command: String,
    pub frame: String,
    /// Start this call's timeout now that it is on the wire
    pub arm_timeout: Option<Duration>,
}

/// Outcome of matching a reply
#[derive(Debug, Clone, PartialEq)]
pub enum Matched {
    /// A one-shot call was answered and removed
    Call { command: String, waited: Duration },
    /// One of the client's own requests
    Internal(InternalPurpose),
    /// A tracked subscription; it stays tracked
    Subscription(SubscriptionKind),
    /// Nothing is waiting for this id
    Unmatched,
}

/// Tracks every outstanding call
#[derive(Debug, Default)]
pub struct CallRegistry {
    next_id: u64,
    pending: BTreeMap<u64, PendingCall>,
    subscriptions: Vec<PendingCall>,
    internal: HashMap<u64, InternalPurpose>,
}

impl CallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Register a caller's request; returns its internal id
    pub fn register(
        &mut self,
        request: Request,
        options: SendOptions,
        responder: Responder,
    ) -> u64 {
        let id = self.allocate();
        let persistent = request.is_persistent()
            && !request.is_path_find_status()
            && !options.no_replay_after_reconnect;
        let call = PendingCall::new(id, request, options, responder);

        if !persistent {
            self.pending.insert(id, call);
            return id;
        }

        if call.request.command() == "path_find" {
            self.evict_path_find();
        }
        tracing::debug!(id, command = %call.request.command(), "tracking subscription");
        self.subscriptions.push(call);
        id
    }

    fn evict_path_find(&mut self) {
        let mut kept = Vec::with_capacity(self.subscriptions.len());
        for mut call in self.subscriptions.drain(..) {
            if call.request.command() == "path_find" {
                tracing::debug!(id = call.id, "replacing path_find flow");
                call.settle(Err(Error::Superseded));
            } else {
                kept.push(call);
            }
        }
        self.subscriptions = kept;
    }

    /// Register one of the client's own requests and encode it
    pub fn register_internal(
        &mut self,
        purpose: InternalPurpose,
        request: &Request,
    ) -> Result<(u64, String)> {
        let id = self.allocate();
        let envelope = Envelope::new(id, request.external_id().cloned());
        let frame = codec::encode_request(request, &envelope)?;
        self.internal.insert(id, purpose);
        Ok((id, frame))
    }

    /// Forget internal requests whose link is gone
    pub fn clear_internal(&mut self) {
        self.internal.clear();
    }

    /// Match a reply and settle whoever is waiting for it
    pub fn resolve(&mut self, reply: &Reply) -> Matched {
        let id = reply.envelope.internal_id;

        if let Some(mut call) = self.pending.remove(&id) {
            call.settle(Ok(reply.caller_value()));
            return Matched::Call {
                command: call.request.command().to_string(),
                waited: call.submitted_at.elapsed(),
            };
        }

        if let Some(purpose) = self.internal.remove(&id) {
            return Matched::Internal(purpose);
        }

        if let Some(call) = self.subscriptions.iter_mut().find(|call| call.id == id) {
            call.settle(Ok(reply.caller_value()));
            return Matched::Subscription(call.kind());
        }

        Matched::Unmatched
    }

    /// Frames to write to link `generation`
    ///
    /// Pending calls in id order, then subscriptions in registry order.
    /// Calls already written to this generation are skipped. Before the
    /// connection is ready only `send_if_not_ready` calls qualify.
    pub fn outbox(&mut self, generation: u64, ready: bool) -> Vec<Outgoing> {
        self.pending
            .values_mut()
            .chain(self.subscriptions.iter_mut())
            .filter(|call| call.sent_on != Some(generation))
            .filter(|call| ready || call.options.send_if_not_ready)
            .filter_map(|call| {
                let frame = match codec::encode_request(&call.request, &call.envelope()) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::warn!(id = call.id, error = %e, "dropping unencodable call");
                        return None;
                    }
                };
                call.sent_on = Some(generation);
                let deferred = call.options.timeout_starts_when_online && !call.timeout_armed;
                let arm_timeout = match call.options.timeout {
                    Some(timeout) if deferred => {
                        call.timeout_armed = true;
                        Some(timeout)
                    }
                    _ => None,
                };
                Some(Outgoing {
                    id: call.id,
                    command: call.request.command().to_string(),
                    frame,
                    arm_timeout,
                })
            })
            .collect()
    }

    /// Timeout to arm at submission, if the call has one that does not wait
    /// for transmission
    pub fn submission_timeout(&mut self, id: u64) -> Option<Duration> {
        let call = self
            .pending
            .get_mut(&id)
            .or_else(|| self.subscriptions.iter_mut().find(|call| call.id == id))?;
        match call.options.timeout {
            Some(timeout) if !call.options.timeout_starts_when_online => {
                call.timeout_armed = true;
                Some(timeout)
            }
            _ => None,
        }
    }

    /// A call's timeout fired; returns the command if something was rejected
    ///
    /// One-shot calls are dropped. A subscription only has its handle
    /// rejected and stays tracked for replay.
    pub fn expire(&mut self, id: u64) -> Option<String> {
        if let Some(mut call) = self.pending.remove(&id) {
            let timeout = call.options.timeout.unwrap_or_default();
            call.settle(Err(Error::Timeout(timeout)));
            return Some(call.request.command().to_string());
        }

        let call = self.subscriptions.iter_mut().find(|call| call.id == id)?;
        let timeout = call.options.timeout.unwrap_or_default();
        call.settle(Err(Error::Timeout(timeout)))
            .then(|| call.request.command().to_string())
    }

    /// Reject every one-shot call and every unanswered subscription handle;
    /// subscriptions stay tracked
    pub fn reject_outstanding(&mut self, error: &Error) -> Vec<u64> {
        let mut rejected: Vec<u64> = Vec::new();
        for (id, mut call) in std::mem::take(&mut self.pending) {
            call.settle(Err(error.clone()));
            rejected.push(id);
        }
        for call in &mut self.subscriptions {
            if call.settle(Err(error.clone())) {
                rejected.push(call.id);
            }
        }
        rejected
    }

    /// Reject and forget everything
    pub fn reject_all(&mut self, error: &Error) {
        self.reject_outstanding(error);
        self.subscriptions.clear();
        self.internal.clear();
    }

    #[cfg(test)]
    fn pending_len(&self) -> usize {
        self.pending.len()
    }

    #[cfg(test)]
    fn subscription_len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Ids of tracked subscriptions in registry order
    #[cfg(test)]
    fn subscription_ids(&self) -> Vec<u64> {
        self.subscriptions.iter().map(|call| call.id).collect()
    }
}
