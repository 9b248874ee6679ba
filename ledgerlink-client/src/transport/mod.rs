//! Transport adapter boundary
//!
//! The engine never touches a socket directly. A [`Connector`] opens one
//! [`TransportLink`] per attempted endpoint; the link is a pair of channels
//! carrying outbound frames one way and [`TransportEvent`]s the other.
//! Dropping a link closes whatever sits behind it, which is how losing
//! race candidates and stale connections are torn down.
//!
//! [`TungsteniteConnector`] is the production implementation. Tests plug in
//! an in-memory connector built on [`TransportLink::pair`].

mod websocket;

pub use self::websocket::TungsteniteConnector;

use ledgerlink_core::Error;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Event delivered by a transport link
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The socket is open and frames can be sent
    Open,
    /// Inbound text frame
    Message(String),
    /// Socket error, always [`Error::WebSocket`]; a `Closed` event follows
    Error(Error),
    /// The socket is gone
    Closed { code: Option<u16>, reason: String },
}

/// Frame queued towards the socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Close,
}

/// Options applied to every link a connector opens
#[derive(Debug, Clone, Default)]
pub struct TransportOptions {
    /// Extra HTTP headers on the WebSocket upgrade request
    pub headers: HashMap<String, String>,
}

/// Opens transport links to endpoints
pub trait Connector: Send + Sync + 'static {
    /// Start connecting to `endpoint`
    ///
    /// Must not block: the returned link reports `Open` (or `Closed`) once
    /// the attempt settles.
    fn open(&self, endpoint: &str, options: &TransportOptions) -> TransportLink;
}

/// Engine-side half of a transport connection
#[derive(Debug)]
pub struct TransportLink {
    outbound: mpsc::UnboundedSender<Outbound>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl TransportLink {
    /// Create a link and the peer half a connector drives
    pub fn pair() -> (TransportLink, TransportPeer) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (
            TransportLink {
                outbound: outbound_tx,
                events: events_rx,
            },
            TransportPeer {
                outbound: outbound_rx,
                events: events_tx,
            },
        )
    }

    /// Queue a text frame; false if the peer is gone
    pub fn send(&self, text: String) -> bool {
        self.outbound.send(Outbound::Text(text)).is_ok()
    }

    /// Ask the peer to close the socket
    pub fn close(&self) {
        let _ = self.outbound.send(Outbound::Close);
    }

    /// Next event from the peer
    ///
    /// A peer that disappears without saying goodbye reads as `Closed`.
    pub async fn next_event(&mut self) -> TransportEvent {
        match self.events.recv().await {
            Some(event) => event,
            None => TransportEvent::Closed {
                code: None,
                reason: "transport dropped".to_string(),
            },
        }
    }
}

/// Connector-side half of a transport connection
#[derive(Debug)]
pub struct TransportPeer {
    outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportPeer {
    /// Deliver an event to the link; false once the link is dropped
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Next outbound frame; `None` once the link is dropped
    pub async fn next_outbound(&mut self) -> Option<Outbound> {
        self.outbound.recv().await
    }

    /// Drain frames queued so far without waiting
    pub fn try_next_outbound(&mut self) -> Option<Outbound> {
        self.outbound.try_recv().ok()
    }

    /// Whether the engine side has been dropped
    pub fn is_detached(&self) -> bool {
        self.events.is_closed()
    }
}
