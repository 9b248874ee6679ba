//! Common test utilities for ledgerlink-client integration tests
//!
//! [`MockNetwork`] is an in-memory [`Connector`]: every endpoint maps to a
//! scripted [`MockNode`] and every `open` spawns a task that plays that node
//! over a [`TransportPeer`]. Tests run it under paused Tokio time.
//!
//! [`MockLedgerNode`] is a real WebSocket server (tokio-tungstenite) for the
//! socket path.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use ledgerlink_client::{
    ClientBuilder, ClientOptions, Connector, EventKind, EventStream, LedgerClient, Outbound,
    TransportEvent, TransportLink, TransportOptions, TransportPeer,
};
use ledgerlink_core::Error;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// How a scripted node behaves
#[derive(Debug, Clone)]
pub struct MockNode {
    reachable: bool,
    opens: bool,
    complete_ledgers: String,
    reply_delay: Duration,
    silent: HashSet<String>,
    definitions: bool,
}

impl MockNode {
    /// Accepts connections and answers everything
    pub fn healthy() -> Self {
        Self {
            reachable: true,
            opens: true,
            complete_ledgers: "1000-2000".to_string(),
            reply_delay: Duration::ZERO,
            silent: HashSet::new(),
            definitions: false,
        }
    }

    /// Refuses every connection
    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::healthy()
        }
    }

    /// Accepts the connection but never finishes the handshake
    pub fn hanging() -> Self {
        Self {
            opens: false,
            ..Self::healthy()
        }
    }

    pub fn with_ledgers(mut self, complete_ledgers: &str) -> Self {
        self.complete_ledgers = complete_ledgers.to_string();
        self
    }

    /// Wait this long before every reply
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.reply_delay = delay;
        self
    }

    /// Never answer `command`
    pub fn silent_on(mut self, command: &str) -> Self {
        self.silent.insert(command.to_string());
        self
    }

    /// Serve protocol definitions from `server_definitions`
    pub fn with_definitions(mut self) -> Self {
        self.definitions = true;
        self
    }

    fn last_ledger(&self) -> u64 {
        self.complete_ledgers
            .rsplit(|c| c == '-' || c == ',')
            .next()
            .and_then(|last| last.parse().ok())
            .unwrap_or(0)
    }

    fn answer(&self, request: &Value) -> Option<Value> {
        let command = request["command"].as_str().unwrap_or_default();
        if self.silent.contains(command) {
            return None;
        }
        let id = request["id"].clone();
        let reply = |result: Value| {
            json!({"id": id, "result": result, "status": "success", "type": "response"})
        };

        let ledger_stream = request["streams"]
            .as_array()
            .is_some_and(|streams| streams.contains(&json!("ledger")));

        Some(match command {
            "server_info" => reply(json!({
                "info": {
                    "build_version": "2.2.3",
                    "complete_ledgers": self.complete_ledgers,
                    "pubkey_node": "n9KnrcCmL5psyKtk2KWP6jy14Hj4EXuZDg7XMdQJ9cSDoFSp53hu",
                    "server_state": "full",
                    "uptime": 3600,
                    "load_factor": 1,
                    "validated_ledger": {
                        "seq": self.last_ledger(),
                        "base_fee_xrp": 0.00001,
                        "reserve_base_xrp": 10,
                        "reserve_inc_xrp": 2
                    }
                }
            })),
            "subscribe" if ledger_stream => {
                reply(json!({
                    "ledger_index": self.last_ledger(),
                    "validated_ledgers": self.complete_ledgers,
                    "reserve_base": 10_000_000,
                    "reserve_inc": 2_000_000,
                    "fee_base": 10,
                    "ledger_time": 780000000
                }))
            }
            "subscribe" | "unsubscribe" | "path_find" => reply(json!({})),
            "server_definitions" if self.definitions => reply(json!({
                "FIELDS": [["Account", {"nth": 1, "type": "AccountID"}]],
                "TYPES": {"AccountID": 8}
            })),
            // Replies without a `result`, so callers see the whole message
            "ping" => json!({"id": id, "status": "success", "type": "response"}),
            other => reply(json!({"echo": other})),
        })
    }
}

/// One request a node received
#[derive(Debug, Clone)]
pub struct Received {
    pub endpoint: String,
    pub connection: usize,
    pub request: Value,
}

impl Received {
    pub fn command(&self) -> &str {
        self.request["command"].as_str().unwrap_or_default()
    }

    /// The caller's id inside the envelope
    pub fn external_id(&self) -> Option<&str> {
        self.request["id"]["externalId"].as_str()
    }

    pub fn is_internal(&self) -> bool {
        self.external_id()
            .is_some_and(|id| id.starts_with("_LedgerLink_Internal"))
    }
}

enum Control {
    Push(String),
    Drop,
}

#[derive(Default)]
struct NetworkState {
    nodes: HashMap<String, MockNode>,
    received: Vec<Received>,
    opened: Vec<String>,
    live: HashMap<String, usize>,
    controls: Vec<(String, mpsc::UnboundedSender<Control>)>,
    headers: Vec<HashMap<String, String>>,
}

/// In-memory network of scripted nodes
#[derive(Clone, Default)]
pub struct MockNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script `endpoint`; unknown endpoints are unreachable
    pub fn node(self, endpoint: &str, node: MockNode) -> Self {
        self.set_node(endpoint, node);
        self
    }

    /// Change how `endpoint` behaves for future connections
    pub fn set_node(&self, endpoint: &str, node: MockNode) {
        self.lock().nodes.insert(endpoint.to_string(), node);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, NetworkState> {
        self.state.lock().unwrap()
    }

    /// Deliver `message` on every live connection to `endpoint`
    pub fn push(&self, endpoint: &str, message: Value) {
        self.push_raw(endpoint, &message.to_string());
    }

    /// Deliver a text frame as is, valid JSON or not
    pub fn push_raw(&self, endpoint: &str, text: &str) {
        for (target, control) in &self.lock().controls {
            if target == endpoint {
                let _ = control.send(Control::Push(text.to_string()));
            }
        }
    }

    /// Drop every live connection to `endpoint` as if the network failed
    pub fn drop_connections(&self, endpoint: &str) {
        for (target, control) in &self.lock().controls {
            if target == endpoint {
                let _ = control.send(Control::Drop);
            }
        }
    }

    /// Every request received by `endpoint`, in arrival order
    pub fn received(&self, endpoint: &str) -> Vec<Received> {
        self.lock()
            .received
            .iter()
            .filter(|r| r.endpoint == endpoint)
            .cloned()
            .collect()
    }

    /// Commands received by `endpoint`
    pub fn commands(&self, endpoint: &str) -> Vec<String> {
        self.received(endpoint)
            .iter()
            .map(|r| r.command().to_string())
            .collect()
    }

    /// Requests received on the `connection`-th link (1-based, network wide)
    pub fn received_on(&self, connection: usize) -> Vec<Received> {
        self.lock()
            .received
            .iter()
            .filter(|r| r.connection == connection)
            .cloned()
            .collect()
    }

    /// How many links were opened to `endpoint`
    pub fn connect_count(&self, endpoint: &str) -> usize {
        self.lock().opened.iter().filter(|e| *e == endpoint).count()
    }

    /// How many links were opened overall
    pub fn total_connects(&self) -> usize {
        self.lock().opened.len()
    }

    /// Connections to `endpoint` still held open by the client
    pub fn live_connections(&self, endpoint: &str) -> usize {
        self.lock().live.get(endpoint).copied().unwrap_or(0)
    }

    /// Headers passed with every `open`
    pub fn headers_seen(&self) -> Vec<HashMap<String, String>> {
        self.lock().headers.clone()
    }
}

impl Connector for MockNetwork {
    fn open(&self, endpoint: &str, options: &TransportOptions) -> TransportLink {
        let (link, peer) = TransportLink::pair();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (node, connection) = {
            let mut state = self.lock();
            state.opened.push(endpoint.to_string());
            state.headers.push(options.headers.clone());
            state.controls.push((endpoint.to_string(), control_tx));
            let node = state
                .nodes
                .get(endpoint)
                .cloned()
                .unwrap_or_else(MockNode::unreachable);
            (node, state.opened.len())
        };
        tokio::spawn(run_node(
            self.clone(),
            endpoint.to_string(),
            connection,
            node,
            peer,
            control_rx,
        ));
        link
    }
}

async fn run_node(
    network: MockNetwork,
    endpoint: String,
    connection: usize,
    node: MockNode,
    mut peer: TransportPeer,
    mut control: mpsc::UnboundedReceiver<Control>,
) {
    if !node.reachable {
        peer.emit(TransportEvent::Error(Error::WebSocket("connection refused".to_string())));
        peer.emit(TransportEvent::Closed {
            code: None,
            reason: "connection refused".to_string(),
        });
        return;
    }

    *network.lock().live.entry(endpoint.clone()).or_default() += 1;
    if node.opens {
        peer.emit(TransportEvent::Open);
    }

    while node.opens {
        tokio::select! {
            frame = peer.next_outbound() => match frame {
                Some(Outbound::Text(text)) => {
                    let request: Value = serde_json::from_str(&text).unwrap();
                    network.lock().received.push(Received {
                        endpoint: endpoint.clone(),
                        connection,
                        request: request.clone(),
                    });
                    if let Some(reply) = node.answer(&request) {
                        if !node.reply_delay.is_zero() {
                            tokio::time::sleep(node.reply_delay).await;
                        }
                        peer.emit(TransportEvent::Message(reply.to_string()));
                    }
                }
                Some(Outbound::Close) => {
                    peer.emit(TransportEvent::Closed {
                        code: Some(1000),
                        reason: "closed by client".to_string(),
                    });
                    break;
                }
                None => break,
            },
            Some(command) = control.recv() => match command {
                Control::Push(text) => {
                    peer.emit(TransportEvent::Message(text));
                }
                Control::Drop => {
                    peer.emit(TransportEvent::Closed {
                        code: Some(1006),
                        reason: "abnormal closure".to_string(),
                    });
                    break;
                }
            },
        }
    }

    if !node.opens {
        while let Some(frame) = peer.next_outbound().await {
            if frame == Outbound::Close {
                break;
            }
        }
    }

    if let Some(live) = network.lock().live.get_mut(&endpoint) {
        *live -= 1;
    }
}

/// Spawn a client on `network`
pub async fn connect(
    network: &MockNetwork,
    endpoints: &[&str],
    options: ClientOptions,
) -> LedgerClient {
    ClientBuilder::new()
        .with_endpoints(endpoints.iter().copied())
        .with_options(options)
        .with_connector(network.clone())
        .connect()
        .await
        .unwrap()
}

/// Kinds of every event already queued
pub fn drain_kinds(events: &mut EventStream) -> Vec<EventKind> {
    let mut kinds = Vec::new();
    while let Some(event) = events.try_recv() {
        kinds.push(event.kind());
    }
    kinds
}

/// Kinds of events received up to and including the first `kind`
pub async fn kinds_until(events: &mut EventStream, kind: EventKind) -> Vec<EventKind> {
    let mut kinds = Vec::new();
    while let Some(event) = events.recv().await {
        kinds.push(event.kind());
        if event.kind() == kind {
            break;
        }
    }
    kinds
}

/// A `ledgerClosed` stream message
pub fn ledger_closed(ledger_index: u64) -> Value {
    json!({
        "type": "ledgerClosed",
        "ledger_index": ledger_index,
        "ledger_hash": "A1B2C3",
        "ledger_time": 780000000,
        "validated_ledgers": format!("1000-{ledger_index}"),
        "reserve_base": 10_000_000,
        "reserve_inc": 2_000_000,
        "fee_base": 10,
        "txn_count": 7
    })
}

/// Let every task run and virtual time move a little
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// Real WebSocket server speaking just enough of the node protocol
pub struct MockLedgerNode {
    addr: SocketAddr,
    received: mpsc::UnboundedReceiver<Value>,
    shutdown: mpsc::Sender<()>,
}

impl MockLedgerNode {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (received_tx, received) = mpsc::unbounded_channel();
        let (shutdown, mut shutdown_rx) = mpsc::channel::<()>(1);
        let node = MockNode::healthy();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    accepted = listener.accept() => {
                        let Ok((stream, _)) = accepted else { continue };
                        let received_tx = received_tx.clone();
                        let node = node.clone();
                        tokio::spawn(async move {
                            let Ok(ws) = accept_async(stream).await else { return };
                            let (mut write, mut read) = ws.split();
                            while let Some(Ok(message)) = read.next().await {
                                let Message::Text(text) = message else { continue };
                                let request: Value = serde_json::from_str(&text).unwrap();
                                let _ = received_tx.send(request.clone());
                                if let Some(reply) = node.answer(&request) {
                                    if write.send(Message::Text(reply.to_string())).await.is_err() {
                                        break;
                                    }
                                }
                            }
                        });
                    }
                }
            }
        });

        Self {
            addr,
            received,
            shutdown,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Next request the server received
    pub async fn next_request(&mut self) -> Option<Value> {
        self.received.recv().await
    }

    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(()).await;
    }
}
