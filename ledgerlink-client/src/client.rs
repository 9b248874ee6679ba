//! The public client handle
//!
//! `LedgerClient` is a thin, cloneable front for the engine task: every
//! operation becomes a [`Command`] on an unbounded channel, answered through
//! a oneshot. All clones share one connection, one registry and one event
//! bus. When the last clone is dropped the engine shuts itself down.
//!
//! # Client Lifecycle
//!
//! 1. **Connect**: [`ClientBuilder::connect`](crate::ClientBuilder::connect)
//!    spawns the engine, which starts connecting immediately
//! 2. **Use**: [`send`](LedgerClient::send) calls, wait for
//!    [`ready`](LedgerClient::ready), read [`events`](LedgerClient::events)
//! 3. **Close / reinstate**: [`close`](LedgerClient::close) stops
//!    reconnecting, [`reinstate`](LedgerClient::reinstate) resumes
//! 4. **Destroy**: terminal; everything outstanding is rejected
//!
//! # Examples
//!
//! ```rust,no_run
//! use ledgerlink_client::LedgerClient;
//! use ledgerlink_core::SendOptions;
//! use serde_json::json;
//!
//! # async fn example() -> ledgerlink_core::Result<()> {
//! let client = LedgerClient::connect(["wss://xrplcluster.com"]).await?;
//! client.ready().await?;
//!
//! let info = client
//!     .send(json!({"command": "server_info", "id": "mine"}), SendOptions::new())
//!     .await?;
//! println!("{}", info["info"]["build_version"]);
//! println!("{:?}", client.get_state().await?.fee);
//! client.destroy().await;
//! # Ok(())
//! # }
//! ```

use crate::engine::Command;
use crate::events::{ClientEvent, EventBus, EventKind, EventStream, ListenerHandle};
use crate::ClientBuilder;
use ledgerlink_core::{ConnectionState, Error, Request, Result, SendOptions};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Options for [`LedgerClient::reinstate`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReinstateOptions {
    /// Fail over to the next endpoint before reconnecting
    pub force_next_uplink: bool,
}

/// Handle to a resilient ledger node connection
#[derive(Debug, Clone)]
pub struct LedgerClient {
    commands: mpsc::UnboundedSender<Command>,
    bus: Arc<EventBus>,
}

impl LedgerClient {
    pub(crate) fn new(commands: mpsc::UnboundedSender<Command>, bus: Arc<EventBus>) -> Self {
        Self { commands, bus }
    }

    /// Connect to `endpoints` with default options
    ///
    /// An empty or entirely invalid list selects the built-in endpoints.
    pub async fn connect<I, S>(endpoints: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ClientBuilder::new().with_endpoints(endpoints).connect().await
    }

    fn dispatch(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| Error::Destroyed)
    }

    /// Send a command and wait for its result
    ///
    /// `request` must be an object with a `command`; its `id`, if any, is
    /// restored on the reply. Resolves with the reply's `result` (or the
    /// whole reply when there is none). `subscribe`, `unsubscribe` and
    /// `path_find` are replayed after every reconnect unless
    /// `no_replay_after_reconnect` is set.
    pub async fn send(&self, request: Value, options: SendOptions) -> Result<Value> {
        let mut request = Request::from_value(request)?;
        request.strip_ledger_unsubscribe()?;

        let (reply, outcome) = oneshot::channel();
        self.dispatch(Command::Send {
            request,
            options,
            reply,
        })?;
        outcome.await.map_err(|_| Error::Destroyed)?
    }

    /// [`send`](Self::send), deserialising the result into `R`
    pub async fn send_as<R: DeserializeOwned>(
        &self,
        request: Value,
        options: SendOptions,
    ) -> Result<R> {
        let value = self.send(request, options).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Resolves once online with recent contact and a known validated ledger
    pub async fn ready(&self) -> Result<()> {
        let (waiter, outcome) = oneshot::channel();
        self.dispatch(Command::Ready(waiter))?;
        outcome.await.map_err(|_| Error::Destroyed)?
    }

    /// Snapshot of connectivity and node telemetry
    pub async fn get_state(&self) -> Result<ConnectionState> {
        let (reply, state) = oneshot::channel();
        self.dispatch(Command::State(reply))?;
        state.await.map_err(|_| Error::Destroyed)
    }

    /// Cluster metadata pushed by a proxying node
    ///
    /// Pending until such a message arrives.
    pub async fn cluster_info(&self) -> Result<Value> {
        let (reply, info) = oneshot::channel();
        self.dispatch(Command::ClusterInfo(reply))?;
        info.await.map_err(|_| Error::Destroyed)
    }

    /// Protocol definitions served by the node, if it provides them
    pub async fn definitions(&self) -> Result<Option<Value>> {
        let definitions = self
            .send(json!({"command": "server_definitions"}), SendOptions::new())
            .await?;
        Ok(definitions.get("FIELDS").is_some().then_some(definitions))
    }

    /// Close the connection and stop reconnecting
    ///
    /// Outstanding calls are rejected with [`Error::Closed`]; subscriptions
    /// are kept for [`reinstate`](Self::reinstate). Closing twice is a no-op.
    pub async fn close(&self) {
        let (done, closed) = oneshot::channel();
        if self.dispatch(Command::Close(done)).is_ok() {
            let _ = closed.await;
        }
    }

    /// Undo [`close`](Self::close) and connect again
    pub async fn reinstate(&self, options: ReinstateOptions) -> Result<()> {
        let (done, outcome) = oneshot::channel();
        self.dispatch(Command::Reinstate {
            force_next_uplink: options.force_next_uplink,
            done,
        })?;
        outcome.await.map_err(|_| Error::Destroyed)?
    }

    /// Close for good, rejecting everything and detaching every listener
    pub async fn destroy(&self) {
        let (done, destroyed) = oneshot::channel();
        if self.dispatch(Command::Destroy(done)).is_ok() {
            let _ = destroyed.await;
        }
    }

    /// Every event published from now on
    pub fn events(&self) -> EventStream {
        self.bus.subscribe()
    }

    /// Run `handler` for every event of `kind` until unsubscribed or
    /// destroyed
    pub fn on<F, Fut>(&self, kind: EventKind, handler: F) -> ListenerHandle
    where
        F: Fn(ClientEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.bus.on(kind, handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detached() -> (LedgerClient, mpsc::UnboundedReceiver<Command>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (LedgerClient::new(tx, EventBus::new(8)), rx)
    }

    #[tokio::test]
    async fn test_invalid_requests_never_reach_engine() {
        let (client, mut commands) = detached();

        let not_object = client.send(json!(["server_info"]), SendOptions::new()).await;
        assert!(matches!(not_object, Err(Error::InvalidRequest(_))));

        let ledger_only = client
            .send(json!({"command": "unsubscribe", "streams": ["ledger"]}), SendOptions::new())
            .await;
        assert!(matches!(ledger_only, Err(Error::InvalidRequest(_))));

        assert!(commands.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_forwards_normalised_request() {
        let (client, mut commands) = detached();
        let call = tokio::spawn({
            let client = client.clone();
            async move {
                client
                    .send(
                        json!({"command": " Unsubscribe ", "streams": ["ledger", "transactions"]}),
                        SendOptions::new(),
                    )
                    .await
            }
        });

        match commands.recv().await {
            Some(Command::Send { request, reply, .. }) => {
                assert_eq!(request.command(), "unsubscribe");
                assert_eq!(request.body()["streams"], json!(["transactions"]));
                reply.send(Ok(json!({"ok": true}))).unwrap();
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(call.await.unwrap().unwrap(), json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_engine_gone_means_destroyed() {
        let (client, commands) = detached();
        drop(commands);
        let outcome = client.send(json!({"command": "ping"}), SendOptions::new()).await;
        assert_eq!(outcome, Err(Error::Destroyed));
        assert_eq!(client.ready().await, Err(Error::Destroyed));
        assert!(client.get_state().await.is_err());
        client.close().await;
        client.destroy().await;
    }

    #[test]
    fn test_reinstate_options_from_json() {
        let options: ReinstateOptions =
            serde_json::from_str(r#"{"forceNextUplink": true}"#).unwrap();
        assert!(options.force_next_uplink);
        assert!(!ReinstateOptions::default().force_next_uplink);
    }
}
