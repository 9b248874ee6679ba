//! Client notifications
//!
//! Each client owns one [`EventBus`] (a `tokio::sync::broadcast` channel).
//! Application code either reads every event through an [`EventStream`] or
//! registers an async handler for one [`EventKind`] with [`EventBus::on`],
//! which returns a [`ListenerHandle`] that detaches it again. Destroying
//! the client detaches every handler.
//!
//! # Examples
//!
//! ```rust,no_run
//! use ledgerlink_client::{EventKind, LedgerClient};
//!
//! # async fn example(client: &LedgerClient) {
//! let listener = client.on(EventKind::Ledger, |event| async move {
//!     println!("ledger closed: {:?}", event);
//! });
//!
//! let mut events = client.events();
//! while let Some(event) = events.recv().await {
//!     println!("{}", event.kind());
//! }
//! listener.unsubscribe();
//! # }
//! ```

use futures::Stream;
use ledgerlink_core::{ConnectionState, Error};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::task::AbortHandle;

/// A notification published by the client
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Every inbound message except the client's own bookkeeping
    Message(Value),
    Ledger(Value),
    Transaction(Value),
    Validation(Value),
    Path(Value),
    State(ConnectionState),
    Online,
    Offline,
    Close,
    Retry,
    /// The endpoint cursor wrapped around
    Round,
    /// Now using this endpoint
    NodeSwitch(String),
    ClusterInfo(Value),
    Error(Error),
}

/// Topic of a [`ClientEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Message,
    Ledger,
    Transaction,
    Validation,
    Path,
    State,
    Online,
    Offline,
    Close,
    Retry,
    Round,
    NodeSwitch,
    ClusterInfo,
    Error,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Message => "message",
            EventKind::Ledger => "ledger",
            EventKind::Transaction => "transaction",
            EventKind::Validation => "validation",
            EventKind::Path => "path",
            EventKind::State => "state",
            EventKind::Online => "online",
            EventKind::Offline => "offline",
            EventKind::Close => "close",
            EventKind::Retry => "retry",
            EventKind::Round => "round",
            EventKind::NodeSwitch => "nodeswitch",
            EventKind::ClusterInfo => "clusterinfo",
            EventKind::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ClientEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ClientEvent::Message(_) => EventKind::Message,
            ClientEvent::Ledger(_) => EventKind::Ledger,
            ClientEvent::Transaction(_) => EventKind::Transaction,
            ClientEvent::Validation(_) => EventKind::Validation,
            ClientEvent::Path(_) => EventKind::Path,
            ClientEvent::State(_) => EventKind::State,
            ClientEvent::Online => EventKind::Online,
            ClientEvent::Offline => EventKind::Offline,
            ClientEvent::Close => EventKind::Close,
            ClientEvent::Retry => EventKind::Retry,
            ClientEvent::Round => EventKind::Round,
            ClientEvent::NodeSwitch(_) => EventKind::NodeSwitch,
            ClientEvent::ClusterInfo(_) => EventKind::ClusterInfo,
            ClientEvent::Error(_) => EventKind::Error,
        }
    }
}

/// Per-client publish/subscribe hub
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<ClientEvent>,
    listeners: Mutex<Vec<AbortHandle>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self {
            sender,
            listeners: Mutex::new(Vec::new()),
        })
    }

    /// Publish to every current subscriber
    pub fn emit(&self, event: ClientEvent) {
        tracing::trace!(event = %event.kind(), "emit");
        let _ = self.sender.send(event);
    }

    /// Receive every event published from now on
    pub fn subscribe(&self) -> EventStream {
        EventStream {
            receiver: self.sender.subscribe(),
        }
    }

    /// Run `handler` for every event of `kind`
    pub fn on<F, Fut>(&self, kind: EventKind, handler: F) -> ListenerHandle
    where
        F: Fn(ClientEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut events = self.subscribe();
        let task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if event.kind() == kind {
                    handler(event).await;
                }
            }
        });

        let abort = task.abort_handle();
        let mut listeners = self
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        listeners.retain(|listener| !listener.is_finished());
        listeners.push(abort.clone());
        ListenerHandle { kind, abort }
    }

    #[cfg(test)]
    fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Stop every handler registered through [`EventBus::on`]
    pub fn detach_all(&self) {
        let listeners = std::mem::take(
            &mut *self
                .listeners
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        tracing::debug!(count = listeners.len(), "detaching listeners");
        for listener in listeners {
            listener.abort();
        }
    }
}

/// Receiving end of the event bus
#[derive(Debug)]
pub struct EventStream {
    receiver: broadcast::Receiver<ClientEvent>,
}

impl EventStream {
    /// Next event; `None` once the client is gone
    ///
    /// A subscriber that falls behind skips what it missed.
    pub async fn recv(&mut self) -> Option<ClientEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next event if one is already queued
    pub fn try_recv(&mut self) -> Option<ClientEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Wait for the next event of `kind`, skipping others
    pub async fn next_of(&mut self, kind: EventKind) -> Option<ClientEvent> {
        while let Some(event) = self.recv().await {
            if event.kind() == kind {
                return Some(event);
            }
        }
        None
    }

    /// Adapt into a `futures` stream
    pub fn into_stream(self) -> impl Stream<Item = ClientEvent> {
        futures::stream::unfold(self, |mut events| async move {
            events.recv().await.map(|event| (event, events))
        })
    }
}

/// Handle to a handler registered with [`EventBus::on`]
#[derive(Debug)]
pub struct ListenerHandle {
    kind: EventKind,
    abort: AbortHandle,
}

impl ListenerHandle {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Stop the handler
    pub fn unsubscribe(self) {
        self.abort.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_subscribers_see_events_in_order() {
        let bus = EventBus::new(16);
        let mut events = bus.subscribe();
        bus.emit(ClientEvent::Online);
        bus.emit(ClientEvent::NodeSwitch("wss://b".into()));

        assert_eq!(events.recv().await.map(|e| e.kind()), Some(EventKind::Online));
        match events.recv().await {
            Some(ClientEvent::NodeSwitch(endpoint)) => assert_eq!(endpoint, "wss://b"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_handler_only_sees_its_kind() {
        let bus = EventBus::new(16);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let listener = bus.on(EventKind::Retry, move |_| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert_eq!(listener.kind(), EventKind::Retry);

        bus.emit(ClientEvent::Retry);
        bus.emit(ClientEvent::Close);
        bus.emit(ClientEvent::Retry);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 2);

        listener.unsubscribe();
        tokio::time::sleep(Duration::from_millis(5)).await;
        bus.emit(ClientEvent::Retry);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unsubscribed_handlers_are_forgotten() {
        let bus = EventBus::new(16);
        let first = bus.on(EventKind::Ledger, |_| async {});
        let _second = bus.on(EventKind::Ledger, |_| async {});
        assert_eq!(bus.listener_count(), 2);

        first.unsubscribe();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let _third = bus.on(EventKind::State, |_| async {});
        assert_eq!(bus.listener_count(), 2);
    }

    #[tokio::test]
    async fn test_detach_all_stops_handlers() {
        let bus = EventBus::new(16);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let _listener = bus.on(EventKind::Online, move |_| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        bus.detach_all();
        tokio::time::sleep(Duration::from_millis(5)).await;
        bus.emit(ClientEvent::Online);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_into_stream() {
        let bus = EventBus::new(4);
        let stream = bus.subscribe().into_stream();
        bus.emit(ClientEvent::Close);
        drop(bus);
        let kinds: Vec<_> = stream.map(|e| e.kind()).collect().await;
        assert_eq!(kinds, vec![EventKind::Close]);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(EventKind::NodeSwitch.to_string(), "nodeswitch");
        assert_eq!(ClientEvent::ClusterInfo(Value::Null).kind().as_str(), "clusterinfo");
    }
}
