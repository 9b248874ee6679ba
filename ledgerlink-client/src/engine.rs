//! The connection engine
//!
//! One task per client owns every piece of mutable state: the current link,
//! the endpoint cursor, the call registry, server telemetry and all timers.
//! It multiplexes four sources with `tokio::select!`:
//!
//! - commands from [`LedgerClient`](crate::LedgerClient) handles
//! - events from the current transport link
//! - the outcome of a racing round
//! - the earliest armed timer
//!
//! Handlers run to completion one at a time, so nothing here needs a lock.
//! When every client handle is dropped the command channel closes and the
//! engine destroys itself.

use crate::client_builder::ClientOptions;
use crate::connection_state::{AttemptOutcome, ConnectionManager, LifecycleState};
use crate::dispatch::{self, Route};
use crate::events::{ClientEvent, EventBus};
use crate::metrics::ClientMetrics;
use crate::race::{self, Winner};
use crate::reconnect::ReconnectionStrategy;
use crate::request::{CallRegistry, InternalPurpose, Matched, Responder};
use crate::scheduler::{sleep_until, Clock, Scheduler, TimerKey};
use crate::transport::{Connector, TransportEvent, TransportLink, TransportOptions};
use ledgerlink_core::codec::{self, Inbound, Reply};
use ledgerlink_core::types::probe_sent_at;
use ledgerlink_core::{
    ConnectionState, Error, LedgerClosed, Request, Result, SendOptions, ServerInfo, ServerState,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// Contact must be this recent for `ready()` to resolve immediately
const READY_CONTACT_SECS: f64 = 10.0;

/// Requests from client handles
#[derive(Debug)]
pub(crate) enum Command {
    Send {
        request: Request,
        options: SendOptions,
        reply: Responder,
    },
    Ready(oneshot::Sender<Result<()>>),
    State(oneshot::Sender<ConnectionState>),
    ClusterInfo(oneshot::Sender<Value>),
    Close(oneshot::Sender<()>),
    Reinstate {
        force_next_uplink: bool,
        done: oneshot::Sender<Result<()>>,
    },
    Destroy(oneshot::Sender<()>),
}

/// Everything the builder hands to a new engine
pub(crate) struct EngineParts {
    pub connector: Arc<dyn Connector>,
    pub options: ClientOptions,
    pub connection: ConnectionManager,
    pub strategy: Box<dyn ReconnectionStrategy>,
    pub bus: Arc<EventBus>,
    pub metrics: Option<Arc<ClientMetrics>>,
}

#[derive(Debug)]
struct RaceOutcome {
    round: u64,
    winner: Option<Winner>,
}

pub(crate) struct Engine {
    connector: Arc<dyn Connector>,
    transport: TransportOptions,
    options: ClientOptions,
    connection: ConnectionManager,
    strategy: Box<dyn ReconnectionStrategy>,
    registry: CallRegistry,
    server: ServerState,
    scheduler: Scheduler,
    clock: Clock,
    bus: Arc<EventBus>,
    metrics: Option<Arc<ClientMetrics>>,

    link: Option<TransportLink>,
    /// Bumped for every link, so the outbox can tell a fresh link apart
    generation: u64,
    link_open: bool,
    ready: bool,
    ever_online: bool,
    closed: bool,
    destroyed: bool,

    cluster_info: Option<Value>,
    cluster_waiters: Vec<oneshot::Sender<Value>>,
    ready_waiters: Vec<oneshot::Sender<Result<()>>>,

    race_tx: mpsc::UnboundedSender<RaceOutcome>,
    race_rx: mpsc::UnboundedReceiver<RaceOutcome>,
    race_round: u64,
    race_task: Option<JoinHandle<()>>,
}

/// Start an engine task; the returned sender is the only way to reach it
pub(crate) fn spawn(parts: EngineParts) -> mpsc::UnboundedSender<Command> {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let engine = Engine::new(parts);
    tokio::spawn(engine.run(commands_rx));
    commands_tx
}

/// Next event of the current link; pending forever when there is none
async fn next_link_event(link: &mut Option<TransportLink>) -> TransportEvent {
    match link {
        Some(link) => link.next_event().await,
        None => std::future::pending().await,
    }
}

impl Engine {
    fn new(parts: EngineParts) -> Self {
        let (race_tx, race_rx) = mpsc::unbounded_channel();
        let transport = TransportOptions {
            headers: parts.options.headers.clone(),
        };
        Self {
            connector: parts.connector,
            transport,
            server: ServerState::new(parts.options.fee_policy()),
            options: parts.options,
            connection: parts.connection,
            strategy: parts.strategy,
            registry: CallRegistry::new(),
            scheduler: Scheduler::new(),
            clock: Clock::new(),
            bus: parts.bus,
            metrics: parts.metrics,
            link: None,
            generation: 0,
            link_open: false,
            ready: false,
            ever_online: false,
            closed: false,
            destroyed: false,
            cluster_info: None,
            cluster_waiters: Vec::new(),
            ready_waiters: Vec::new(),
            race_tx,
            race_rx,
            race_round: 0,
            race_task: None,
        }
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        self.connect();

        loop {
            let deadline = self.scheduler.next_deadline();
            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                event = next_link_event(&mut self.link) => self.on_transport_event(event),
                Some(outcome) = self.race_rx.recv() => self.on_race_outcome(outcome),
                _ = sleep_until(deadline) => self.fire_timers(),
            }
        }

        if !self.destroyed {
            debug!("all client handles dropped");
            self.destroy();
        }
    }

    // ---- commands ----

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Send {
                request,
                options,
                reply,
            } => self.submit(request, options, reply),
            Command::Ready(waiter) => self.await_ready(waiter),
            Command::State(reply) => {
                let _ = reply.send(self.snapshot());
            }
            Command::ClusterInfo(reply) => match &self.cluster_info {
                Some(info) => {
                    let _ = reply.send(info.clone());
                }
                None if !self.destroyed => self.cluster_waiters.push(reply),
                None => {}
            },
            Command::Close(done) => {
                self.close();
                let _ = done.send(());
            }
            Command::Reinstate {
                force_next_uplink,
                done,
            } => {
                let _ = done.send(self.reinstate(force_next_uplink));
            }
            Command::Destroy(done) => {
                self.destroy();
                let _ = done.send(());
            }
        }
    }

    fn submit(&mut self, request: Request, options: SendOptions, reply: Responder) {
        if self.destroyed {
            let _ = reply.send(Err(Error::Destroyed));
            return;
        }
        if self.closed {
            let _ = reply.send(Err(Error::Closed));
            return;
        }

        let command = request.command().to_string();
        let id = self.registry.register(request, options, reply);
        debug!(id, command = %command, "call registered");
        if let Some(timeout) = self.registry.submission_timeout(id) {
            self.scheduler.arm(TimerKey::CallTimeout(id), timeout);
        }
        self.flush();
    }

    fn await_ready(&mut self, waiter: oneshot::Sender<Result<()>>) {
        if self.destroyed {
            let _ = waiter.send(Err(Error::Destroyed));
        } else if self.closed {
            let _ = waiter.send(Err(Error::Closed));
        } else if self.is_ready_now() {
            let _ = waiter.send(Ok(()));
        } else {
            self.ready_waiters.push(waiter);
        }
    }

    fn is_online(&self) -> bool {
        self.ready && self.link_open && !self.closed
    }

    /// Online, heard from the node recently and knows a validated ledger
    fn is_ready_now(&self) -> bool {
        let now = Instant::now();
        self.is_online()
            && self
                .server
                .sec_last_contact(now)
                .is_some_and(|secs| secs < READY_CONTACT_SECS)
            && self.server.ledger_range().last().unwrap_or(0) > 0
    }

    fn check_ready_waiters(&mut self) {
        if self.ready_waiters.is_empty() || !self.is_ready_now() {
            return;
        }
        for waiter in self.ready_waiters.drain(..) {
            let _ = waiter.send(Ok(()));
        }
    }

    fn reject_ready_waiters(&mut self, error: &Error) {
        for waiter in self.ready_waiters.drain(..) {
            let _ = waiter.send(Err(error.clone()));
        }
    }

    fn snapshot(&self) -> ConnectionState {
        self.server
            .snapshot(self.is_online(), self.connection.current(), Instant::now())
    }

    fn emit_state(&self) {
        self.bus.emit(ClientEvent::State(self.snapshot()));
    }

    fn set_state(&mut self, state: LifecycleState) {
        self.connection.set_state(state);
        if let Some(metrics) = &self.metrics {
            metrics.record_state(state);
        }
    }

    // ---- connecting ----

    fn connect(&mut self) {
        if self.closed || self.destroyed {
            return;
        }
        self.scheduler.cancel(TimerKey::Reconnect);
        self.discard_link();

        if self.options.try_all_nodes && self.connection.endpoints().len() > 1 {
            self.start_race();
            return;
        }

        match self.connection.begin_attempt() {
            AttemptOutcome::Proceed => {}
            AttemptOutcome::Switched { endpoint, wrapped } => {
                if wrapped {
                    info!("every endpoint tried, starting a new round");
                    self.bus.emit(ClientEvent::Round);
                }
                self.announce_switch(endpoint);
            }
            AttemptOutcome::Exhausted { endpoint, attempts } => {
                self.exhaust(endpoint, attempts);
                return;
            }
        }

        let endpoint = self.connection.current().to_string();
        info!(endpoint = %endpoint, attempt = self.connection.attempts(), "connecting");
        self.set_state(LifecycleState::Connecting);
        self.generation += 1;
        self.link = Some(self.connector.open(&endpoint, &self.transport));
        self.scheduler
            .arm(TimerKey::ConnectTimeout, self.options.connect_timeout());
    }

    fn announce_switch(&self, endpoint: String) {
        info!(endpoint = %endpoint, "switching endpoint");
        if let Some(metrics) = &self.metrics {
            metrics.record_switch(&endpoint);
        }
        self.bus.emit(ClientEvent::NodeSwitch(endpoint));
    }

    /// Drop the current link without going through the reconnect path
    fn discard_link(&mut self) {
        self.abort_race();
        let was_ready = self.ready;
        if let Some(link) = self.link.take() {
            link.close();
        }
        self.link_open = false;
        self.ready = false;
        self.registry.clear_internal();
        self.scheduler.cancel(TimerKey::ConnectTimeout);
        self.scheduler.cancel(TimerKey::Liveliness);
        if was_ready {
            self.bus.emit(ClientEvent::Offline);
        }
    }

    fn abort_race(&mut self) {
        if let Some(task) = self.race_task.take() {
            debug!("aborting race");
            task.abort();
        }
    }

    fn start_race(&mut self) {
        match self.connection.begin_round() {
            AttemptOutcome::Exhausted { endpoint, attempts } => {
                self.exhaust(endpoint, attempts);
                return;
            }
            AttemptOutcome::Proceed | AttemptOutcome::Switched { .. } => {}
        }

        self.set_state(LifecycleState::Racing);
        self.race_round += 1;
        let round = self.race_round;
        let window = self.race_window();
        let sent_at = self.clock.now_ms();

        let candidates: Vec<_> = self
            .connection
            .endpoints()
            .iter()
            .enumerate()
            .map(|(index, endpoint)| {
                let link = self.connector.open(endpoint, &self.transport);
                race::probe(index, endpoint.to_string(), link, sent_at)
            })
            .collect();
        info!(
            candidates = candidates.len(),
            window_ms = window.as_millis() as u64,
            "racing endpoints"
        );

        let tx = self.race_tx.clone();
        self.race_task = Some(tokio::spawn(async move {
            let winner = race::first_ok(candidates, window).await;
            let _ = tx.send(RaceOutcome { round, winner });
        }));
    }

    fn race_window(&self) -> Duration {
        self.options
            .connect_timeout()
            .max(self.options.min_reconnect_delay())
    }

    fn on_race_outcome(&mut self, outcome: RaceOutcome) {
        if outcome.round != self.race_round || self.closed || self.destroyed {
            trace!(round = outcome.round, "stale race outcome");
            return;
        }
        self.race_task = None;

        match outcome.winner {
            Some(winner) => self.adopt(winner),
            None => {
                warn!("no endpoint produced a usable server_info in time");
                self.bus.emit(ClientEvent::Retry);
                self.schedule_reconnect();
            }
        }
    }

    fn adopt(&mut self, winner: Winner) {
        if self.connection.adopt(winner.index) {
            self.announce_switch(winner.endpoint.clone());
        }
        info!(endpoint = %winner.endpoint, "race won");

        self.generation += 1;
        self.link = Some(winner.link);
        self.link_open = true;
        self.set_state(LifecycleState::Open);
        self.bus.emit(ClientEvent::Message(winner.reply.restored_message()));
        self.record_server_info(&winner.reply);
        if self.ever_online {
            self.arm_watchdog();
        }
        self.handshake();
    }

    fn schedule_reconnect(&mut self) {
        let attempt = self.connection.attempts();
        let delay = self.strategy.next_delay(attempt);
        let endpoint = self.connection.current().to_string();
        info!(
            endpoint = %endpoint,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "reconnect scheduled"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_reconnect(&endpoint);
        }
        self.set_state(LifecycleState::Retrying);
        self.scheduler.arm(TimerKey::Reconnect, delay);
    }

    fn exhaust(&mut self, endpoint: String, attempts: u32) {
        let error = Error::AttemptsExhausted { endpoint, attempts };
        error!(error = %error, "giving up");

        self.closed = true;
        self.abort_race();
        self.scheduler.clear();
        self.registry.reject_outstanding(&error);
        self.reject_ready_waiters(&error);
        self.set_state(LifecycleState::Closed);
        self.bus.emit(ClientEvent::Error(error));
        self.emit_state();
    }

    // ---- link events ----

    fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Open => self.on_open(),
            TransportEvent::Message(text) => self.on_frame(&text),
            TransportEvent::Error(e) => {
                warn!(endpoint = %self.connection.current(), error = %e, "transport error");
            }
            TransportEvent::Closed { code, reason } => self.on_link_closed(code, &reason),
        }
    }

    fn on_open(&mut self) {
        self.scheduler.cancel(TimerKey::ConnectTimeout);
        self.link_open = true;
        self.set_state(LifecycleState::Open);
        info!(endpoint = %self.connection.current(), "link open");
        if self.ever_online {
            self.arm_watchdog();
        }
        self.handshake();
    }

    /// Ledger stream subscription, then a `server_info` whose reply makes
    /// the link ready
    fn handshake(&mut self) {
        self.send_internal(InternalPurpose::LedgerStream, &Request::ledger_subscription());
        let probe = Request::server_info(self.clock.now_ms());
        let purpose = InternalPurpose::Handshake {
            generation: self.generation,
        };
        self.send_internal(purpose, &probe);
        self.flush();
    }

    fn send_internal(&mut self, purpose: InternalPurpose, request: &Request) {
        let Some(link) = self.link.as_ref() else {
            return;
        };
        if !self.link_open {
            return;
        }
        match self.registry.register_internal(purpose, request) {
            Ok((id, frame)) => {
                trace!(id, command = %request.command(), "internal request");
                link.send(frame);
            }
            Err(e) => warn!(error = %e, "could not encode internal request"),
        }
    }

    /// Write every call that may go out on the current link
    fn flush(&mut self) {
        let Some(link) = self.link.as_ref() else {
            return;
        };
        if !self.link_open {
            return;
        }
        for outgoing in self.registry.outbox(self.generation, self.ready) {
            debug!(id = outgoing.id, command = %outgoing.command, "transmit");
            if let Some(timeout) = outgoing.arm_timeout {
                self.scheduler.arm(TimerKey::CallTimeout(outgoing.id), timeout);
            }
            link.send(outgoing.frame);
        }
    }

    fn on_frame(&mut self, text: &str) {
        self.server.touch(Instant::now());
        match codec::decode(text) {
            Ok(Inbound::Reply(reply)) => self.on_reply(reply),
            Ok(Inbound::Push(push)) => self.apply(dispatch::classify(push, None, false)),
            Err(e) => warn!(error = %e, "dropping undecodable frame"),
        }
    }

    fn on_reply(&mut self, reply: Reply) {
        match self.registry.resolve(&reply) {
            Matched::Call { command, waited } => {
                let outcome = if reply.message.get("error").is_some()
                    || reply.message.get("status").and_then(Value::as_str) == Some("error")
                {
                    "error"
                } else {
                    "success"
                };
                let id = reply.envelope.internal_id;
                debug!(id, command = %command, outcome, "call settled");
                if let Some(metrics) = &self.metrics {
                    metrics.record_call(&command, outcome, waited.as_secs_f64());
                }
            }
            Matched::Internal(purpose) => self.on_internal_reply(purpose, &reply),
            Matched::Subscription(kind) => {
                self.apply(dispatch::classify(reply.as_push(), Some(kind), false));
            }
            Matched::Unmatched => {
                let internal = reply.envelope.is_internal();
                self.apply(dispatch::classify(reply.as_push(), None, internal));
            }
        }
    }

    fn on_internal_reply(&mut self, purpose: InternalPurpose, reply: &Reply) {
        match purpose {
            InternalPurpose::LedgerStream => {
                let seeded = reply.message.get("result").and_then(LedgerClosed::from_value);
                if let Some(ledger) = seeded {
                    debug!(ledger_index = ledger.ledger_index, "ledger stream subscribed");
                    self.server.record_ledger_closed(&ledger);
                }
            }
            InternalPurpose::Handshake { generation } => {
                self.bus.emit(ClientEvent::Message(reply.restored_message()));
                self.record_server_info(reply);
                if generation == self.generation && self.link_open {
                    self.enter_ready();
                }
            }
            InternalPurpose::ServerInfoPoll => {
                self.bus.emit(ClientEvent::Message(reply.restored_message()));
                self.record_server_info(reply);
            }
        }
    }

    fn record_server_info(&mut self, reply: &Reply) {
        let latency = reply
            .envelope
            .external_id
            .as_ref()
            .and_then(probe_sent_at)
            .map(|sent_at| self.clock.now_ms().saturating_sub(sent_at) as f64);
        let Some(info) = ServerInfo::from_reply(&reply.message) else {
            debug!("server_info reply without info");
            return;
        };
        let fee = self.server.record_server_info(info, latency, Instant::now());
        trace!(?latency, ?fee, "server_info recorded");
        if let Some(metrics) = &self.metrics {
            metrics.record_server_info(latency, fee);
        }
    }

    fn enter_ready(&mut self) {
        if self.ready {
            return;
        }
        self.ready = true;
        self.ever_online = true;
        self.connection.mark_ready();
        self.strategy.reset();
        if let Some(metrics) = &self.metrics {
            metrics.record_state(LifecycleState::Ready);
        }

        let node = self.server.server_info();
        info!(
            endpoint = %self.connection.current(),
            version = node.map(|info| info.build_version.as_str()).unwrap_or_default(),
            ledgers = node.map(|info| info.complete_ledgers.as_str()).unwrap_or_default(),
            "ready"
        );

        self.flush();
        self.bus.emit(ClientEvent::Online);
        self.emit_state();
        self.arm_watchdog();
        self.check_ready_waiters();
    }

    fn arm_watchdog(&mut self) {
        self.scheduler
            .arm(TimerKey::Liveliness, self.options.assume_offline_after());
    }

    fn apply(&mut self, routes: Vec<Route>) {
        for route in routes {
            match route {
                Route::Emit(event) => {
                    let is_ledger = matches!(event, ClientEvent::Ledger(_));
                    self.bus.emit(event);
                    if is_ledger {
                        self.alive();
                    }
                }
                Route::RecordLedger(ledger) => {
                    debug!(
                        ledger_index = ledger.ledger_index,
                        txns = ledger.txn_count,
                        "ledger closed"
                    );
                    self.server.record_ledger_closed(&ledger);
                    if let Some(metrics) = &self.metrics {
                        metrics.record_ledger();
                    }
                    let poll = Request::server_info(self.clock.now_ms());
                    self.send_internal(InternalPurpose::ServerInfoPoll, &poll);
                }
                Route::ClusterInfo(info) => self.capture_cluster_info(info),
                Route::Unhandled(message) => debug!(message = %message, "unhandled message"),
            }
        }
    }

    /// A ledger arrived: push the watchdog back
    fn alive(&mut self) {
        if self.ever_online && self.link_open {
            self.arm_watchdog();
        }
        self.check_ready_waiters();
    }

    fn capture_cluster_info(&mut self, info: Value) {
        if self.cluster_info.is_some() {
            return;
        }
        info!("cluster info received");
        self.cluster_info = Some(info.clone());
        for waiter in self.cluster_waiters.drain(..) {
            let _ = waiter.send(info.clone());
        }
        self.bus.emit(ClientEvent::ClusterInfo(info));
    }

    fn on_link_closed(&mut self, code: Option<u16>, reason: &str) {
        let was_ready = self.ready;
        self.link = None;
        self.link_open = false;
        self.ready = false;
        self.registry.clear_internal();
        self.scheduler.cancel(TimerKey::ConnectTimeout);
        self.scheduler.cancel(TimerKey::Liveliness);

        warn!(endpoint = %self.connection.current(), ?code, reason, "link closed");
        self.bus.emit(ClientEvent::Close);
        if was_ready {
            self.bus.emit(ClientEvent::Offline);
        }
        self.emit_state();

        if self.closed || self.destroyed {
            return;
        }
        self.bus.emit(ClientEvent::Retry);
        self.schedule_reconnect();
    }

    /// Close the current link as if the node had dropped it
    fn force_close(&mut self, reason: &str) {
        if let Some(link) = self.link.as_ref() {
            link.close();
            self.on_link_closed(None, reason);
        }
    }

    // ---- timers ----

    fn fire_timers(&mut self) {
        for key in self.scheduler.take_expired(Instant::now()) {
            match key {
                TimerKey::Reconnect => self.connect(),
                TimerKey::ConnectTimeout => {
                    if !self.link_open {
                        warn!(endpoint = %self.connection.current(), "connect attempt timed out");
                        self.force_close("connect timeout");
                    }
                }
                TimerKey::Liveliness => {
                    if self.ever_online && self.link.is_some() {
                        warn!(
                            after_secs = self.options.assume_offline_after_seconds,
                            "no ledger received, assuming the link is dead"
                        );
                        self.force_close("liveliness timeout");
                    }
                }
                TimerKey::CallTimeout(id) => {
                    if let Some(command) = self.registry.expire(id) {
                        warn!(id, command = %command, "call timed out");
                        if let Some(metrics) = &self.metrics {
                            metrics.record_timeout(&command);
                        }
                    }
                }
            }
        }
    }

    // ---- shutdown ----

    fn close(&mut self) {
        if self.closed || self.destroyed {
            return;
        }
        info!(endpoint = %self.connection.current(), "closing");
        self.closed = true;
        self.set_state(LifecycleState::Closing);

        let had_link = self.link.is_some();
        self.discard_link();
        self.scheduler.clear();
        self.registry.reject_outstanding(&Error::Closed);
        self.reject_ready_waiters(&Error::Closed);

        if had_link {
            self.bus.emit(ClientEvent::Close);
        }
        self.set_state(LifecycleState::Closed);
        self.emit_state();
    }

    fn reinstate(&mut self, force_next_uplink: bool) -> Result<()> {
        if self.destroyed {
            return Err(Error::Destroyed);
        }
        self.closed = false;
        self.connection.reset_attempts();
        self.strategy.reset();

        if force_next_uplink && self.connection.endpoints().len() > 1 {
            let (endpoint, wrapped) = self.connection.force_next();
            if wrapped {
                self.bus.emit(ClientEvent::Round);
            }
            self.announce_switch(endpoint);
        }

        info!(endpoint = %self.connection.current(), "reinstating");
        self.connect();
        Ok(())
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        info!("destroying client");
        self.destroyed = true;
        self.closed = true;

        let had_link = self.link.is_some();
        self.discard_link();
        self.scheduler.clear();
        self.registry.reject_all(&Error::Destroyed);
        self.reject_ready_waiters(&Error::Destroyed);
        self.cluster_waiters.clear();

        if had_link {
            self.bus.emit(ClientEvent::Close);
        }
        self.set_state(LifecycleState::Destroyed);
        self.emit_state();
        self.bus.detach_all();
    }
}
