//! Protocol engine
//!
//! Routes inbound transport traffic, enforces the per-client handshake and
//! per-(client, feed) state machines, emits application events and sends
//! wire replies. All mutable state lives behind one mutex and transport
//! events are consumed by a single loop task, so handlers never run
//! concurrently over engine state; application callbacks are invoked with
//! the lock released so they may answer synchronously.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use feedme_core::{
    validate, ActionMessage, ClientMessage, Error as CoreError, FeedCloseMessage, FeedIdentity,
    FeedOpenMessage, FeedSerial, HandshakeMessage, ServerMessage, FEEDME_VERSION,
};
use feedme_transport::{ConnectionId, Transport, TransportEvent, TransportEvents, TransportState};

use crate::clients::{ClientId, ClientRegistry, HandshakeStatus};
use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::events::ServerEvent;
use crate::feeds::{FeedState, FeedStateTable};
use crate::responses::{
    ActionRequest, ActionResponder, FeedCloseRequest, FeedCloseResponder, FeedOpenRequest,
    FeedOpenResponder, HandshakeRequest, HandshakeResponder, Neutralizer, ResponseGuard,
};
use crate::server::{ActionRevelationParams, FeedIntegrity, FeedTerminationParams, TerminationScope};
use crate::timers::Timer;

/// Disconnect reason handed to the transport when a connection fails to
/// handshake in time.
pub const HANDSHAKE_TIMEOUT_REASON: &str = "HANDSHAKE_TIMEOUT";

pub(crate) type HandshakeHandler = dyn Fn(HandshakeRequest, HandshakeResponder) + Send + Sync;
pub(crate) type ActionHandler = dyn Fn(ActionRequest, ActionResponder) + Send + Sync;
pub(crate) type FeedOpenHandler = dyn Fn(FeedOpenRequest, FeedOpenResponder) + Send + Sync;
pub(crate) type FeedCloseHandler = dyn Fn(FeedCloseRequest, FeedCloseResponder) + Send + Sync;

/// Registered application handlers. "Has a listener" is "the slot is
/// non-empty"; the engine replies on the application's behalf when a slot
/// is empty.
#[derive(Default)]
pub(crate) struct Handlers {
    handshake: RwLock<Option<Arc<HandshakeHandler>>>,
    action: RwLock<Option<Arc<ActionHandler>>>,
    feed_open: RwLock<Option<Arc<FeedOpenHandler>>>,
    feed_close: RwLock<Option<Arc<FeedCloseHandler>>>,
}

impl Handlers {
    pub(crate) fn set_handshake(&self, h: Arc<HandshakeHandler>) {
        *self.handshake.write() = Some(h);
    }
    pub(crate) fn set_action(&self, h: Arc<ActionHandler>) {
        *self.action.write() = Some(h);
    }
    pub(crate) fn set_feed_open(&self, h: Arc<FeedOpenHandler>) {
        *self.feed_open.write() = Some(h);
    }
    pub(crate) fn set_feed_close(&self, h: Arc<FeedCloseHandler>) {
        *self.feed_close.write() = Some(h);
    }

    fn handshake(&self) -> Option<Arc<HandshakeHandler>> {
        self.handshake.read().clone()
    }
    fn action(&self) -> Option<Arc<ActionHandler>> {
        self.action.read().clone()
    }
    fn feed_open(&self) -> Option<Arc<FeedOpenHandler>> {
        self.feed_open.read().clone()
    }
    fn feed_close(&self) -> Option<Arc<FeedCloseHandler>> {
        self.feed_close.read().clone()
    }
}

/// All mutable engine state, owned by one mutex.
#[derive(Default)]
struct EngineCore {
    clients: ClientRegistry,
    feeds: FeedStateTable,
    /// Per client: CallbackId -> outstanding action response
    pending_actions: HashMap<ClientId, HashMap<String, Neutralizer>>,
    handshake_responses: HashMap<ClientId, Neutralizer>,
    feed_open_responses: HashMap<(ClientId, FeedSerial), Neutralizer>,
    feed_close_responses: HashMap<(ClientId, FeedSerial), Neutralizer>,
}

pub(crate) struct Engine {
    pub(crate) config: ServerConfig,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) handlers: Handlers,
    events: mpsc::UnboundedSender<ServerEvent>,
    core: Mutex<EngineCore>,
}

impl Engine {
    pub(crate) fn new(
        config: ServerConfig,
        transport: Arc<dyn Transport>,
        events: mpsc::UnboundedSender<ServerEvent>,
    ) -> Arc<Engine> {
        Arc::new(Engine {
            config,
            transport,
            handlers: Handlers::default(),
            events,
            core: Mutex::new(EngineCore::default()),
        })
    }

    /// Consume transport events until the transport goes away.
    pub(crate) async fn run<E>(self: Arc<Self>, mut source: E)
    where
        E: TransportEvents,
    {
        while let Some(event) = source.recv().await {
            match event {
                TransportEvent::Starting => self.emit(ServerEvent::Starting),
                TransportEvent::Started => self.emit(ServerEvent::Started),
                TransportEvent::Stopping(err) => {
                    self.reset();
                    self.emit(ServerEvent::Stopping(err));
                }
                TransportEvent::Stopped(err) => {
                    self.reset();
                    self.emit(ServerEvent::Stopped(err));
                }
                TransportEvent::Connect(conn) => self.handle_connect(conn),
                TransportEvent::Message(conn, text) => self.handle_message(conn, &text),
                TransportEvent::Disconnect(conn, reason) => self.handle_disconnect(conn, reason),
                TransportEvent::Error(e) => {
                    warn!(error = %e, "transport error");
                    self.emit(ServerEvent::TransportError(e));
                }
            }
        }
    }

    fn emit(&self, event: ServerEvent) {
        // The application may have dropped its event stream; fine.
        let _ = self.events.send(event);
    }

    fn send(&self, conn: ConnectionId, message: &ServerMessage) {
        let text = match message.to_text() {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "failed to encode outbound message");
                return;
            }
        };
        if let Err(e) = self.transport.send(conn, text) {
            // Connection raced away; its disconnect event will clean up.
            debug!(conn, error = %e, "send failed");
        }
    }

    /// Answer malformed or causally-unexpected traffic. Never errors and
    /// never closes the connection.
    fn violation(
        &self,
        conn: ConnectionId,
        client: ClientId,
        problem: &str,
        message: impl Into<String>,
    ) {
        let message = message.into();
        warn!(%client, problem, %message, "client protocol violation");
        self.send(conn, &ServerMessage::violation(problem, message.clone()));
        self.emit(ServerEvent::BadClientMessage {
            client,
            diagnostics: feedme_core::Diagnostics {
                problem: problem.to_string(),
                message,
            },
        });
    }

    // ========================================================================
    // Transport event handlers
    // ========================================================================

    fn handle_connect(self: &Arc<Self>, conn: ConnectionId) {
        let timer = if self.config.handshake_ms > 0 {
            let weak = Arc::downgrade(self);
            Some(Timer::schedule(
                Duration::from_millis(self.config.handshake_ms),
                move || {
                    if let Some(engine) = weak.upgrade() {
                        debug!(conn, "handshake timeout fired");
                        engine
                            .transport
                            .disconnect(conn, Some(HANDSHAKE_TIMEOUT_REASON.to_string()));
                    }
                },
            ))
        } else {
            None
        };

        let mut core = self.core.lock();
        let client = core.clients.connect(conn);
        if let Some(timer) = timer {
            core.clients.set_handshake_timer(client, timer);
        }
        drop(core);
        debug!(%client, conn, "client connected");
    }

    fn handle_message(self: &Arc<Self>, conn: ConnectionId, text: &str) {
        let client = match self.core.lock().clients.client_for_conn(conn) {
            Some(client) => client,
            // Message raced past its own disconnect; nothing to answer.
            None => return,
        };
        match ClientMessage::parse(text) {
            Ok(ClientMessage::Handshake(msg)) => self.handle_handshake(conn, client, msg),
            Ok(ClientMessage::Action(msg)) => self.handle_action(conn, client, msg),
            Ok(ClientMessage::FeedOpen(msg)) => self.handle_feed_open(conn, client, msg),
            Ok(ClientMessage::FeedClose(msg)) => self.handle_feed_close(conn, client, msg),
            Err(CoreError::InvalidJson(detail)) => {
                self.violation(conn, client, "invalid-json", detail)
            }
            Err(e) => self.violation(conn, client, "schema-violation", e.to_string()),
        }
    }

    fn handle_handshake(self: &Arc<Self>, conn: ConnectionId, client: ClientId, msg: HandshakeMessage) {
        let mut core = self.core.lock();
        match core.clients.status(client) {
            Some(HandshakeStatus::Waiting) => {}
            Some(_) => {
                drop(core);
                self.violation(conn, client, "unexpected-handshake", "handshake already made");
                return;
            }
            None => return,
        }

        if !msg.versions.iter().any(|v| v == FEEDME_VERSION) {
            // Incompatible; the client may retry and the handshake timer
            // keeps running.
            drop(core);
            debug!(%client, versions = ?msg.versions, "no compatible handshake version");
            self.send(conn, &ServerMessage::handshake_failure());
            return;
        }

        core.clients.clear_handshake_timer(client);

        if let Some(handler) = self.handlers.handshake() {
            core.clients.advance_status(client, HandshakeStatus::Processing);
            let (guard, neutralizer) = ResponseGuard::new(Arc::clone(self));
            core.handshake_responses.insert(client, neutralizer);
            drop(core);
            handler(
                HandshakeRequest { client },
                HandshakeResponder { guard, client },
            );
        } else {
            core.clients.advance_status(client, HandshakeStatus::Complete);
            drop(core);
            info!(%client, "handshake complete");
            self.send(
                conn,
                &ServerMessage::handshake_success(FEEDME_VERSION, client.to_string()),
            );
        }
    }

    fn handle_action(self: &Arc<Self>, conn: ConnectionId, client: ClientId, msg: ActionMessage) {
        let mut core = self.core.lock();
        match core.clients.status(client) {
            Some(HandshakeStatus::Complete) => {}
            Some(_) => {
                drop(core);
                self.violation(conn, client, "handshake-required", "Action before handshake");
                return;
            }
            None => return,
        }

        let pending = core
            .pending_actions
            .get(&client)
            .map_or(false, |actions| actions.contains_key(&msg.callback_id));
        if pending {
            drop(core);
            self.violation(
                conn,
                client,
                "callback-id-in-use",
                format!("CallbackId {} already awaits a response", msg.callback_id),
            );
            return;
        }

        match self.handlers.action() {
            Some(handler) => {
                let (guard, neutralizer) = ResponseGuard::new(Arc::clone(self));
                core.pending_actions
                    .entry(client)
                    .or_default()
                    .insert(msg.callback_id.clone(), neutralizer);
                drop(core);
                handler(
                    ActionRequest {
                        client,
                        action_name: msg.action_name,
                        action_args: msg.action_args,
                    },
                    ActionResponder {
                        guard,
                        client,
                        callback_id: msg.callback_id,
                    },
                );
            }
            None => {
                drop(core);
                self.send(
                    conn,
                    &ServerMessage::action_failure(
                        msg.callback_id,
                        "INTERNAL_ERROR".to_string(),
                        json!({}),
                    ),
                );
            }
        }
    }

    fn handle_feed_open(self: &Arc<Self>, conn: ConnectionId, client: ClientId, msg: FeedOpenMessage) {
        let identity = FeedIdentity::new(msg.feed_name, msg.feed_args);
        let serial = identity.serial();

        let mut core = self.core.lock();
        match core.clients.status(client) {
            Some(HandshakeStatus::Complete) => {}
            Some(_) => {
                drop(core);
                self.violation(conn, client, "handshake-required", "FeedOpen before handshake");
                return;
            }
            None => return,
        }

        match core.feeds.get(client, &serial) {
            None | Some(FeedState::Terminated) => {}
            Some(state) => {
                drop(core);
                self.violation(
                    conn,
                    client,
                    "unexpected-feed-open",
                    format!("feed is {:?}", state),
                );
                return;
            }
        }

        match self.handlers.feed_open() {
            Some(handler) => {
                // Entering Opening drops any termination timer for the pair.
                core.feeds.set(client, serial.clone(), FeedState::Opening);
                let (guard, neutralizer) = ResponseGuard::new(Arc::clone(self));
                core.feed_open_responses.insert((client, serial), neutralizer);
                drop(core);
                handler(
                    FeedOpenRequest {
                        client,
                        feed_name: identity.name.clone(),
                        feed_args: identity.args.clone(),
                    },
                    FeedOpenResponder {
                        guard,
                        client,
                        identity,
                    },
                );
            }
            None => {
                drop(core);
                self.send(
                    conn,
                    &ServerMessage::feed_open_failure(
                        identity.name,
                        identity.args,
                        "INTERNAL_ERROR".to_string(),
                        json!({}),
                    ),
                );
            }
        }
    }

    fn handle_feed_close(self: &Arc<Self>, conn: ConnectionId, client: ClientId, msg: FeedCloseMessage) {
        let identity = FeedIdentity::new(msg.feed_name, msg.feed_args);
        let serial = identity.serial();

        let mut core = self.core.lock();
        match core.clients.status(client) {
            Some(HandshakeStatus::Complete) => {}
            Some(_) => {
                drop(core);
                self.violation(conn, client, "handshake-required", "FeedClose before handshake");
                return;
            }
            None => return,
        }

        match core.feeds.get(client, &serial) {
            Some(FeedState::Open) => {
                if let Some(handler) = self.handlers.feed_close() {
                    core.feeds.set(client, serial.clone(), FeedState::Closing);
                    let (guard, neutralizer) = ResponseGuard::new(Arc::clone(self));
                    core.feed_close_responses.insert((client, serial), neutralizer);
                    drop(core);
                    handler(
                        FeedCloseRequest {
                            client,
                            feed_name: identity.name.clone(),
                            feed_args: identity.args.clone(),
                        },
                        FeedCloseResponder {
                            guard,
                            client,
                            identity,
                        },
                    );
                } else {
                    core.feeds.remove(client, &serial);
                    drop(core);
                    self.send(
                        conn,
                        &ServerMessage::feed_close_response(identity.name, identity.args),
                    );
                }
            }
            Some(FeedState::Terminated) => {
                // A close crossing a termination succeeds quietly; the
                // application is not involved.
                core.feeds.remove(client, &serial);
                drop(core);
                self.send(
                    conn,
                    &ServerMessage::feed_close_response(identity.name, identity.args),
                );
            }
            state => {
                drop(core);
                let detail = match state {
                    Some(s) => format!("feed is {:?}", s),
                    None => "feed is closed".to_string(),
                };
                self.violation(conn, client, "unexpected-feed-close", detail);
            }
        }
    }

    fn handle_disconnect(&self, conn: ConnectionId, reason: Option<String>) {
        let mut core = self.core.lock();
        let (client, status) = match core.clients.remove_conn(conn) {
            Some(entry) => entry,
            None => return,
        };

        if let Some(neutralizer) = core.handshake_responses.remove(&client) {
            let _ = neutralizer.neutralize();
        }
        if let Some(actions) = core.pending_actions.remove(&client) {
            for (_, neutralizer) in actions {
                let _ = neutralizer.neutralize();
            }
        }
        neutralize_for_client(&mut core.feed_open_responses, client);
        neutralize_for_client(&mut core.feed_close_responses, client);
        core.feeds.remove_client(client);
        drop(core);

        info!(%client, conn, ?reason, "client disconnected");
        // A client that never got past Waiting was never announced to the
        // application, so its departure is not announced either.
        if status != HandshakeStatus::Waiting {
            self.emit(ServerEvent::Disconnect {
                client,
                error: reason,
            });
        }
    }

    /// Neutralize everything and drop all state. Runs when the transport
    /// stops; safe to run twice.
    fn reset(&self) {
        let mut core = self.core.lock();
        for (_, neutralizer) in core.handshake_responses.drain() {
            let _ = neutralizer.neutralize();
        }
        for (_, actions) in core.pending_actions.drain() {
            for (_, neutralizer) in actions {
                let _ = neutralizer.neutralize();
            }
        }
        for (_, neutralizer) in core.feed_open_responses.drain() {
            let _ = neutralizer.neutralize();
        }
        for (_, neutralizer) in core.feed_close_responses.drain() {
            let _ = neutralizer.neutralize();
        }
        core.clients.clear();
        core.feeds.clear();
    }

    // ========================================================================
    // Response forwarding hooks
    // ========================================================================

    pub(crate) fn handshake_success(&self, client: ClientId) {
        let mut core = self.core.lock();
        core.handshake_responses.remove(&client);
        let conn = match core.clients.conn_for_client(client) {
            Some(conn) => conn,
            None => return,
        };
        core.clients.advance_status(client, HandshakeStatus::Complete);
        drop(core);
        info!(%client, "handshake complete");
        self.send(
            conn,
            &ServerMessage::handshake_success(FEEDME_VERSION, client.to_string()),
        );
    }

    pub(crate) fn action_result(
        &self,
        client: ClientId,
        callback_id: String,
        result: std::result::Result<Value, (String, Value)>,
    ) {
        let mut core = self.core.lock();
        if let Some(actions) = core.pending_actions.get_mut(&client) {
            actions.remove(&callback_id);
            if actions.is_empty() {
                core.pending_actions.remove(&client);
            }
        }
        let conn = match core.clients.conn_for_client(client) {
            Some(conn) => conn,
            None => return,
        };
        drop(core);
        let message = match result {
            Ok(data) => ServerMessage::action_success(callback_id, data),
            Err((code, data)) => ServerMessage::action_failure(callback_id, code, data),
        };
        self.send(conn, &message);
    }

    pub(crate) fn feed_open_result(
        &self,
        client: ClientId,
        identity: FeedIdentity,
        result: std::result::Result<Value, (String, Value)>,
    ) {
        let serial = identity.serial();
        let mut core = self.core.lock();
        core.feed_open_responses.remove(&(client, serial.clone()));
        let conn = match core.clients.conn_for_client(client) {
            Some(conn) => conn,
            None => return,
        };
        let message = match result {
            Ok(data) => {
                if core.feeds.get(client, &serial) == Some(FeedState::Opening) {
                    core.feeds.set(client, serial, FeedState::Open);
                }
                ServerMessage::feed_open_success(identity.name, identity.args, data)
            }
            Err((code, data)) => {
                core.feeds.remove(client, &serial);
                ServerMessage::feed_open_failure(identity.name, identity.args, code, data)
            }
        };
        drop(core);
        self.send(conn, &message);
    }

    pub(crate) fn feed_close_success(&self, client: ClientId, identity: FeedIdentity) {
        let serial = identity.serial();
        let mut core = self.core.lock();
        core.feed_close_responses.remove(&(client, serial.clone()));
        core.feeds.remove(client, &serial);
        let conn = match core.clients.conn_for_client(client) {
            Some(conn) => conn,
            None => return,
        };
        drop(core);
        self.send(
            conn,
            &ServerMessage::feed_close_response(identity.name, identity.args),
        );
    }

    // ========================================================================
    // Facade operations
    // ========================================================================

    pub(crate) fn action_revelation(&self, params: ActionRevelationParams) -> Result<()> {
        validate::validate_action_name(&params.action_name)
            .map_err(|e| ServerError::InvalidArgument(e.to_string()))?;
        validate::ensure_object("action data", &params.action_data)
            .map_err(|e| ServerError::InvalidArgument(e.to_string()))?;
        validate::validate_feed_name(&params.feed_name)
            .map_err(|e| ServerError::InvalidArgument(e.to_string()))?;

        let feed_md5 = match params.integrity {
            FeedIntegrity::None => None,
            FeedIntegrity::Md5(hash) => {
                if hash.is_empty() {
                    return Err(ServerError::InvalidArgument(
                        "feed md5 must be non-empty".into(),
                    ));
                }
                Some(hash)
            }
            FeedIntegrity::Data(data) => {
                validate::ensure_object("feed data", &data)
                    .map_err(|e| ServerError::InvalidArgument(e.to_string()))?;
                Some(feedme_core::feed_data_hash(&data))
            }
        };

        if self.transport.state() != TransportState::Started {
            return Err(ServerError::InvalidState("server is not started".into()));
        }

        let identity = FeedIdentity::new(params.feed_name, params.feed_args);
        let serial = identity.serial();
        let message = ServerMessage::ActionRevelation(feedme_core::ActionRevelationMessage {
            action_name: params.action_name,
            action_data: params.action_data,
            feed_name: identity.name,
            feed_args: identity.args,
            feed_deltas: params.feed_deltas,
            feed_md5,
        });

        let core = self.core.lock();
        let conns: Vec<ConnectionId> = core
            .feeds
            .clients_with_state(&serial, FeedState::Open)
            .into_iter()
            .filter_map(|client| core.clients.conn_for_client(client))
            .collect();
        drop(core);

        debug!(feed = %serial, recipients = conns.len(), "action revelation");
        for conn in conns {
            self.send(conn, &message);
        }
        Ok(())
    }

    pub(crate) fn feed_termination(self: &Arc<Self>, params: FeedTerminationParams) -> Result<()> {
        if params.error_code.is_empty() {
            return Err(ServerError::InvalidArgument(
                "termination error code must be non-empty".into(),
            ));
        }
        if self.transport.state() != TransportState::Started {
            return Err(ServerError::InvalidState("server is not started".into()));
        }

        let mut core = self.core.lock();
        let targets: Vec<(ClientId, FeedSerial, FeedState)> = match &params.scope {
            TerminationScope::ClientFeed {
                client,
                feed_name,
                feed_args,
            } => {
                validate::validate_feed_name(feed_name)
                    .map_err(|e| ServerError::InvalidArgument(e.to_string()))?;
                let serial = FeedIdentity::new(feed_name.clone(), feed_args.clone()).serial();
                match core.feeds.get(*client, &serial) {
                    Some(state) => vec![(*client, serial, state)],
                    None => Vec::new(),
                }
            }
            TerminationScope::Client(client) => core
                .feeds
                .entries_for_client(*client)
                .into_iter()
                .map(|(serial, state)| (*client, serial, state))
                .collect(),
            TerminationScope::Feed {
                feed_name,
                feed_args,
            } => {
                validate::validate_feed_name(feed_name)
                    .map_err(|e| ServerError::InvalidArgument(e.to_string()))?;
                let serial = FeedIdentity::new(feed_name.clone(), feed_args.clone()).serial();
                core.feeds
                    .entries_for_feed(&serial)
                    .into_iter()
                    .map(|(client, state)| (client, serial.clone(), state))
                    .collect()
            }
        };

        let mut outbound: Vec<(ConnectionId, ServerMessage)> = Vec::new();
        for (client, serial, state) in targets {
            let identity = match serial.identity() {
                Ok(identity) => identity,
                Err(e) => {
                    warn!(feed = %serial, error = %e, "undecodable feed serial");
                    continue;
                }
            };
            let conn = core.clients.conn_for_client(client);
            match state {
                FeedState::Opening => {
                    // The application's eventual answer becomes a no-op; the
                    // failure reply is sent here instead.
                    if let Some(neutralizer) =
                        core.feed_open_responses.remove(&(client, serial.clone()))
                    {
                        let _ = neutralizer.neutralize();
                    }
                    core.feeds.remove(client, &serial);
                    if let Some(conn) = conn {
                        outbound.push((
                            conn,
                            ServerMessage::feed_open_failure(
                                identity.name,
                                identity.args,
                                params.error_code.clone(),
                                params.error_data.clone(),
                            ),
                        ));
                    }
                }
                FeedState::Open => {
                    core.feeds.set(client, serial.clone(), FeedState::Terminated);
                    if self.config.termination_ms > 0 {
                        let weak = Arc::downgrade(self);
                        let timer_client = client;
                        let timer_serial = serial.clone();
                        let timer = Timer::schedule(
                            Duration::from_millis(self.config.termination_ms),
                            move || {
                                if let Some(engine) = weak.upgrade() {
                                    let mut core = engine.core.lock();
                                    if core.feeds.get(timer_client, &timer_serial)
                                        == Some(FeedState::Terminated)
                                    {
                                        core.feeds.remove(timer_client, &timer_serial);
                                    }
                                }
                            },
                        );
                        core.feeds.set_termination_timer(client, serial.clone(), timer);
                    }
                    if let Some(conn) = conn {
                        outbound.push((
                            conn,
                            ServerMessage::FeedTermination(feedme_core::FeedTerminationMessage {
                                feed_name: identity.name,
                                feed_args: identity.args,
                                error_code: params.error_code.clone(),
                                error_data: params.error_data.clone(),
                            }),
                        ));
                    }
                }
                // Closing completes normally; Terminated needs nothing more.
                FeedState::Closing | FeedState::Terminated => {}
            }
        }
        drop(core);

        for (conn, message) in outbound {
            self.send(conn, &message);
        }
        Ok(())
    }

    pub(crate) fn disconnect_client(&self, client: ClientId) -> Result<()> {
        let core = self.core.lock();
        match core.clients.status(client) {
            Some(HandshakeStatus::Complete) => {}
            _ => {
                return Err(ServerError::InvalidState(
                    "client has not completed a handshake".into(),
                ));
            }
        }
        let conn = core
            .clients
            .conn_for_client(client)
            .ok_or_else(|| ServerError::InvalidState("client is not connected".into()))?;
        drop(core);
        self.transport.disconnect(conn, None);
        Ok(())
    }

    pub(crate) fn client_count(&self) -> usize {
        self.core.lock().clients.len()
    }

    pub(crate) fn feed_count(&self) -> usize {
        self.core.lock().feeds.len()
    }
}

fn neutralize_for_client(
    responses: &mut HashMap<(ClientId, FeedSerial), Neutralizer>,
    client: ClientId,
) {
    let keys: Vec<(ClientId, FeedSerial)> = responses
        .keys()
        .filter(|(c, _)| *c == client)
        .cloned()
        .collect();
    for key in keys {
        if let Some(neutralizer) = responses.remove(&key) {
            let _ = neutralizer.neutralize();
        }
    }
}
