//! Server facade
//!
//! Thin handle over the engine: handler registration, lifecycle control and
//! the server-initiated operations (action revelations, feed terminations,
//! forced disconnects). Cheap to clone; all clones drive the same engine.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use feedme_core::{Delta, FeedArgs};
use feedme_transport::{Transport, TransportEvents, TransportState};

use crate::clients::ClientId;
use crate::config::ServerConfig;
use crate::engine::Engine;
use crate::error::Result;
use crate::events::{ServerEvent, ServerEvents};
use crate::responses::{
    ActionRequest, ActionResponder, FeedCloseRequest, FeedCloseResponder, FeedOpenRequest,
    FeedOpenResponder, HandshakeRequest, HandshakeResponder,
};

/// Integrity accompaniment for an action revelation.
#[derive(Debug, Clone)]
pub enum FeedIntegrity {
    /// No integrity field on the wire
    None,
    /// Caller supplies a precomputed hash
    Md5(String),
    /// Caller supplies the post-delta feed data; the hash is computed here
    Data(Value),
}

/// Parameters for [`Server::action_revelation`].
#[derive(Debug, Clone)]
pub struct ActionRevelationParams {
    pub action_name: String,
    pub action_data: Value,
    pub feed_name: String,
    pub feed_args: FeedArgs,
    pub feed_deltas: Vec<Delta>,
    pub integrity: FeedIntegrity,
}

/// Which subscriptions a feed termination applies to.
#[derive(Debug, Clone)]
pub enum TerminationScope {
    /// One client's subscription to one feed
    ClientFeed {
        client: ClientId,
        feed_name: String,
        feed_args: FeedArgs,
    },
    /// Every feed one client has open
    Client(ClientId),
    /// Every client subscribed to one feed
    Feed {
        feed_name: String,
        feed_args: FeedArgs,
    },
}

/// Parameters for [`Server::feed_termination`].
#[derive(Debug, Clone)]
pub struct FeedTerminationParams {
    pub scope: TerminationScope,
    pub error_code: String,
    pub error_data: Value,
}

/// A Feedme server bound to one transport.
#[derive(Clone)]
pub struct Server {
    engine: Arc<Engine>,
}

impl Server {
    /// Create a server over a transport. The returned [`ServerEvents`]
    /// stream carries lifecycle and diagnostic events; request events go
    /// through the `on_*` handlers.
    pub fn new<E>(
        transport: Arc<dyn Transport>,
        transport_events: E,
        config: ServerConfig,
    ) -> (Server, ServerEvents)
    where
        E: TransportEvents + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<ServerEvent>();
        let engine = Engine::new(config, transport, tx);
        tokio::spawn(Arc::clone(&engine).run(transport_events));
        (Server { engine }, ServerEvents { rx })
    }

    /// Start the underlying transport.
    pub async fn start(&self) -> Result<()> {
        self.engine.transport.start().await?;
        Ok(())
    }

    /// Stop the underlying transport. Outstanding response objects are
    /// neutralized and all protocol state dropped; connected clients are
    /// closed by the transport without per-client disconnect events.
    pub async fn stop(&self) -> Result<()> {
        self.engine.transport.stop().await?;
        Ok(())
    }

    pub fn state(&self) -> TransportState {
        self.engine.transport.state()
    }

    // ========================================================================
    // Handler registration
    // ========================================================================

    /// Register the handshake handler. With a handler, handshakes sit in a
    /// processing state until the handler answers; without one, compatible
    /// handshakes succeed immediately.
    pub fn on_handshake<F>(&self, handler: F)
    where
        F: Fn(HandshakeRequest, HandshakeResponder) + Send + Sync + 'static,
    {
        self.engine.handlers.set_handshake(Arc::new(handler));
    }

    /// Register the action handler. Without one, every action fails with
    /// `INTERNAL_ERROR`.
    pub fn on_action<F>(&self, handler: F)
    where
        F: Fn(ActionRequest, ActionResponder) + Send + Sync + 'static,
    {
        self.engine.handlers.set_action(Arc::new(handler));
    }

    /// Register the feed-open handler. Without one, every feed open fails
    /// with `INTERNAL_ERROR` and no subscription state is created.
    pub fn on_feed_open<F>(&self, handler: F)
    where
        F: Fn(FeedOpenRequest, FeedOpenResponder) + Send + Sync + 'static,
    {
        self.engine.handlers.set_feed_open(Arc::new(handler));
    }

    /// Register the feed-close handler. Without one, feed closes succeed
    /// immediately.
    pub fn on_feed_close<F>(&self, handler: F)
    where
        F: Fn(FeedCloseRequest, FeedCloseResponder) + Send + Sync + 'static,
    {
        self.engine.handlers.set_feed_close(Arc::new(handler));
    }

    // ========================================================================
    // Server-initiated operations
    // ========================================================================

    /// Broadcast an action's effect on a feed to every client with that
    /// feed open.
    pub fn action_revelation(&self, params: ActionRevelationParams) -> Result<()> {
        self.engine.action_revelation(params)
    }

    /// Forcibly close feed subscriptions. Subscriptions still opening fail
    /// their open; open subscriptions receive a FeedTermination and linger
    /// briefly so a crossing FeedClose still succeeds.
    pub fn feed_termination(&self, params: FeedTerminationParams) -> Result<()> {
        self.engine.feed_termination(params)
    }

    /// Forcibly disconnect a handshaken client.
    pub fn disconnect(&self, client: ClientId) -> Result<()> {
        self.engine.disconnect_client(client)
    }

    /// Number of connected clients, handshaken or not.
    pub fn client_count(&self) -> usize {
        self.engine.client_count()
    }

    /// Number of (client, feed) subscription entries in any state.
    pub fn feed_count(&self) -> usize {
        self.engine.feed_count()
    }
}
