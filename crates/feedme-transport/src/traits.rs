//! Transport trait definitions

use async_trait::async_trait;

use crate::error::Result;

/// Transport-assigned connection identifier.
pub type ConnectionId = u64;

/// Transport lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Starting,
    Started,
    Stopping,
}

/// Events emitted by a transport.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Transport is starting up
    Starting,
    /// Transport is accepting connections
    Started,
    /// Transport began shutting down (with an error, if abnormal)
    Stopping(Option<String>),
    /// Transport finished shutting down
    Stopped(Option<String>),
    /// A client connected
    Connect(ConnectionId),
    /// A text frame arrived from a client
    Message(ConnectionId, String),
    /// A client connection closed (reason present if abnormal)
    Disconnect(ConnectionId, Option<String>),
    /// Transport-internal error that did not kill the transport
    Error(String),
}

/// Server-side transport handle.
///
/// `send` and `disconnect` are synchronous enqueue operations so the engine
/// can reply from non-async contexts; delivery happens on the transport's
/// own tasks.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Begin accepting connections.
    async fn start(&self) -> Result<()>;

    /// Stop accepting connections and close all existing ones.
    async fn stop(&self) -> Result<()>;

    /// Current lifecycle state.
    fn state(&self) -> TransportState;

    /// Send a text frame to one connection.
    fn send(&self, conn: ConnectionId, text: String) -> Result<()>;

    /// Forcibly close one connection. The transport must emit a
    /// `Disconnect` event carrying the given reason.
    fn disconnect(&self, conn: ConnectionId, reason: Option<String>);
}

/// Receiving side of a transport's event stream.
#[async_trait]
pub trait TransportEvents: Send {
    /// Receive the next event; `None` when the transport is gone.
    async fn recv(&mut self) -> Option<TransportEvent>;
}
