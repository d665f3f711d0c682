//! Application-facing server events
//!
//! Lifecycle and diagnostic events arrive on a single tagged stream; the
//! four request events (handshake, action, feed open, feed close) go
//! through registered handlers instead because the engine's behavior
//! depends on whether a handler is registered.

use feedme_core::Diagnostics;
use tokio::sync::mpsc;

use crate::clients::ClientId;

/// Events emitted by the server.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// Transport is starting up
    Starting,
    /// Transport is accepting connections
    Started,
    /// Transport began shutting down; engine state has been reset
    Stopping(Option<String>),
    /// Transport finished shutting down
    Stopped(Option<String>),
    /// A handshaken client went away (never emitted for clients that
    /// disconnected before completing a compatible handshake)
    Disconnect {
        client: ClientId,
        error: Option<String>,
    },
    /// A client sent malformed or causally-unexpected traffic; it was
    /// answered with a ViolationResponse and stays connected
    BadClientMessage {
        client: ClientId,
        diagnostics: Diagnostics,
    },
    /// Transport-internal error that did not kill the transport
    TransportError(String),
}

/// Receiving side of the server event stream.
pub struct ServerEvents {
    pub(crate) rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl ServerEvents {
    /// Receive the next event; `None` once the server is gone.
    pub async fn recv(&mut self) -> Option<ServerEvent> {
        self.rx.recv().await
    }
}
