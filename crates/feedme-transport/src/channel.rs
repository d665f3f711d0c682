//! In-process channel transport
//!
//! Carries framed text over tokio mpsc channels inside one process. Used by
//! the test suites and for embedding a Feedme server next to an in-process
//! client without a network stack.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{ConnectionId, Transport, TransportEvent, TransportEvents, TransportState};

struct Registry {
    state: TransportState,
    next_conn: ConnectionId,
    conns: HashMap<ConnectionId, mpsc::UnboundedSender<String>>,
}

struct Inner {
    registry: Mutex<Registry>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl Inner {
    fn emit(&self, event: TransportEvent) {
        // Receiver gone means the server loop is gone; nothing to notify.
        let _ = self.events.send(event);
    }
}

/// Server-side handle of the channel transport. Cloning shares the
/// underlying connection registry.
#[derive(Clone)]
pub struct ChannelTransport {
    inner: Arc<Inner>,
}

/// Event stream consumed by the server.
pub struct ChannelEvents {
    rx: mpsc::UnboundedReceiver<TransportEvent>,
}

impl ChannelTransport {
    pub fn new() -> (ChannelTransport, ChannelEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = ChannelTransport {
            inner: Arc::new(Inner {
                registry: Mutex::new(Registry {
                    state: TransportState::Stopped,
                    next_conn: 1,
                    conns: HashMap::new(),
                }),
                events: tx,
            }),
        };
        (transport, ChannelEvents { rx })
    }

    /// Open a client-side connection. Only valid while started.
    pub fn connect(&self) -> Result<ClientConn> {
        let mut registry = self.inner.registry.lock();
        if registry.state != TransportState::Started {
            return Err(TransportError::InvalidState(
                "transport is not started".into(),
            ));
        }
        let id = registry.next_conn;
        registry.next_conn += 1;
        let (tx, rx) = mpsc::unbounded_channel();
        registry.conns.insert(id, tx);
        drop(registry);

        debug!(conn = id, "channel transport connection opened");
        self.inner.emit(TransportEvent::Connect(id));
        Ok(ClientConn {
            id,
            inner: Arc::clone(&self.inner),
            rx,
        })
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn start(&self) -> Result<()> {
        let mut registry = self.inner.registry.lock();
        if registry.state != TransportState::Stopped {
            return Err(TransportError::InvalidState("already started".into()));
        }
        registry.state = TransportState::Starting;
        self.inner.emit(TransportEvent::Starting);
        registry.state = TransportState::Started;
        self.inner.emit(TransportEvent::Started);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let mut registry = self.inner.registry.lock();
        if registry.state != TransportState::Started {
            return Err(TransportError::InvalidState("not started".into()));
        }
        registry.state = TransportState::Stopping;
        self.inner.emit(TransportEvent::Stopping(None));
        // Dropping the senders closes every client-side receive stream.
        registry.conns.clear();
        registry.state = TransportState::Stopped;
        self.inner.emit(TransportEvent::Stopped(None));
        Ok(())
    }

    fn state(&self) -> TransportState {
        self.inner.registry.lock().state
    }

    fn send(&self, conn: ConnectionId, text: String) -> Result<()> {
        let registry = self.inner.registry.lock();
        let tx = registry
            .conns
            .get(&conn)
            .ok_or(TransportError::NotConnected(conn))?;
        tx.send(text).map_err(|_| TransportError::NotConnected(conn))
    }

    fn disconnect(&self, conn: ConnectionId, reason: Option<String>) {
        let removed = self.inner.registry.lock().conns.remove(&conn);
        if removed.is_some() {
            debug!(conn, ?reason, "channel transport connection closed");
            self.inner.emit(TransportEvent::Disconnect(conn, reason));
        }
    }
}

#[async_trait]
impl TransportEvents for ChannelEvents {
    async fn recv(&mut self) -> Option<TransportEvent> {
        self.rx.recv().await
    }
}

/// Client side of one channel connection.
pub struct ClientConn {
    id: ConnectionId,
    inner: Arc<Inner>,
    rx: mpsc::UnboundedReceiver<String>,
}

impl ClientConn {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Deliver a text frame to the server.
    pub fn send(&self, text: impl Into<String>) -> Result<()> {
        let registry = self.inner.registry.lock();
        if registry.state != TransportState::Started {
            return Err(TransportError::Closed);
        }
        if !registry.conns.contains_key(&self.id) {
            return Err(TransportError::NotConnected(self.id));
        }
        drop(registry);
        self.inner
            .emit(TransportEvent::Message(self.id, text.into()));
        Ok(())
    }

    /// Receive the next text frame from the server; `None` once closed.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Close this connection from the client side.
    pub fn close(&self, reason: Option<String>) {
        let removed = self.inner.registry.lock().conns.remove(&self.id);
        if removed.is_some() {
            self.inner
                .emit(TransportEvent::Disconnect(self.id, reason));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lifecycle_and_message_flow() {
        let (transport, mut events) = ChannelTransport::new();
        assert!(transport.connect().is_err());

        transport.start().await.unwrap();
        assert!(matches!(events.recv().await, Some(TransportEvent::Starting)));
        assert!(matches!(events.recv().await, Some(TransportEvent::Started)));
        assert_eq!(transport.state(), TransportState::Started);

        let mut conn = transport.connect().unwrap();
        let id = conn.id();
        assert!(matches!(
            events.recv().await,
            Some(TransportEvent::Connect(c)) if c == id
        ));

        conn.send("hello").unwrap();
        match events.recv().await {
            Some(TransportEvent::Message(c, text)) => {
                assert_eq!(c, id);
                assert_eq!(text, "hello");
            }
            other => panic!("unexpected event: {:?}", other),
        }

        transport.send(id, "reply".into()).unwrap();
        assert_eq!(conn.recv().await.as_deref(), Some("reply"));

        transport.disconnect(id, Some("HANDSHAKE_TIMEOUT".into()));
        match events.recv().await {
            Some(TransportEvent::Disconnect(c, reason)) => {
                assert_eq!(c, id);
                assert_eq!(reason.as_deref(), Some("HANDSHAKE_TIMEOUT"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(conn.recv().await.is_none());
        assert!(conn.send("late").is_err());
    }

    #[tokio::test]
    async fn double_start_is_an_error() {
        let (transport, _events) = ChannelTransport::new();
        transport.start().await.unwrap();
        assert!(transport.start().await.is_err());
    }

    #[tokio::test]
    async fn stop_closes_client_streams() {
        let (transport, _events) = ChannelTransport::new();
        transport.start().await.unwrap();
        let mut conn = transport.connect().unwrap();
        transport.stop().await.unwrap();
        assert_eq!(transport.state(), TransportState::Stopped);
        assert!(conn.recv().await.is_none());
        assert!(matches!(conn.send("late"), Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn send_after_disconnect_reports_not_connected() {
        let (transport, _events) = ChannelTransport::new();
        transport.start().await.unwrap();
        let conn = transport.connect().unwrap();
        let id = conn.id();
        transport.disconnect(id, None);
        assert!(matches!(
            conn.send("late"),
            Err(TransportError::NotConnected(c)) if c == id
        ));
    }
}
