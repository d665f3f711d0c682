//! Client registry
//!
//! Bidirectional transport-connection to client-id mapping plus per-client
//! handshake progress. Client ids are minted here and stay stable for the
//! life of the connection; both index directions are maintained together so
//! they can never disagree.

use std::collections::HashMap;
use std::fmt;

use feedme_transport::ConnectionId;
use uuid::Uuid;

use crate::timers::Timer;

/// Engine-assigned opaque client identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(Uuid);

impl ClientId {
    fn new() -> Self {
        ClientId(Uuid::new_v4())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Handshake progress. Monotonic: Waiting -> Processing -> Complete.
/// Variant order carries the progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum HandshakeStatus {
    Waiting,
    Processing,
    Complete,
}

struct ClientRecord {
    conn: ConnectionId,
    status: HandshakeStatus,
    handshake_timer: Option<Timer>,
}

#[derive(Default)]
pub(crate) struct ClientRegistry {
    by_conn: HashMap<ConnectionId, ClientId>,
    by_client: HashMap<ClientId, ClientRecord>,
}

impl ClientRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a fresh connection, minting a client id.
    pub(crate) fn connect(&mut self, conn: ConnectionId) -> ClientId {
        let client = ClientId::new();
        self.by_conn.insert(conn, client);
        self.by_client.insert(
            client,
            ClientRecord {
                conn,
                status: HandshakeStatus::Waiting,
                handshake_timer: None,
            },
        );
        client
    }

    pub(crate) fn client_for_conn(&self, conn: ConnectionId) -> Option<ClientId> {
        self.by_conn.get(&conn).copied()
    }

    pub(crate) fn conn_for_client(&self, client: ClientId) -> Option<ConnectionId> {
        self.by_client.get(&client).map(|r| r.conn)
    }

    pub(crate) fn status(&self, client: ClientId) -> Option<HandshakeStatus> {
        self.by_client.get(&client).map(|r| r.status)
    }

    /// Advance a client's handshake status. Status only moves forward; a
    /// regression is ignored so the monotonicity lives here, not in caller
    /// discipline.
    pub(crate) fn advance_status(&mut self, client: ClientId, status: HandshakeStatus) {
        if let Some(record) = self.by_client.get_mut(&client) {
            if status > record.status {
                record.status = status;
            }
        }
    }

    /// Attach the handshake timeout timer; dropped (hence canceled) with
    /// the record or via [`clear_handshake_timer`].
    pub(crate) fn set_handshake_timer(&mut self, client: ClientId, timer: Timer) {
        if let Some(record) = self.by_client.get_mut(&client) {
            record.handshake_timer = Some(timer);
        }
        // A record that vanished in between takes the timer down with it.
    }

    pub(crate) fn clear_handshake_timer(&mut self, client: ClientId) {
        if let Some(record) = self.by_client.get_mut(&client) {
            if let Some(timer) = record.handshake_timer.take() {
                timer.cancel();
            }
        }
    }

    /// Remove all state for a connection. Returns the client id and its
    /// final handshake status; the handshake timer is dropped with the
    /// record.
    pub(crate) fn remove_conn(
        &mut self,
        conn: ConnectionId,
    ) -> Option<(ClientId, HandshakeStatus)> {
        let client = self.by_conn.remove(&conn)?;
        let record = self.by_client.remove(&client)?;
        Some((client, record.status))
    }

    pub(crate) fn len(&self) -> usize {
        self.by_client.len()
    }

    pub(crate) fn clear(&mut self) {
        self.by_conn.clear();
        self.by_client.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_indexes_both_directions() {
        let mut registry = ClientRegistry::new();
        let client = registry.connect(7);

        assert_eq!(registry.client_for_conn(7), Some(client));
        assert_eq!(registry.conn_for_client(client), Some(7));
        assert_eq!(registry.status(client), Some(HandshakeStatus::Waiting));
    }

    #[test]
    fn client_ids_are_unique() {
        let mut registry = ClientRegistry::new();
        let a = registry.connect(1);
        let b = registry.connect(2);
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn status_never_regresses() {
        let mut registry = ClientRegistry::new();
        let client = registry.connect(5);

        registry.advance_status(client, HandshakeStatus::Processing);
        assert_eq!(registry.status(client), Some(HandshakeStatus::Processing));

        registry.advance_status(client, HandshakeStatus::Waiting);
        assert_eq!(registry.status(client), Some(HandshakeStatus::Processing));

        registry.advance_status(client, HandshakeStatus::Complete);
        registry.advance_status(client, HandshakeStatus::Processing);
        assert_eq!(registry.status(client), Some(HandshakeStatus::Complete));
    }

    #[test]
    fn remove_conn_clears_both_directions() {
        let mut registry = ClientRegistry::new();
        let client = registry.connect(3);
        registry.advance_status(client, HandshakeStatus::Complete);

        let removed = registry.remove_conn(3);
        assert_eq!(removed, Some((client, HandshakeStatus::Complete)));
        assert_eq!(registry.client_for_conn(3), None);
        assert_eq!(registry.conn_for_client(client), None);
        assert_eq!(registry.remove_conn(3), None);
    }
}
