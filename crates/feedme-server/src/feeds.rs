//! Feed subscription state table
//!
//! Per-(client, feed) subscription state held in two indexes at once: by
//! client (for teardown when a client leaves) and by feed (for broadcast
//! and termination by feed). Every mutation goes through this one
//! abstraction and updates both directions together, so callers can never
//! observe them disagreeing. Absent means closed.

use std::collections::HashMap;

use feedme_core::FeedSerial;

use crate::clients::ClientId;
use crate::timers::Timer;

/// Subscription state of one (client, feed) pair. A pair with no entry is
/// closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FeedState {
    Opening,
    Open,
    Closing,
    Terminated,
}

#[derive(Default)]
pub(crate) struct FeedStateTable {
    by_client: HashMap<ClientId, HashMap<FeedSerial, FeedState>>,
    by_feed: HashMap<FeedSerial, HashMap<ClientId, FeedState>>,
    termination_timers: HashMap<(ClientId, FeedSerial), Timer>,
}

impl FeedStateTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self, client: ClientId, serial: &FeedSerial) -> Option<FeedState> {
        self.by_client
            .get(&client)
            .and_then(|feeds| feeds.get(serial))
            .copied()
    }

    /// Set the state of a pair in both indexes. Any termination timer for
    /// the pair is dropped unless the new state is Terminated.
    pub(crate) fn set(&mut self, client: ClientId, serial: FeedSerial, state: FeedState) {
        if state != FeedState::Terminated {
            self.termination_timers.remove(&(client, serial.clone()));
        }
        self.by_client
            .entry(client)
            .or_default()
            .insert(serial.clone(), state);
        self.by_feed.entry(serial).or_default().insert(client, state);
    }

    /// Attach a termination timer to a pair (which must be Terminated).
    pub(crate) fn set_termination_timer(
        &mut self,
        client: ClientId,
        serial: FeedSerial,
        timer: Timer,
    ) {
        self.termination_timers.insert((client, serial), timer);
    }

    /// Remove a pair from both indexes, dropping its termination timer.
    /// Returns false if the pair was already closed.
    pub(crate) fn remove(&mut self, client: ClientId, serial: &FeedSerial) -> bool {
        self.termination_timers.remove(&(client, serial.clone()));
        let mut removed = false;
        if let Some(feeds) = self.by_client.get_mut(&client) {
            removed = feeds.remove(serial).is_some();
            if feeds.is_empty() {
                self.by_client.remove(&client);
            }
        }
        if let Some(clients) = self.by_feed.get_mut(serial) {
            clients.remove(&client);
            if clients.is_empty() {
                self.by_feed.remove(serial);
            }
        }
        removed
    }

    /// Drop all state for a client (disconnect teardown). Returns the
    /// serials that were removed.
    pub(crate) fn remove_client(&mut self, client: ClientId) -> Vec<FeedSerial> {
        let serials: Vec<FeedSerial> = match self.by_client.remove(&client) {
            Some(feeds) => feeds.into_keys().collect(),
            None => return Vec::new(),
        };
        for serial in &serials {
            self.termination_timers.remove(&(client, serial.clone()));
            if let Some(clients) = self.by_feed.get_mut(serial) {
                clients.remove(&client);
                if clients.is_empty() {
                    self.by_feed.remove(serial);
                }
            }
        }
        serials
    }

    /// All clients whose state for this feed equals `state`.
    pub(crate) fn clients_with_state(
        &self,
        serial: &FeedSerial,
        state: FeedState,
    ) -> Vec<ClientId> {
        self.by_feed
            .get(serial)
            .map(|clients| {
                clients
                    .iter()
                    .filter(|(_, s)| **s == state)
                    .map(|(c, _)| *c)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All (serial, state) entries for one client.
    pub(crate) fn entries_for_client(&self, client: ClientId) -> Vec<(FeedSerial, FeedState)> {
        self.by_client
            .get(&client)
            .map(|feeds| feeds.iter().map(|(s, st)| (s.clone(), *st)).collect())
            .unwrap_or_default()
    }

    /// All (client, state) entries for one feed.
    pub(crate) fn entries_for_feed(&self, serial: &FeedSerial) -> Vec<(ClientId, FeedState)> {
        self.by_feed
            .get(serial)
            .map(|clients| clients.iter().map(|(c, st)| (*c, *st)).collect())
            .unwrap_or_default()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_client.values().map(|feeds| feeds.len()).sum()
    }

    pub(crate) fn clear(&mut self) {
        self.by_client.clear();
        self.by_feed.clear();
        self.termination_timers.clear();
    }

    /// Both index directions agree exactly. Used by tests.
    #[cfg(test)]
    pub(crate) fn is_consistent(&self) -> bool {
        let forward: usize = self.by_client.values().map(|f| f.len()).sum();
        let backward: usize = self.by_feed.values().map(|c| c.len()).sum();
        if forward != backward {
            return false;
        }
        self.by_client.iter().all(|(client, feeds)| {
            feeds.iter().all(|(serial, state)| {
                self.by_feed
                    .get(serial)
                    .and_then(|clients| clients.get(client))
                    == Some(state)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedme_core::{FeedArgs, FeedIdentity};

    fn serial(name: &str) -> FeedSerial {
        FeedIdentity::new(name, FeedArgs::new()).serial()
    }

    fn client() -> ClientId {
        let mut registry = crate::clients::ClientRegistry::new();
        registry.connect(0)
    }

    #[test]
    fn absent_means_closed() {
        let table = FeedStateTable::new();
        assert_eq!(table.get(client(), &serial("f")), None);
    }

    #[test]
    fn set_get_remove_keep_indexes_agreeing() {
        let mut table = FeedStateTable::new();
        let c1 = client();
        let c2 = client();
        let f = serial("f");
        let g = serial("g");

        table.set(c1, f.clone(), FeedState::Opening);
        table.set(c1, g.clone(), FeedState::Open);
        table.set(c2, f.clone(), FeedState::Open);
        assert!(table.is_consistent());
        assert_eq!(table.len(), 3);

        assert_eq!(table.get(c1, &f), Some(FeedState::Opening));
        table.set(c1, f.clone(), FeedState::Open);
        assert_eq!(table.get(c1, &f), Some(FeedState::Open));
        assert!(table.is_consistent());

        assert!(table.remove(c1, &f));
        assert!(!table.remove(c1, &f));
        assert_eq!(table.get(c1, &f), None);
        assert_eq!(table.get(c2, &f), Some(FeedState::Open));
        assert!(table.is_consistent());
    }

    #[test]
    fn remove_client_is_bulk_teardown() {
        let mut table = FeedStateTable::new();
        let c1 = client();
        let c2 = client();
        let f = serial("f");
        let g = serial("g");

        table.set(c1, f.clone(), FeedState::Open);
        table.set(c1, g.clone(), FeedState::Terminated);
        table.set(c2, f.clone(), FeedState::Open);

        let mut removed = table.remove_client(c1);
        removed.sort();
        let mut expected = vec![f.clone(), g.clone()];
        expected.sort();
        assert_eq!(removed, expected);

        assert_eq!(table.get(c1, &f), None);
        assert_eq!(table.get(c1, &g), None);
        assert_eq!(table.clients_with_state(&f, FeedState::Open), vec![c2]);
        assert!(table.is_consistent());

        assert!(table.remove_client(c1).is_empty());
    }

    #[test]
    fn clients_with_state_filters() {
        let mut table = FeedStateTable::new();
        let c1 = client();
        let c2 = client();
        let c3 = client();
        let f = serial("f");

        table.set(c1, f.clone(), FeedState::Open);
        table.set(c2, f.clone(), FeedState::Opening);
        table.set(c3, f.clone(), FeedState::Open);

        let mut open = table.clients_with_state(&f, FeedState::Open);
        open.sort();
        let mut expected = vec![c1, c3];
        expected.sort();
        assert_eq!(open, expected);
        assert_eq!(table.clients_with_state(&f, FeedState::Closing), vec![]);
    }

    #[test]
    fn clear_empties_everything() {
        let mut table = FeedStateTable::new();
        let c = client();
        table.set(c, serial("f"), FeedState::Open);
        table.clear();
        assert_eq!(table.len(), 0);
        assert!(table.is_consistent());
    }
}
