use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::clock::Clock;
use crate::domain::lobby::LobbyRecord;
use crate::ids::{LobbyId, PlayerId};

#[derive(Default)]
struct Inner {
    by_id: HashMap<LobbyId, LobbyRecord>,
    by_player: HashMap<PlayerId, LobbyId>,
}

pub struct LobbyStore {
    inner: RwLock<Inner>,
    clock: Arc<dyn Clock>,
    ttl_ms: Option<u64>,
}

impl LobbyStore {
    pub fn new(clock: Arc<dyn Clock>, ttl_ms: Option<u64>) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            clock,
            ttl_ms,
        }
    }

    /// Inserts or replaces a lobby record, refreshing `updated_at_ms` and atomically reindexing
    /// player->lobby lookups (stale entries for this lobby are dropped before new ones land).
    pub fn upsert(&self, mut record: LobbyRecord) -> LobbyRecord {
        record.updated_at_ms = self.clock.now_ms();
        let mut inner = self.inner.write();
        inner
            .by_player
            .retain(|_, lobby_id| *lobby_id != record.lobby_id);
        for seat in &record.seats {
            if let Some(player_id) = &seat.player_id {
                inner
                    .by_player
                    .insert(player_id.clone(), record.lobby_id.clone());
            }
        }
        inner.by_id.insert(record.lobby_id.clone(), record.clone());
        record
    }

    pub fn get_by_id(&self, lobby_id: &LobbyId) -> Option<LobbyRecord> {
        self.inner.read().by_id.get(lobby_id).cloned()
    }

    pub fn get_by_player(&self, player_id: &PlayerId) -> Option<LobbyRecord> {
        let inner = self.inner.read();
        let lobby_id = inner.by_player.get(player_id)?;
        inner.by_id.get(lobby_id).cloned()
    }

    pub fn delete_by_id(&self, lobby_id: &LobbyId) -> Option<LobbyRecord> {
        let mut inner = self.inner.write();
        let removed = inner.by_id.remove(lobby_id);
        inner.by_player.retain(|_, id| id != lobby_id);
        removed
    }

    pub fn list_records(&self) -> Vec<LobbyRecord> {
        self.inner.read().by_id.values().cloned().collect()
    }

    /// Rebuilds the table wholesale from a snapshot restore.
    pub fn replace_all(&self, records: Vec<LobbyRecord>) {
        let mut inner = self.inner.write();
        inner.by_id.clear();
        inner.by_player.clear();
        for record in records {
            for seat in &record.seats {
                if let Some(player_id) = &seat.player_id {
                    inner
                        .by_player
                        .insert(player_id.clone(), record.lobby_id.clone());
                }
            }
            inner.by_id.insert(record.lobby_id.clone(), record);
        }
    }

    pub fn is_expired(&self, record: &LobbyRecord, now_ms: u64) -> bool {
        match self.ttl_ms {
            Some(ttl) => now_ms.saturating_sub(record.updated_at_ms) >= ttl,
            None => false,
        }
    }

    pub fn prune_expired(&self) -> Vec<LobbyId> {
        let now_ms = self.clock.now_ms();
        let expired: Vec<LobbyId> = self
            .list_records()
            .into_iter()
            .filter(|record| self.is_expired(record, now_ms))
            .map(|record| record.lobby_id)
            .collect();
        for lobby_id in &expired {
            self.delete_by_id(lobby_id);
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ManualClock;

    fn store(ttl_ms: Option<u64>) -> LobbyStore {
        LobbyStore::new(Arc::new(ManualClock::new(0)), ttl_ms)
    }

    #[test]
    fn read_returns_a_clone_not_shared_state() {
        let store = store(None);
        let record = LobbyRecord::new(
            LobbyId::generate(),
            PlayerId::generate(),
            Some("Host".into()),
            0,
        );
        let lobby_id = record.lobby_id.clone();
        store.upsert(record);

        let mut fetched = store.get_by_id(&lobby_id).unwrap();
        fetched.phase = crate::domain::lobby::LobbyPhase::Completed;

        let still_waiting = store.get_by_id(&lobby_id).unwrap();
        assert_eq!(still_waiting.phase, crate::domain::lobby::LobbyPhase::Waiting);
    }

    #[test]
    fn secondary_index_finds_lobby_by_seated_player() {
        let store = store(None);
        let host = PlayerId::generate();
        let record = LobbyRecord::new(LobbyId::generate(), host.clone(), None, 0);
        store.upsert(record.clone());

        assert_eq!(
            store.get_by_player(&host).map(|r| r.lobby_id),
            Some(record.lobby_id)
        );
    }

    #[test]
    fn ttl_expiry_is_driven_by_the_injected_clock() {
        let clock = Arc::new(ManualClock::new(0));
        let store = LobbyStore::new(clock.clone(), Some(1_000));
        let record = LobbyRecord::new(LobbyId::generate(), PlayerId::generate(), None, 0);
        store.upsert(record);

        clock.set(999);
        assert!(store.prune_expired().is_empty());

        clock.set(1_000);
        assert_eq!(store.prune_expired().len(), 1);
    }
}
