use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::clock::Clock;
use crate::domain::game::GameRecord;
use crate::ids::{GameId, LobbyId};

#[derive(Default)]
struct Inner {
    by_id: HashMap<GameId, GameRecord>,
    by_lobby: HashMap<LobbyId, GameId>,
}

pub struct GameStore {
    inner: RwLock<Inner>,
    clock: Arc<dyn Clock>,
    ttl_ms: Option<u64>,
    retention_ms: u64,
}

impl GameStore {
    pub fn new(clock: Arc<dyn Clock>, ttl_ms: Option<u64>, retention_ms: u64) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            clock,
            ttl_ms,
            retention_ms,
        }
    }

    pub fn upsert(&self, mut record: GameRecord) -> GameRecord {
        record.updated_at_ms = self.clock.now_ms();
        let mut inner = self.inner.write();
        inner
            .by_lobby
            .retain(|_, game_id| *game_id != record.game_id);
        inner
            .by_lobby
            .insert(record.lobby_id.clone(), record.game_id.clone());
        inner.by_id.insert(record.game_id.clone(), record.clone());
        record
    }

    pub fn get_by_id(&self, game_id: &GameId) -> Option<GameRecord> {
        self.inner.read().by_id.get(game_id).cloned()
    }

    pub fn get_by_lobby(&self, lobby_id: &LobbyId) -> Option<GameRecord> {
        let inner = self.inner.read();
        let game_id = inner.by_lobby.get(lobby_id)?;
        inner.by_id.get(game_id).cloned()
    }

    pub fn delete_by_id(&self, game_id: &GameId) -> Option<GameRecord> {
        let mut inner = self.inner.write();
        let removed = inner.by_id.remove(game_id);
        inner.by_lobby.retain(|_, id| id != game_id);
        removed
    }

    pub fn list_records(&self) -> Vec<GameRecord> {
        self.inner.read().by_id.values().cloned().collect()
    }

    pub fn replace_all(&self, records: Vec<GameRecord>) {
        let mut inner = self.inner.write();
        inner.by_id.clear();
        inner.by_lobby.clear();
        for record in records {
            inner
                .by_lobby
                .insert(record.lobby_id.clone(), record.game_id.clone());
            inner.by_id.insert(record.game_id.clone(), record);
        }
    }

    /// True once either the hard TTL or the retention-since-activity window has elapsed.
    /// Reference-counting against live sessions is the sweeper's job, not the store's.
    pub fn is_expired(&self, record: &GameRecord, now_ms: u64) -> bool {
        let age = now_ms.saturating_sub(record.updated_at_ms);
        if let Some(ttl) = self.ttl_ms {
            if age >= ttl {
                return true;
            }
        }
        record.is_terminal() && age >= self.retention_ms
    }

    pub fn prune_expired(&self) -> Vec<GameId> {
        let now_ms = self.clock.now_ms();
        let expired: Vec<GameId> = self
            .list_records()
            .into_iter()
            .filter(|record| self.is_expired(record, now_ms))
            .map(|record| record.game_id)
            .collect();
        for game_id in &expired {
            self.delete_by_id(game_id);
        }
        expired
    }
}
