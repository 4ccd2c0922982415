use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::clock::Clock;
use crate::domain::session::SessionRecord;
use crate::ids::{PlayerId, ReconnectToken, SessionId};

const LOG_TARGET: &str = "stores::session";

#[derive(Default)]
struct Inner {
    by_id: HashMap<SessionId, SessionRecord>,
    by_player: HashMap<PlayerId, SessionId>,
    by_token: HashMap<ReconnectToken, SessionId>,
}

pub struct SessionStore {
    inner: RwLock<Inner>,
    clock: Arc<dyn Clock>,
    ttl_ms: Option<u64>,
    retention_ms: u64,
}

impl SessionStore {
    pub fn new(clock: Arc<dyn Clock>, ttl_ms: Option<u64>, retention_ms: u64) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            clock,
            ttl_ms,
            retention_ms,
        }
    }

    /// Upserts a session, enforcing reconnect-token uniqueness (a newer upsert evicts whatever
    /// session previously owned the token) and logging connected-state transitions exactly once.
    pub fn upsert(&self, mut record: SessionRecord) -> SessionRecord {
        record.updated_at_ms = self.clock.now_ms();
        let mut inner = self.inner.write();

        let previous_connected = inner
            .by_id
            .get(&record.session_id)
            .map(|existing| existing.connected);

        if let Some(evicted_session) = inner.by_token.get(&record.reconnect_token).cloned() {
            if evicted_session != record.session_id {
                inner.by_id.remove(&evicted_session);
                inner.by_player.retain(|_, sid| *sid != evicted_session);
            }
        }

        inner
            .by_player
            .retain(|_, sid| *sid != record.session_id);
        inner
            .by_player
            .insert(record.player_id.clone(), record.session_id.clone());
        inner
            .by_token
            .insert(record.reconnect_token.clone(), record.session_id.clone());
        inner
            .by_id
            .insert(record.session_id.clone(), record.clone());
        drop(inner);

        if previous_connected != Some(record.connected) {
            tracing::info!(
                target = LOG_TARGET,
                session_id = %record.session_id,
                connected = record.connected,
                "session connected-state transition"
            );
        }

        record
    }

    pub fn get_by_id(&self, session_id: &SessionId) -> Option<SessionRecord> {
        self.inner.read().by_id.get(session_id).cloned()
    }

    pub fn get_by_player(&self, player_id: &PlayerId) -> Option<SessionRecord> {
        let inner = self.inner.read();
        let session_id = inner.by_player.get(player_id)?;
        inner.by_id.get(session_id).cloned()
    }

    pub fn get_by_reconnect_token(&self, token: &ReconnectToken) -> Option<SessionRecord> {
        let inner = self.inner.read();
        let session_id = inner.by_token.get(token)?;
        inner.by_id.get(session_id).cloned()
    }

    pub fn delete_by_id(&self, session_id: &SessionId) -> Option<SessionRecord> {
        let mut inner = self.inner.write();
        let removed = inner.by_id.remove(session_id);
        inner.by_player.retain(|_, id| id != session_id);
        inner.by_token.retain(|_, id| id != session_id);
        removed
    }

    pub fn list_records(&self) -> Vec<SessionRecord> {
        self.inner.read().by_id.values().cloned().collect()
    }

    pub fn replace_all(&self, records: Vec<SessionRecord>) {
        let mut inner = self.inner.write();
        inner.by_id.clear();
        inner.by_player.clear();
        inner.by_token.clear();
        for record in records {
            inner
                .by_player
                .insert(record.player_id.clone(), record.session_id.clone());
            inner
                .by_token
                .insert(record.reconnect_token.clone(), record.session_id.clone());
            inner.by_id.insert(record.session_id.clone(), record);
        }
    }

    /// A connected session only ever expires via its hard TTL (if configured). A disconnected
    /// session is retained for `retention_ms` since its last update regardless of the shorter
    /// reconnect-grace deadline used for forfeiture — losing a reconnect race forfeits the game
    /// but the session record itself (and the transcript it can still reconnect-window into)
    /// stays around for the full retention window.
    pub fn is_expired(&self, record: &SessionRecord, now_ms: u64) -> bool {
        if let Some(ttl) = self.ttl_ms {
            if record.connected && now_ms.saturating_sub(record.updated_at_ms) >= ttl {
                return true;
            }
        }
        if record.connected {
            return false;
        }
        now_ms.saturating_sub(record.updated_at_ms) >= self.retention_ms
    }

    pub fn prune_expired(&self) -> Vec<SessionId> {
        let now_ms = self.clock.now_ms();
        let expired: Vec<SessionId> = self
            .list_records()
            .into_iter()
            .filter(|record| self.is_expired(record, now_ms))
            .map(|record| record.session_id)
            .collect();
        for session_id in &expired {
            self.delete_by_id(session_id);
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::LobbyId;
    use crate::test_support::ManualClock;

    fn session(token: &str) -> SessionRecord {
        SessionRecord::new(
            SessionId::generate(),
            PlayerId::generate(),
            LobbyId::generate(),
            ReconnectToken::new(token).unwrap(),
            0,
        )
    }

    #[test]
    fn newer_upsert_evicts_older_token_owner() {
        let store = SessionStore::new(Arc::new(ManualClock::new(0)), None, 300_000);
        let first = session("shared-token");
        let first_id = first.session_id.clone();
        store.upsert(first);

        let mut second = session("other-token");
        second.reconnect_token = ReconnectToken::new("shared-token").unwrap();
        store.upsert(second);

        assert!(store.get_by_id(&first_id).is_none());
    }

    /// Losing the reconnect race (`reconnect_by_ms` elapsed) is the sweeper's forfeiture signal,
    /// not store-level expiry — the session record must survive past it and only disappear once
    /// the longer retention window since disconnect has elapsed.
    #[test]
    fn session_outlives_reconnect_deadline_until_retention_elapses() {
        let clock = Arc::new(ManualClock::new(0));
        let store = SessionStore::new(clock.clone(), None, 300_000);
        let mut record = session("tok");
        record.mark_disconnected(0, 1_000);
        store.upsert(record);

        clock.set(1_000);
        assert!(
            store.prune_expired().is_empty(),
            "reconnect deadline alone must not expire the session"
        );

        clock.set(299_999);
        assert!(store.prune_expired().is_empty());

        clock.set(300_000);
        assert_eq!(store.prune_expired().len(), 1);
    }

    #[test]
    fn connected_session_does_not_expire_from_retention() {
        let clock = Arc::new(ManualClock::new(0));
        let store = SessionStore::new(clock.clone(), None, 300_000);
        store.upsert(session("tok"));

        clock.set(10_000_000);
        assert!(store.prune_expired().is_empty());
    }
}
