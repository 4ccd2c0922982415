//! Lifecycle Sweeper: periodic forfeit resolution, retention pruning, and checkpoint coalescing.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{interval, Duration};

use crate::broker::{RealtimeBroker, RoomId};
use crate::clock::Clock;
use crate::domain::game::GamePhase;
use crate::protocol::adapter::ProtocolAdapter;
use crate::protocol::wire::OutboundEvent;
use crate::rules;
use crate::snapshot::{Snapshot, SnapshotRepository};
use crate::stores::{GameStore, LobbyStore, SessionStore};

const LOG_TARGET: &str = "sweeper";

pub struct Sweeper {
    lobby_store: Arc<LobbyStore>,
    game_store: Arc<GameStore>,
    session_store: Arc<SessionStore>,
    broker: Arc<RealtimeBroker>,
    clock: Arc<dyn Clock>,
    snapshot_repository: Option<Arc<SnapshotRepository>>,
    checkpoint_pending: AtomicBool,
}

impl Sweeper {
    pub fn new(
        lobby_store: Arc<LobbyStore>,
        game_store: Arc<GameStore>,
        session_store: Arc<SessionStore>,
        broker: Arc<RealtimeBroker>,
        clock: Arc<dyn Clock>,
        snapshot_repository: Option<Arc<SnapshotRepository>>,
    ) -> Self {
        Self {
            lobby_store,
            game_store,
            session_store,
            broker,
            clock,
            snapshot_repository,
            checkpoint_pending: AtomicBool::new(false),
        }
    }

    /// Runs sweeps at `interval_ms` until `shutdown` fires, flushing a final checkpoint first.
    pub async fn run(self: Arc<Self>, interval_ms: u64, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(Duration::from_millis(interval_ms));
        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                _ = shutdown.changed() => {
                    tracing::info!(target = LOG_TARGET, "sweeper shutting down, flushing final checkpoint");
                    self.checkpoint_pending.store(true, AtomicOrdering::SeqCst);
                    self.flush_checkpoint().await;
                    break;
                }
            }
        }
    }

    /// One sweep: resolve forfeits, prune expired sessions/games/lobbies, checkpoint if dirty.
    pub async fn tick(&self) {
        let mut dirty = self.resolve_forfeits();
        dirty |= self.prune_sessions();
        dirty |= self.prune_games_and_lobbies();
        if dirty {
            self.checkpoint_pending.store(true, AtomicOrdering::SeqCst);
        }
        self.flush_checkpoint().await;
    }

    fn resolve_forfeits(&self) -> bool {
        let now_ms = self.clock.now_ms();
        let mut dirty = false;

        for session in self.session_store.list_records() {
            if session.connected {
                continue;
            }
            let Some(reconnect_by) = session.reconnect_by_ms else {
                continue;
            };
            if now_ms <= reconnect_by {
                continue;
            }
            let Some(game_id) = session.game_id.clone() else {
                continue;
            };
            let Some(game) = self.game_store.get_by_id(&game_id) else {
                continue;
            };
            if game.is_terminal() {
                continue;
            }
            let Some(lobby) = self.lobby_store.get_by_id(&game.lobby_id) else {
                continue;
            };
            let Some(seat) = lobby.seat_of_player(&session.player_id) else {
                continue;
            };

            let forfeiting_team = seat.team();
            let ended = rules::forfeit(&game, forfeiting_team);
            let persisted = self.game_store.upsert(ended);

            tracing::info!(
                target = LOG_TARGET,
                %game_id,
                session_id = %session.session_id,
                ?forfeiting_team,
                "resolved forfeit for stale disconnect"
            );

            let room = RoomId::game(&game_id);
            let mut events = vec![OutboundEvent::SystemNotice {
                message: format!("{:?} wins by forfeit", persisted.winner.unwrap()),
            }];
            events.push(ProtocolAdapter::to_game_state_event(&persisted));
            let _ = self.broker.publish("domain-transition", &room, events, now_ms);

            dirty = true;
        }

        dirty
    }

    fn prune_sessions(&self) -> bool {
        let removed = self.session_store.prune_expired();
        for session_id in &removed {
            self.broker.disconnect_session(session_id);
        }
        if !removed.is_empty() {
            tracing::info!(target = LOG_TARGET, count = removed.len(), "pruned expired sessions");
        }
        !removed.is_empty()
    }

    /// Prunes games/lobbies whose TTL/retention window elapsed and that no retained session
    /// still references — a session keeps its lobby and game alive regardless of the store's
    /// own TTL clock.
    fn prune_games_and_lobbies(&self) -> bool {
        let now_ms = self.clock.now_ms();
        let sessions = self.session_store.list_records();
        let referenced_lobbies: HashSet<_> = sessions.iter().map(|s| s.lobby_id.clone()).collect();
        let referenced_games: HashSet<_> = sessions.iter().filter_map(|s| s.game_id.clone()).collect();

        let mut dirty = false;

        for game in self.game_store.list_records() {
            if referenced_games.contains(&game.game_id) {
                continue;
            }
            if self.game_store.is_expired(&game, now_ms) {
                self.game_store.delete_by_id(&game.game_id);
                dirty = true;
            }
        }

        for lobby in self.lobby_store.list_records() {
            if referenced_lobbies.contains(&lobby.lobby_id) {
                continue;
            }
            if lobby
                .game_id
                .as_ref()
                .is_some_and(|game_id| self.game_store.get_by_id(game_id).is_some_and(|g| !g.is_terminal()))
            {
                continue;
            }
            if self.lobby_store.is_expired(&lobby, now_ms) {
                self.lobby_store.delete_by_id(&lobby.lobby_id);
                dirty = true;
            }
        }

        if dirty {
            tracing::info!(target = LOG_TARGET, "pruned expired games/lobbies");
        }
        dirty
    }

    async fn flush_checkpoint(&self) {
        let Some(repository) = &self.snapshot_repository else {
            return;
        };
        if !self.checkpoint_pending.swap(false, AtomicOrdering::SeqCst) {
            return;
        }

        let snapshot = Snapshot::new(
            self.clock.now_ms(),
            self.lobby_store.list_records(),
            self.game_store.list_records(),
            self.session_store.list_records(),
        );
        if let Err(err) = repository.save(&snapshot).await {
            tracing::error!(target = LOG_TARGET, %err, "checkpoint write failed, will retry next sweep");
            self.checkpoint_pending.store(true, AtomicOrdering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::game::GameRecord;
    use crate::domain::lobby::LobbyRecord;
    use crate::domain::seat::Seat;
    use crate::domain::session::SessionRecord;
    use crate::ids::{GameId, LobbyId, PlayerId, ReconnectToken, SessionId};
    use crate::test_support::ManualClock;

    fn sweeper_with_forfeit_fixture() -> (Sweeper, GameId, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        let clock_dyn: Arc<dyn Clock> = clock.clone();
        let lobby_store = Arc::new(LobbyStore::new(clock_dyn.clone(), None));
        let game_store = Arc::new(GameStore::new(clock_dyn.clone(), None, 300_000));
        let session_store = Arc::new(SessionStore::new(clock_dyn.clone(), None, 300_000));
        let broker = Arc::new(RealtimeBroker::new());

        let host = PlayerId::generate();
        let lobby_id = LobbyId::generate();
        let mut lobby = LobbyRecord::new(lobby_id.clone(), host.clone(), None, 0);
        lobby.seat_slot_mut(Seat::North).player_id = Some(host.clone());
        lobby_store.upsert(lobby);

        let game_id = GameId::generate();
        let mut game = GameRecord::new(game_id.clone(), lobby_id.clone(), Seat::North, 10, 0);
        game.phase = GamePhase::Play;
        game.scores.team_b = 8;
        game_store.upsert(game);

        let mut session = SessionRecord::new(
            SessionId::generate(),
            host,
            lobby_id,
            ReconnectToken::new("tok").unwrap(),
            0,
        );
        session.game_id = Some(game_id.clone());
        session.mark_disconnected(0, 1_000);
        session_store.upsert(session);

        let sweeper = Sweeper::new(lobby_store, game_store, session_store, broker, clock_dyn, None);
        (sweeper, game_id, clock)
    }

    #[tokio::test]
    async fn stale_disconnect_with_active_game_is_forfeited() {
        let (sweeper, game_id, clock) = sweeper_with_forfeit_fixture();
        clock.set(1_001);

        sweeper.tick().await;

        let game = sweeper.game_store.get_by_id(&game_id).unwrap();
        assert_eq!(game.phase, GamePhase::Completed);
        assert_eq!(game.winner, Some(crate::domain::seat::Team::TeamB));
        assert_eq!(game.scores.team_b, 10);
    }

    #[tokio::test]
    async fn before_deadline_no_forfeit_occurs() {
        let (sweeper, game_id, clock) = sweeper_with_forfeit_fixture();
        clock.set(999);

        sweeper.tick().await;

        let game = sweeper.game_store.get_by_id(&game_id).unwrap();
        assert_eq!(game.phase, GamePhase::Play);
    }
}
