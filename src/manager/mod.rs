//! Game Manager: one serialization lane per `gameId`.
//!
//! Each game gets a `DashMap`-indexed lane. Rather than spawning an OS/async task per game up
//! front, the lane is modeled as a per-game `tokio::sync::Mutex` acquired FIFO —
//! `tokio::sync::Mutex` already guarantees first-come-first-served wakeup order, which is the
//! only property "acquire the lane" needs. This avoids a long-lived task per active game while
//! keeping the same serialization and duplicate-suppression guarantees.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::Mutex;

use crate::clock::Clock;
use crate::domain::game::GameRecord;
use crate::domain::seat::Seat;
use crate::ids::GameId;
use crate::protocol::adapter::ProtocolAdapter;
use crate::protocol::command::GameCommand;
use crate::protocol::wire::OutboundEvent;
use crate::rules::{RejectCode, RulesReject};
use crate::stores::GameStore;

const LOG_TARGET: &str = "manager";
const REQUEST_ID_LRU_CAPACITY: usize = 512;

struct RequestIdLru {
    capacity: usize,
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl RequestIdLru {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
        }
    }

    /// Returns true if `request_id` was already seen (and therefore this submission is a
    /// duplicate); otherwise records it, evicting the oldest entry once over capacity.
    fn check_and_insert(&mut self, request_id: &str) -> bool {
        if self.seen.contains(request_id) {
            return true;
        }
        self.seen.insert(request_id.to_string());
        self.order.push_back(request_id.to_string());
        if self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        false
    }
}

struct Lane {
    mutex: Mutex<RequestIdLru>,
}

impl Lane {
    fn new() -> Self {
        Self {
            mutex: Mutex::new(RequestIdLru::new(REQUEST_ID_LRU_CAPACITY)),
        }
    }
}

pub struct SubmitResult {
    pub game: Option<GameRecord>,
    pub outbound: Vec<OutboundEvent>,
    /// Per-seat private hand views, keyed by the owning seat. Callers must route each entry only
    /// to that seat's own session — never broadcast these through the shared game room, since
    /// each carries a different player's hole cards.
    pub private_events: Vec<(Seat, OutboundEvent)>,
    pub persisted: bool,
}

pub struct GameManager {
    lanes: DashMap<GameId, Arc<Lane>>,
    game_store: Arc<GameStore>,
    clock: Arc<dyn Clock>,
}

impl GameManager {
    pub fn new(game_store: Arc<GameStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            lanes: DashMap::new(),
            game_store,
            clock,
        }
    }

    fn lane(&self, game_id: &GameId) -> Arc<Lane> {
        self.lanes
            .entry(game_id.clone())
            .or_insert_with(|| Arc::new(Lane::new()))
            .clone()
    }

    /// Applies one game command inside the per-game lane: checks request-id dedup, invokes the
    /// rules engine through the protocol adapter, persists on change, and returns the outbound
    /// events for the caller (dispatcher) to publish.
    pub async fn submit_event(
        &self,
        game_id: &GameId,
        request_id: &str,
        actor: Seat,
        command: GameCommand,
    ) -> SubmitResult {
        let lane = self.lane(game_id);
        let mut lru = lane.mutex.lock().await;

        let Some(state) = self.game_store.get_by_id(game_id) else {
            return SubmitResult {
                game: None,
                outbound: vec![OutboundEvent::ActionRejected {
                    code: RejectCode::InvalidState,
                    message: format!("game {game_id} not found"),
                }],
                private_events: Vec::new(),
                persisted: false,
            };
        };

        if lru.check_and_insert(request_id) {
            tracing::info!(
                target = LOG_TARGET,
                %game_id,
                request_id,
                "rejected duplicate requestId"
            );
            return SubmitResult {
                game: Some(state),
                outbound: vec![OutboundEvent::ActionRejected {
                    code: RejectCode::InvalidAction,
                    message: "Duplicate requestId".to_string(),
                }],
                private_events: Vec::new(),
                persisted: false,
            };
        }

        let mut rng = StdRng::from_entropy();
        let (mut next_state, mut outbound) =
            ProtocolAdapter::apply_to_game(&state, actor, &command, &mut rng);

        let changed = next_state.updated_at_ms != state.updated_at_ms
            || next_state.phase != state.phase
            || next_state.hand_number != state.hand_number;
        let persisted = changed || state_differs(&state, &next_state);

        // `score_hand` and the next hand's `deal_hand` are not client-issued wire commands (see
        // RawAction in protocol/adapter.rs) — the manager chains them automatically once a hand's
        // last trick completes, so a client only ever sees the settled result.
        if persisted {
            next_state = self.cascade(next_state, &mut rng);
            outbound = vec![ProtocolAdapter::to_game_state_event(&next_state)];
        }

        let persisted_state = if persisted {
            Some(self.game_store.upsert(next_state.clone()))
        } else {
            None
        };

        let private_events = Seat::ALL
            .into_iter()
            .map(|seat| {
                (
                    seat,
                    ProtocolAdapter::to_game_private_state_event(&next_state, seat),
                )
            })
            .collect();

        SubmitResult {
            game: persisted_state.or(Some(next_state)),
            outbound,
            private_events,
            persisted,
        }
    }

    /// Convenience wrapper for `score_hand`, which carries no actor/turn check in the rules
    /// engine and is invoked by the manager itself right after a hand's last trick completes.
    pub async fn submit_score_hand(&self, game_id: &GameId) -> SubmitResult {
        let lane = self.lane(game_id);
        let _guard = lane.mutex.lock().await;

        let Some(state) = self.game_store.get_by_id(game_id) else {
            return SubmitResult {
                game: None,
                outbound: vec![],
                private_events: Vec::new(),
                persisted: false,
            };
        };
        let mut rng = StdRng::from_entropy();
        match crate::rules::apply(&state, &crate::rules::Action::ScoreHand, &mut rng) {
            Ok(next_state) => {
                let persisted_state = self.game_store.upsert(next_state.clone());
                let outbound = vec![ProtocolAdapter::to_game_state_event(&persisted_state)];
                let private_events = Seat::ALL
                    .into_iter()
                    .map(|seat| {
                        (
                            seat,
                            ProtocolAdapter::to_game_private_state_event(&persisted_state, seat),
                        )
                    })
                    .collect();
                SubmitResult {
                    game: Some(persisted_state),
                    outbound,
                    private_events,
                    persisted: true,
                }
            }
            Err(RulesReject { code, message }) => SubmitResult {
                game: Some(state),
                outbound: vec![OutboundEvent::ActionRejected { code, message }],
                private_events: Vec::new(),
                persisted: false,
            },
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Runs `score_hand` (and, if the game continues, the next hand's `deal_hand`) until the
    /// state lands back on a phase a client action can legally target.
    fn cascade(&self, mut state: GameRecord, rng: &mut StdRng) -> GameRecord {
        loop {
            match state.phase {
                crate::domain::game::GamePhase::Score => {
                    state = crate::rules::apply(&state, &crate::rules::Action::ScoreHand, rng)
                        .expect("score_hand is always legal once phase=Score");
                }
                crate::domain::game::GamePhase::Deal if state.hand_number > 0 => {
                    state = crate::rules::apply(
                        &state,
                        &crate::rules::Action::DealHand { deck: None },
                        rng,
                    )
                    .expect("deal_hand is always legal once phase=Deal");
                }
                _ => break,
            }
        }
        state
    }
}

fn state_differs(a: &GameRecord, b: &GameRecord) -> bool {
    a.turn != b.turn
        || a.trump != b.trump
        || a.maker != b.maker
        || a.tricks_won.total() != b.tricks_won.total()
        || a.scores.team_a != b.scores.team_a
        || a.scores.team_b != b.scores.team_b
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::LobbyId;
    use crate::test_support::ManualClock;

    fn game_manager() -> (GameManager, GameId) {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));
        let store = Arc::new(GameStore::new(clock.clone(), None, 300_000));
        let game_id = GameId::generate();
        let record = GameRecord::new(game_id.clone(), LobbyId::generate(), Seat::North, 10, 0);
        store.upsert(record);
        (GameManager::new(store, clock), game_id)
    }

    #[tokio::test]
    async fn duplicate_request_id_is_rejected_without_mutating_state() {
        let (manager, game_id) = game_manager();
        let before = manager.game_store.get_by_id(&game_id).unwrap();

        let first = manager
            .submit_event(&game_id, "dup-1", Seat::East, GameCommand::Pass)
            .await;
        assert!(!matches!(
            first.outbound.first(),
            Some(OutboundEvent::ActionRejected { code: RejectCode::InvalidAction, .. })
        ));

        let second = manager
            .submit_event(&game_id, "dup-1", Seat::East, GameCommand::Pass)
            .await;
        assert!(matches!(
            second.outbound.first(),
            Some(OutboundEvent::ActionRejected { code: RejectCode::InvalidAction, message })
                if message == "Duplicate requestId"
        ));

        let after = manager.game_store.get_by_id(&game_id).unwrap();
        assert_eq!(before.phase, after.phase);
    }

    #[tokio::test]
    async fn missing_game_returns_invalid_state() {
        let (manager, _game_id) = game_manager();
        let missing = GameId::generate();
        let result = manager
            .submit_event(&missing, "r1", Seat::North, GameCommand::Pass)
            .await;
        assert!(matches!(
            result.outbound.first(),
            Some(OutboundEvent::ActionRejected { code: RejectCode::InvalidState, .. })
        ));
    }
}
