//! Runtime Dispatcher: the lobby/game command handlers that tie stores, the game manager, the
//! token codec and the realtime broker together. This is the one module allowed to know about
//! all the others — everything downstream of it (rules, stores, broker) stays ignorant of HTTP
//! or WebSocket framing; `server/routes.rs` only ever talks to this narrow surface.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::broker::{BrokerError, RealtimeBroker, RoomId};
use crate::clock::Clock;
use crate::domain::game::GameRecord;
use crate::domain::lobby::{LobbyPhase, LobbyRecord};
use crate::domain::seat::Seat;
use crate::domain::session::SessionRecord;
use crate::ids::{GameId, LobbyId, PlayerId, ReconnectToken, SessionId};
use crate::manager::GameManager;
use crate::protocol::adapter::ProtocolAdapter;
use crate::protocol::command::{Command, GameCommand, LobbyCommand};
use crate::protocol::wire::{Identity, OutboundEvent};
use crate::rules::{RejectCode, RulesReject};
use crate::stores::{GameStore, LobbyStore, SessionStore};
use crate::token::{TokenCodec, TokenError, TokenVerifyExpectations};

const TARGET_SCORE: u32 = 10;
const TOKEN_MAX_AGE_MS: u64 = 7 * 24 * 60 * 60 * 1000;
const TOKEN_CLOCK_SKEW_MS: u64 = 1_000;

pub struct DispatchOutcome {
    pub identity: Option<Identity>,
    pub outbound: Vec<OutboundEvent>,
}

pub struct Dispatcher {
    lobby_store: Arc<LobbyStore>,
    game_store: Arc<GameStore>,
    session_store: Arc<SessionStore>,
    manager: Arc<GameManager>,
    broker: Arc<RealtimeBroker>,
    token_codec: Arc<TokenCodec>,
    clock: Arc<dyn Clock>,
    reconnect_grace_ms: u64,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        lobby_store: Arc<LobbyStore>,
        game_store: Arc<GameStore>,
        session_store: Arc<SessionStore>,
        manager: Arc<GameManager>,
        broker: Arc<RealtimeBroker>,
        token_codec: Arc<TokenCodec>,
        clock: Arc<dyn Clock>,
        reconnect_grace_ms: u64,
    ) -> Self {
        Self {
            lobby_store,
            game_store,
            session_store,
            manager,
            broker,
            token_codec,
            clock,
            reconnect_grace_ms,
        }
    }

    pub fn session_store(&self) -> &Arc<SessionStore> {
        &self.session_store
    }

    pub fn broker(&self) -> &Arc<RealtimeBroker> {
        &self.broker
    }

    pub fn lobby_store(&self) -> &Arc<LobbyStore> {
        &self.lobby_store
    }

    pub fn game_store(&self) -> &Arc<GameStore> {
        &self.game_store
    }

    pub fn token_codec(&self) -> &Arc<TokenCodec> {
        &self.token_codec
    }

    pub fn clock_now(&self) -> u64 {
        self.now()
    }

    pub async fn dispatch(&self, command: Command) -> Result<DispatchOutcome, RulesReject> {
        match command {
            Command::Lobby(lobby_command) => self.dispatch_lobby(lobby_command),
            Command::Game {
                game_id,
                actor,
                command,
            } => self.dispatch_game(&game_id, actor, command).await,
        }
    }

    fn dispatch_lobby(&self, command: LobbyCommand) -> Result<DispatchOutcome, RulesReject> {
        match command {
            LobbyCommand::Create { display_name } => Ok(self.lobby_create(display_name)),
            LobbyCommand::Join {
                lobby_id,
                display_name,
                reconnect_token,
            } => self.lobby_join(lobby_id, display_name, reconnect_token),
            LobbyCommand::UpdateName {
                lobby_id,
                player_id,
                display_name,
            } => self.lobby_update_name(lobby_id, player_id, display_name),
            LobbyCommand::Start {
                lobby_id,
                player_id,
            } => self.lobby_start(lobby_id, player_id),
        }
    }

    fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    fn lobby_create(&self, display_name: Option<String>) -> DispatchOutcome {
        let now = self.now();
        let lobby_id = LobbyId::generate();
        let host_player_id = PlayerId::generate();
        let session_id = SessionId::generate();
        let token = self
            .token_codec
            .issue(&session_id, &lobby_id, &host_player_id, now);
        let reconnect_token = ReconnectToken::new(token).expect("issued tokens are valid ids");

        let lobby = LobbyRecord::new(
            lobby_id.clone(),
            host_player_id.clone(),
            display_name,
            now,
        );
        let session = SessionRecord::new(
            session_id.clone(),
            host_player_id.clone(),
            lobby_id.clone(),
            reconnect_token.clone(),
            now,
        );

        self.lobby_store.upsert(lobby.clone());
        self.session_store.upsert(session);
        self.broker.join_room(&session_id, RoomId::lobby(&lobby_id));

        let outbound = self.publish_lobby_state(&lobby);

        DispatchOutcome {
            identity: Some(Identity {
                lobby_id,
                player_id: host_player_id,
                session_id,
                reconnect_token,
            }),
            outbound,
        }
    }

    fn lobby_join(
        &self,
        lobby_id: LobbyId,
        display_name: Option<String>,
        reconnect_token: Option<String>,
    ) -> Result<DispatchOutcome, RulesReject> {
        let now = self.now();

        if let Some(token_str) = reconnect_token {
            return self.lobby_rejoin(lobby_id, token_str, now);
        }

        let mut lobby = self
            .lobby_store
            .get_by_id(&lobby_id)
            .ok_or_else(|| invalid_state("lobby not found"))?;
        let seat = lobby
            .next_open_seat()
            .ok_or_else(|| invalid_state("lobby is full"))?;

        let player_id = PlayerId::generate();
        let session_id = SessionId::generate();
        let token = self
            .token_codec
            .issue(&session_id, &lobby_id, &player_id, now);
        let reconnect_token = ReconnectToken::new(token).expect("issued tokens are valid ids");

        let slot = lobby.seat_slot_mut(seat);
        slot.player_id = Some(player_id.clone());
        slot.display_name = display_name;
        slot.connected = true;
        self.lobby_store.upsert(lobby.clone());

        let session = SessionRecord::new(
            session_id.clone(),
            player_id.clone(),
            lobby_id.clone(),
            reconnect_token.clone(),
            now,
        );
        self.session_store.upsert(session);
        self.broker.join_room(&session_id, RoomId::lobby(&lobby_id));

        let outbound = self.publish_lobby_state(&lobby);

        Ok(DispatchOutcome {
            identity: Some(Identity {
                lobby_id,
                player_id,
                session_id,
                reconnect_token,
            }),
            outbound,
        })
    }

    fn lobby_rejoin(
        &self,
        lobby_id: LobbyId,
        token_str: String,
        now: u64,
    ) -> Result<DispatchOutcome, RulesReject> {
        let token = ReconnectToken::new(token_str.clone())
            .map_err(|_| unauthorized("malformed reconnect token"))?;
        let mut session = self
            .session_store
            .get_by_reconnect_token(&token)
            .ok_or_else(|| unauthorized("unknown reconnect token"))?;

        self.token_codec
            .verify(
                &token_str,
                &TokenVerifyExpectations {
                    session_id: &session.session_id,
                    lobby_id: &lobby_id,
                    player_id: Some(&session.player_id),
                    now_ms: now,
                    max_age_ms: TOKEN_MAX_AGE_MS,
                    allowed_clock_skew_ms: TOKEN_CLOCK_SKEW_MS,
                },
            )
            .map_err(token_error_to_reject)?;

        if let Some(reconnect_by) = session.reconnect_by_ms {
            if now > reconnect_by {
                return Err(invalid_state("reconnect window expired"));
            }
        }

        session.mark_connected(now);
        let session = self.session_store.upsert(session);

        let mut lobby = self
            .lobby_store
            .get_by_id(&lobby_id)
            .ok_or_else(|| invalid_state("lobby not found"))?;
        if let Some(seat) = lobby.seat_of_player(&session.player_id) {
            lobby.seat_slot_mut(seat).connected = true;
            self.lobby_store.upsert(lobby.clone());
        }

        self.broker
            .join_room(&session.session_id, RoomId::lobby(&lobby_id));
        let mut outbound = self.publish_lobby_state(&lobby);

        if let Some(game_id) = session.game_id.clone() {
            if let Some(game) = self.game_store.get_by_id(&game_id) {
                self.broker
                    .join_room(&session.session_id, RoomId::game(&game_id));
                outbound.extend(self.publish_game_state(&game));
            }
        }

        Ok(DispatchOutcome {
            identity: Some(Identity {
                lobby_id,
                player_id: session.player_id,
                session_id: session.session_id,
                reconnect_token: session.reconnect_token,
            }),
            outbound,
        })
    }

    fn lobby_update_name(
        &self,
        lobby_id: LobbyId,
        player_id: PlayerId,
        display_name: String,
    ) -> Result<DispatchOutcome, RulesReject> {
        let mut lobby = self
            .lobby_store
            .get_by_id(&lobby_id)
            .ok_or_else(|| invalid_state("lobby not found"))?;
        let seat = lobby
            .seat_of_player(&player_id)
            .ok_or_else(|| unauthorized("player is not seated in this lobby"))?;
        lobby.seat_slot_mut(seat).display_name = Some(display_name);
        self.lobby_store.upsert(lobby.clone());

        Ok(DispatchOutcome {
            identity: None,
            outbound: self.publish_lobby_state(&lobby),
        })
    }

    fn lobby_start(
        &self,
        lobby_id: LobbyId,
        player_id: PlayerId,
    ) -> Result<DispatchOutcome, RulesReject> {
        let mut lobby = self
            .lobby_store
            .get_by_id(&lobby_id)
            .ok_or_else(|| invalid_state("lobby not found"))?;
        if lobby.host_player_id != player_id {
            return Err(unauthorized("only the host may start the game"));
        }
        if !lobby.is_full() {
            return Err(invalid_state("lobby is not full"));
        }

        let now = self.now();
        let game_id = GameId::generate();
        let game = GameRecord::new(game_id.clone(), lobby_id.clone(), Seat::North, TARGET_SCORE, now);
        let mut rng = StdRng::from_entropy();
        let game = crate::rules::apply(&game, &crate::rules::Action::DealHand { deck: None }, &mut rng)
            .expect("deal_hand is always legal on a freshly created game");
        self.game_store.upsert(game.clone());

        lobby.phase = LobbyPhase::InGame;
        lobby.game_id = Some(game_id.clone());
        self.lobby_store.upsert(lobby.clone());

        for seat in Seat::ALL {
            if let Some(seated_player) = lobby.seat_slot(seat).player_id.clone() {
                if let Some(session) = self.session_store.get_by_player(&seated_player) {
                    let mut session = session;
                    session.game_id = Some(game_id.clone());
                    self.session_store.upsert(session.clone());
                    self.broker
                        .join_room(&session.session_id, RoomId::game(&game_id));
                }
            }
        }

        let mut outbound = self.publish_lobby_state(&lobby);
        outbound.extend(self.publish_game_state(&game));

        Ok(DispatchOutcome {
            identity: None,
            outbound,
        })
    }

    async fn dispatch_game(
        &self,
        game_id: &GameId,
        actor: Seat,
        command: GameCommand,
    ) -> Result<DispatchOutcome, RulesReject> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let result = self
            .manager
            .submit_event(game_id, &request_id, actor, command)
            .await;

        let room = RoomId::game(game_id);
        let now = self.now();
        let publish_result = self
            .broker
            .publish("domain-transition", &room, result.outbound, now);
        let outbound = match publish_result {
            Ok(_) => Vec::new(),
            Err(BrokerError::UnauthorizedSource) => {
                unreachable!("dispatcher always publishes as domain-transition")
            }
        };

        if let Some(game) = &result.game {
            self.route_private_events(game, result.private_events, now);
        }

        Ok(DispatchOutcome {
            identity: None,
            outbound,
        })
    }

    fn publish_lobby_state(&self, lobby: &LobbyRecord) -> Vec<OutboundEvent> {
        let event = ProtocolAdapter::to_lobby_state_event(lobby);
        let room = RoomId::lobby(&lobby.lobby_id);
        let _ = self
            .broker
            .publish("domain-transition", &room, vec![event.clone()], self.now());
        vec![event]
    }

    /// Publishes the public game-state event to the shared room and unicasts each seat's private
    /// hand view only to that seat's own session. Returns just the public event — private views
    /// never flow back into a caller's HTTP response body or the room broadcast.
    fn publish_game_state(&self, game: &GameRecord) -> Vec<OutboundEvent> {
        let now = self.now();
        let public_event = ProtocolAdapter::to_game_state_event(game);
        let room = RoomId::game(&game.game_id);
        let _ = self
            .broker
            .publish("domain-transition", &room, vec![public_event.clone()], now);

        let private_events = Seat::ALL
            .into_iter()
            .map(|seat| (seat, ProtocolAdapter::to_game_private_state_event(game, seat)))
            .collect();
        self.route_private_events(game, private_events, now);

        vec![public_event]
    }

    /// Routes each `(seat, event)` pair to the session currently occupying that seat, resolved via
    /// the lobby's seat assignments — never through the room-wide broker `publish`.
    fn route_private_events(
        &self,
        game: &GameRecord,
        private_events: Vec<(Seat, OutboundEvent)>,
        now: u64,
    ) {
        if private_events.is_empty() {
            return;
        }
        let Some(lobby) = self.lobby_store.get_by_id(&game.lobby_id) else {
            return;
        };
        for (seat, event) in private_events {
            let Some(player_id) = lobby.seat_slot(seat).player_id.clone() else {
                continue;
            };
            let Some(session) = self.session_store.get_by_player(&player_id) else {
                continue;
            };
            let _ = self
                .broker
                .publish_to_session("domain-transition", &session.session_id, event, now);
        }
    }

    pub fn reconnect_grace_ms(&self) -> u64 {
        self.reconnect_grace_ms
    }
}

fn invalid_state(message: impl Into<String>) -> RulesReject {
    RulesReject {
        code: RejectCode::InvalidState,
        message: message.into(),
    }
}

fn unauthorized(message: impl Into<String>) -> RulesReject {
    RulesReject {
        code: RejectCode::Unauthorized,
        message: message.into(),
    }
}

fn token_error_to_reject(err: TokenError) -> RulesReject {
    match err {
        TokenError::Expired => invalid_state("reconnect token expired"),
        TokenError::NotYetValid | TokenError::Malformed => {
            RulesReject {
                code: RejectCode::InvalidAction,
                message: err.to_string(),
            }
        }
        TokenError::InvalidSignature | TokenError::ClaimMismatch => unauthorized(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::wire::WireEnvelope;
    use crate::test_support::ManualClock;
    use tokio::sync::mpsc;

    fn dispatcher() -> Dispatcher {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));
        let game_store = Arc::new(GameStore::new(clock.clone(), None, 300_000));
        Dispatcher::new(
            Arc::new(LobbyStore::new(clock.clone(), None)),
            game_store.clone(),
            Arc::new(SessionStore::new(clock.clone(), None, 300_000)),
            Arc::new(GameManager::new(game_store, clock.clone())),
            Arc::new(RealtimeBroker::new()),
            Arc::new(TokenCodec::new(b"test-secret-0123456789".to_vec())),
            clock,
            60_000,
        )
    }

    /// Four sessions fill a lobby and the host starts the game, each session connecting a sink
    /// to the broker first so `lobby_start`'s per-seat private routing has somewhere to deliver.
    fn start_full_game(
        dispatcher: &Dispatcher,
    ) -> (LobbyId, Vec<(SessionId, mpsc::UnboundedReceiver<WireEnvelope>)>) {
        let created = dispatcher.lobby_create(None);
        let identity = created.identity.unwrap();
        let lobby_id = identity.lobby_id.clone();

        let mut sinks = Vec::new();
        let (tx, rx) = mpsc::unbounded_channel();
        dispatcher.broker.connect_session(identity.session_id.clone(), tx);
        sinks.push((identity.session_id.clone(), rx));

        for _ in 0..3 {
            let joined = dispatcher
                .lobby_join(lobby_id.clone(), None, None)
                .unwrap();
            let joined_identity = joined.identity.unwrap();
            let (tx, rx) = mpsc::unbounded_channel();
            dispatcher
                .broker
                .connect_session(joined_identity.session_id.clone(), tx);
            sinks.push((joined_identity.session_id, rx));
        }

        // lobby_create/lobby_join already called join_room before the sink existed for the host,
        // so re-join every session's lobby room now that all sinks are connected.
        for (session_id, _) in &sinks {
            dispatcher.broker.join_room(session_id, RoomId::lobby(&lobby_id));
        }

        dispatcher.lobby_start(lobby_id.clone(), identity.player_id).unwrap();

        (lobby_id, sinks)
    }

    #[test]
    fn starting_a_game_never_delivers_another_seats_private_hand() {
        let dispatcher = dispatcher();
        let (_lobby_id, mut sinks) = start_full_game(&dispatcher);

        for (_session_id, rx) in &mut sinks {
            let mut private_count = 0usize;
            while let Ok(envelope) = rx.try_recv() {
                if matches!(envelope.event, OutboundEvent::GamePrivateState(_)) {
                    private_count += 1;
                }
            }
            assert_eq!(
                private_count, 1,
                "each session must receive exactly its own private hand, never another seat's"
            );
        }
    }
}
