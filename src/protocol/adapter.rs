//! Validates wire-level requests into internal [`Command`]s and projects domain records back
//! into outbound wire events. Projections are deep copies: mutating a returned view must never
//! reach back into stored state, which falls out naturally from `Clone`-based construction over
//! owned fields.

use rand::Rng;
use serde::Deserialize;

use crate::domain::game::GameRecord;
use crate::domain::seat::Seat;
use crate::domain::{Card, LobbyRecord, Suit};
use crate::ids::{GameId, LobbyId, PlayerId, SessionId};
use crate::rules::{self, RejectCode, RulesReject};

use super::command::{Command, GameCommand, LobbyCommand};
use super::wire::{GamePrivateStateView, GameStateView, LobbyStateView, OutboundEvent};

/// The type tag accepted by `POST /actions`, combining lobby and game subcommands in one enum
/// the way the HTTP surface's single dispatch endpoint requires.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawAction {
    #[serde(rename = "lobby.create")]
    LobbyCreate { display_name: Option<String> },
    #[serde(rename = "lobby.join")]
    LobbyJoin {
        lobby_id: LobbyId,
        display_name: Option<String>,
        reconnect_token: Option<String>,
    },
    #[serde(rename = "lobby.update_name")]
    LobbyUpdateName {
        lobby_id: LobbyId,
        player_id: PlayerId,
        display_name: String,
    },
    #[serde(rename = "lobby.start")]
    LobbyStart { lobby_id: LobbyId, player_id: PlayerId },
    #[serde(rename = "game.play_card")]
    GamePlayCard {
        game_id: GameId,
        session_id: SessionId,
        card: Card,
    },
    #[serde(rename = "game.pass")]
    GamePass {
        game_id: GameId,
        session_id: SessionId,
    },
    #[serde(rename = "game.order_up")]
    GameOrderUp {
        game_id: GameId,
        session_id: SessionId,
        alone: bool,
    },
    #[serde(rename = "game.call_trump")]
    GameCallTrump {
        game_id: GameId,
        session_id: SessionId,
        trump: Suit,
        alone: bool,
    },
}

impl RawAction {
    /// The calling session for a game subcommand, used by the dispatcher to resolve which seat
    /// is acting before the adapter ever sees a `Seat`. `None` for lobby subcommands, which
    /// authorize off an explicit `player_id` field instead.
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            RawAction::GamePlayCard { session_id, .. }
            | RawAction::GamePass { session_id, .. }
            | RawAction::GameOrderUp { session_id, .. }
            | RawAction::GameCallTrump { session_id, .. } => Some(session_id),
            _ => None,
        }
    }
}

pub struct ProtocolAdapter;

impl ProtocolAdapter {
    /// `actor` is the seat the calling session occupies in the named game, resolved by the
    /// dispatcher from the session store before the adapter ever sees the request.
    pub fn to_domain_command(raw: RawAction, actor: Option<Seat>) -> Result<Command, RulesReject> {
        match raw {
            RawAction::LobbyCreate { display_name } => {
                Ok(Command::Lobby(LobbyCommand::Create { display_name }))
            }
            RawAction::LobbyJoin {
                lobby_id,
                display_name,
                reconnect_token,
            } => Ok(Command::Lobby(LobbyCommand::Join {
                lobby_id,
                display_name,
                reconnect_token,
            })),
            RawAction::LobbyUpdateName {
                lobby_id,
                player_id,
                display_name,
            } => Ok(Command::Lobby(LobbyCommand::UpdateName {
                lobby_id,
                player_id,
                display_name,
            })),
            RawAction::LobbyStart { lobby_id, player_id } => {
                Ok(Command::Lobby(LobbyCommand::Start { lobby_id, player_id }))
            }
            RawAction::GamePlayCard { game_id, card, .. } => Ok(Command::Game {
                game_id,
                actor: require_actor(actor)?,
                command: GameCommand::PlayCard { card },
            }),
            RawAction::GamePass { game_id, .. } => Ok(Command::Game {
                game_id,
                actor: require_actor(actor)?,
                command: GameCommand::Pass,
            }),
            RawAction::GameOrderUp { game_id, alone, .. } => Ok(Command::Game {
                game_id,
                actor: require_actor(actor)?,
                command: GameCommand::OrderUp { alone },
            }),
            RawAction::GameCallTrump {
                game_id,
                trump,
                alone,
                ..
            } => Ok(Command::Game {
                game_id,
                actor: require_actor(actor)?,
                command: GameCommand::CallTrump { trump, alone },
            }),
        }
    }

    /// Applies a game command through the rules engine and always returns at least one outbound
    /// event: `game.state` on success, `action.rejected` on failure.
    pub fn apply_to_game<R: Rng + ?Sized>(
        state: &GameRecord,
        actor: Seat,
        command: &GameCommand,
        rng: &mut R,
    ) -> (GameRecord, Vec<OutboundEvent>) {
        let action = to_rules_action(actor, command);
        match rules::apply(state, &action, rng) {
            Ok(next) => {
                let outbound = vec![OutboundEvent::GameState(GameStateView::from_record(&next))];
                (next, outbound)
            }
            Err(reject) => (
                state.clone(),
                vec![OutboundEvent::ActionRejected {
                    code: reject.code,
                    message: reject.message,
                }],
            ),
        }
    }

    pub fn to_lobby_state_event(lobby: &LobbyRecord) -> OutboundEvent {
        OutboundEvent::LobbyState(LobbyStateView {
            lobby: lobby.clone(),
        })
    }

    pub fn to_game_state_event(game: &GameRecord) -> OutboundEvent {
        OutboundEvent::GameState(GameStateView::from_record(game))
    }

    pub fn to_game_private_state_event(game: &GameRecord, seat: Seat) -> OutboundEvent {
        let hand = game
            .hands
            .as_ref()
            .map(|hands| hands[seat.index()].clone())
            .unwrap_or_default();
        OutboundEvent::GamePrivateState(GamePrivateStateView {
            game_id: game.game_id.clone(),
            seat,
            hand,
        })
    }
}

fn require_actor(actor: Option<Seat>) -> Result<Seat, RulesReject> {
    actor.ok_or_else(|| RulesReject {
        code: RejectCode::Unauthorized,
        message: "session is not seated in this game".to_string(),
    })
}

fn to_rules_action(actor: Seat, command: &GameCommand) -> rules::Action {
    use rules::engine::Action;
    use rules::bidding::BiddingAction;

    match command {
        GameCommand::Pass => Action::Bidding {
            actor,
            action: BiddingAction::Pass,
        },
        GameCommand::OrderUp { alone } => Action::Bidding {
            actor,
            action: BiddingAction::OrderUp { alone: *alone },
        },
        GameCommand::CallTrump { trump, alone } => Action::Bidding {
            actor,
            action: BiddingAction::CallTrump {
                trump: *trump,
                alone: *alone,
            },
        },
        GameCommand::PlayCard { card } => Action::PlayCard {
            actor,
            card: *card,
        },
    }
}
