//! Wire event schema: `{version:1, type, payload, ordering?}`.

use serde::{Deserialize, Serialize};

use crate::domain::game::GamePhase;
use crate::domain::{Card, GameRecord, LobbyRecord, Seat, Suit};
use crate::ids::{GameId, LobbyId, PlayerId, ReconnectToken, SessionId};
use crate::rules::RejectCode;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Ordering {
    pub sequence: u64,
    pub emitted_at_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub lobby_id: LobbyId,
    pub player_id: PlayerId,
    pub session_id: SessionId,
    pub reconnect_token: ReconnectToken,
}

/// Public, deep-copied view of a lobby — safe to hand to every member of the lobby room.
#[derive(Debug, Clone, Serialize)]
pub struct LobbyStateView {
    pub lobby: LobbyRecord,
}

/// Public, deep-copied view of a game — withholds per-seat hands.
#[derive(Debug, Clone, Serialize)]
pub struct GameStateView {
    pub game_id: GameId,
    pub lobby_id: LobbyId,
    pub phase: GamePhase,
    pub hand_number: u32,
    pub dealer: Seat,
    pub turn: Seat,
    pub trump: Option<Suit>,
    pub maker: Option<Seat>,
    pub alone: bool,
    pub upcard: Option<Card>,
    pub tricks_won: crate::domain::game::TricksWon,
    pub scores: crate::domain::game::Scores,
    pub target_score: u32,
    pub winner: Option<crate::domain::Team>,
    pub trick: Option<crate::domain::game::Trick>,
}

impl GameStateView {
    pub fn from_record(game: &GameRecord) -> Self {
        Self {
            game_id: game.game_id.clone(),
            lobby_id: game.lobby_id.clone(),
            phase: game.phase,
            hand_number: game.hand_number,
            dealer: game.dealer,
            turn: game.turn,
            trump: game.trump,
            maker: game.maker,
            alone: game.alone,
            upcard: game.upcard,
            tricks_won: game.tricks_won,
            scores: game.scores,
            target_score: game.target_score,
            winner: game.winner,
            trick: game.trick.clone(),
        }
    }
}

/// Private, per-seat view: the one piece of state that differs by recipient.
#[derive(Debug, Clone, Serialize)]
pub struct GamePrivateStateView {
    pub game_id: GameId,
    pub seat: Seat,
    pub hand: Vec<Card>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum OutboundEvent {
    LobbyState(LobbyStateView),
    GameState(GameStateView),
    GamePrivateState(GamePrivateStateView),
    ActionRejected { code: RejectCode, message: String },
    SystemNotice { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct WireEnvelope {
    pub version: u8,
    #[serde(flatten)]
    pub event: OutboundEvent,
    pub ordering: Option<Ordering>,
}

impl WireEnvelope {
    pub fn new(event: OutboundEvent, ordering: Option<Ordering>) -> Self {
        Self {
            version: 1,
            event,
            ordering,
        }
    }
}
