//! Internal commands the dispatcher executes, one level removed from wire framing.

use serde::{Deserialize, Serialize};

use crate::domain::card::{Card, Suit};
use crate::domain::seat::Seat;
use crate::ids::{GameId, LobbyId, PlayerId};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum LobbyCommand {
    Create {
        display_name: Option<String>,
    },
    Join {
        lobby_id: LobbyId,
        display_name: Option<String>,
        reconnect_token: Option<String>,
    },
    UpdateName {
        lobby_id: LobbyId,
        player_id: PlayerId,
        display_name: String,
    },
    Start {
        lobby_id: LobbyId,
        player_id: PlayerId,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum GameCommand {
    Pass,
    OrderUp { alone: bool },
    CallTrump { trump: Suit, alone: bool },
    PlayCard { card: Card },
}

#[derive(Debug, Clone)]
pub enum Command {
    Lobby(LobbyCommand),
    Game {
        game_id: GameId,
        actor: Seat,
        command: GameCommand,
    },
}
