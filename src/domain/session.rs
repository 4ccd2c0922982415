use serde::{Deserialize, Serialize};

use crate::ids::{GameId, LobbyId, PlayerId, ReconnectToken, SessionId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub player_id: PlayerId,
    pub lobby_id: LobbyId,
    pub game_id: Option<GameId>,
    pub reconnect_token: ReconnectToken,
    pub connected: bool,
    pub reconnect_by_ms: Option<u64>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl SessionRecord {
    pub fn new(
        session_id: SessionId,
        player_id: PlayerId,
        lobby_id: LobbyId,
        reconnect_token: ReconnectToken,
        now_ms: u64,
    ) -> Self {
        Self {
            session_id,
            player_id,
            lobby_id,
            game_id: None,
            reconnect_token,
            connected: true,
            reconnect_by_ms: None,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }

    /// Marks the session disconnected and opens its reconnect window
    /// (`connected=false ⇒ reconnectByMs = updatedAtMs + reconnectGraceMs`).
    pub fn mark_disconnected(&mut self, now_ms: u64, reconnect_grace_ms: u64) {
        self.connected = false;
        self.updated_at_ms = now_ms;
        self.reconnect_by_ms = Some(now_ms + reconnect_grace_ms);
    }

    pub fn mark_connected(&mut self, now_ms: u64) {
        self.connected = true;
        self.updated_at_ms = now_ms;
        self.reconnect_by_ms = None;
    }
}
