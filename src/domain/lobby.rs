use serde::{Deserialize, Serialize};

use crate::ids::{LobbyId, PlayerId};

use super::seat::{Seat, Team};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LobbyPhase {
    Waiting,
    InGame,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatSlot {
    pub seat: Seat,
    pub team: Team,
    pub player_id: Option<PlayerId>,
    pub display_name: Option<String>,
    pub connected: bool,
}

impl SeatSlot {
    pub fn empty(seat: Seat) -> Self {
        Self {
            seat,
            team: seat.team(),
            player_id: None,
            display_name: None,
            connected: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyRecord {
    pub lobby_id: LobbyId,
    pub host_player_id: PlayerId,
    pub phase: LobbyPhase,
    pub seats: [SeatSlot; 4],
    pub game_id: Option<crate::ids::GameId>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl LobbyRecord {
    /// A freshly created lobby with the host seated at north and the remaining seats empty.
    pub fn new(
        lobby_id: LobbyId,
        host_player_id: PlayerId,
        host_display_name: Option<String>,
        now_ms: u64,
    ) -> Self {
        let mut seats = Seat::ALL.map(SeatSlot::empty);
        seats[Seat::North.index()] = SeatSlot {
            seat: Seat::North,
            team: Seat::North.team(),
            player_id: Some(host_player_id.clone()),
            display_name: host_display_name,
            connected: true,
        };
        Self {
            lobby_id,
            host_player_id,
            phase: LobbyPhase::Waiting,
            seats,
            game_id: None,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }

    pub fn seat_slot(&self, seat: Seat) -> &SeatSlot {
        &self.seats[seat.index()]
    }

    pub fn seat_slot_mut(&mut self, seat: Seat) -> &mut SeatSlot {
        &mut self.seats[seat.index()]
    }

    pub fn seat_of_player(&self, player_id: &PlayerId) -> Option<Seat> {
        self.seats
            .iter()
            .find(|slot| slot.player_id.as_ref() == Some(player_id))
            .map(|slot| slot.seat)
    }

    pub fn is_full(&self) -> bool {
        self.seats.iter().all(|slot| slot.player_id.is_some())
    }

    /// First empty seat in cyclic order starting from east (host always takes north on create).
    pub fn next_open_seat(&self) -> Option<Seat> {
        Seat::East
            .cycle_from()
            .into_iter()
            .find(|seat| self.seat_slot(*seat).player_id.is_none())
    }
}
