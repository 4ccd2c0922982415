use serde::{Deserialize, Serialize};

use crate::ids::{GameId, LobbyId};

use super::card::{Card, Suit};
use super::seat::{Seat, Team};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    Deal,
    Round1Bidding,
    Round2Bidding,
    Play,
    Score,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bidding {
    pub round: u8,
    pub turn: Seat,
    pub upcard: Option<Card>,
    pub turned_down_suit: Option<Suit>,
    pub passes: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trick {
    pub leader: Seat,
    pub turn: Seat,
    pub plays: Vec<(Seat, Card)>,
}

impl Trick {
    pub fn new(leader: Seat) -> Self {
        Self {
            leader,
            turn: leader,
            plays: Vec::with_capacity(4),
        }
    }

    pub fn lead_suit(&self, trump: Suit) -> Option<Suit> {
        self.plays
            .first()
            .map(|(_, card)| crate::rules::trump::effective_suit(*card, trump))
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Scores {
    pub team_a: u32,
    pub team_b: u32,
}

impl Scores {
    pub fn get(&self, team: Team) -> u32 {
        match team {
            Team::TeamA => self.team_a,
            Team::TeamB => self.team_b,
        }
    }

    pub fn add(&mut self, team: Team, delta: u32) {
        match team {
            Team::TeamA => self.team_a += delta,
            Team::TeamB => self.team_b += delta,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TricksWon {
    pub team_a: u8,
    pub team_b: u8,
}

impl TricksWon {
    pub fn get(&self, team: Team) -> u8 {
        match team {
            Team::TeamA => self.team_a,
            Team::TeamB => self.team_b,
        }
    }

    pub fn add(&mut self, team: Team) {
        match team {
            Team::TeamA => self.team_a += 1,
            Team::TeamB => self.team_b += 1,
        }
    }

    pub fn total(&self) -> u8 {
        self.team_a + self.team_b
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRecord {
    pub game_id: GameId,
    pub lobby_id: LobbyId,
    pub phase: GamePhase,
    pub hand_number: u32,
    pub dealer: Seat,
    pub turn: Seat,
    pub trump: Option<Suit>,
    pub maker: Option<Seat>,
    pub alone: bool,
    pub partner_sits_out: Option<Seat>,
    pub hands: Option<[Vec<Card>; 4]>,
    pub upcard: Option<Card>,
    pub kitty: Vec<Card>,
    pub bidding: Option<Bidding>,
    pub trick: Option<Trick>,
    pub tricks_won: TricksWon,
    pub scores: Scores,
    pub target_score: u32,
    pub winner: Option<Team>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl GameRecord {
    pub fn new(game_id: GameId, lobby_id: LobbyId, dealer: Seat, target_score: u32, now_ms: u64) -> Self {
        Self {
            game_id,
            lobby_id,
            phase: GamePhase::Deal,
            hand_number: 0,
            dealer,
            turn: dealer.next(),
            trump: None,
            maker: None,
            alone: false,
            partner_sits_out: None,
            hands: None,
            upcard: None,
            kitty: Vec::new(),
            bidding: None,
            trick: None,
            tricks_won: TricksWon::default(),
            scores: Scores::default(),
            target_score,
            winner: None,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }

    /// The next seat in turn order, skipping the sitting-out partner when `alone` is in effect.
    pub fn next_active_seat(&self, from: Seat) -> Seat {
        let mut seat = from.next();
        if self.alone {
            if let Some(sitting_out) = self.partner_sits_out {
                if seat == sitting_out {
                    seat = seat.next();
                }
            }
        }
        seat
    }

    pub fn is_terminal(&self) -> bool {
        self.phase == GamePhase::Completed
    }
}
