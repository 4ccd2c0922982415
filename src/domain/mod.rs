//! Core data model: identifiers live in [`crate::ids`]; this module holds the value types the
//! stores persist and the rules engine transitions — seats/teams, cards, and the three record
//! kinds (lobby, game, session).

pub mod card;
pub mod game;
pub mod lobby;
pub mod seat;
pub mod session;

pub use card::{Card, Rank, Suit};
pub use game::{Bidding, GamePhase, GameRecord, Scores, Trick, TricksWon};
pub use lobby::{LobbyPhase, LobbyRecord, SeatSlot};
pub use seat::{Seat, Team};
pub use session::SessionRecord;
