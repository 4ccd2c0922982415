//! Bidding sub-state-machine actions, applied by [`crate::rules::engine`].

use serde::{Deserialize, Serialize};

use crate::domain::card::Suit;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BiddingAction {
    Pass,
    OrderUp { alone: bool },
    CallTrump { trump: Suit, alone: bool },
}
