//! Pure Euchre rules engine: `apply(state, action) -> {state'} | {reject}` plus the supporting
//! deck, trump-ranking, legality, bidding and scoring helpers it is built from.

pub mod bidding;
pub mod deck;
pub mod engine;
pub mod legality;
pub mod scoring;
pub mod trump;

pub use bidding::BiddingAction;
pub use deck::{full_deck, Card};
pub use engine::{apply, forfeit, Action, RejectCode, RulesReject};
