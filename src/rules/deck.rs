//! Deck construction. Default deck is the 24-card Euchre deck (9 through ace of each suit).

use rand::seq::SliceRandom;
use rand::Rng;

pub use crate::domain::card::{Card, Rank, Suit};

pub fn full_deck() -> Vec<Card> {
    let mut deck = Vec::with_capacity(24);
    for suit in Suit::ALL {
        for rank in Rank::ALL {
            deck.push(Card::new(suit, rank));
        }
    }
    deck
}

/// Shuffles a copy of the full deck using the supplied RNG, so callers can inject determinism.
pub fn shuffled_deck<R: Rng + ?Sized>(rng: &mut R) -> Vec<Card> {
    let mut deck = full_deck();
    deck.shuffle(rng);
    deck
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_deck_has_24_unique_cards() {
        let deck = full_deck();
        assert_eq!(deck.len(), 24);
        let mut seen = std::collections::HashSet::new();
        for card in &deck {
            assert!(seen.insert((card.suit, card.rank)));
        }
    }
}
