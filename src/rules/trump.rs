//! Trump ranking: right/left bower, trump-over-offsuit, and within-suit ace-high ordering.

use crate::domain::card::{Card, Rank, Suit};
use crate::domain::seat::Seat;
use crate::domain::game::Trick;

pub fn is_right_bower(card: Card, trump: Suit) -> bool {
    card.rank == Rank::Jack && card.suit == trump
}

pub fn is_left_bower(card: Card, trump: Suit) -> bool {
    card.rank == Rank::Jack && card.suit == trump.same_color()
}

pub fn is_trump(card: Card, trump: Suit) -> bool {
    is_right_bower(card, trump) || is_left_bower(card, trump) || card.suit == trump
}

/// The suit a card counts as for following purposes: the left bower counts as trump, not its
/// printed suit.
pub fn effective_suit(card: Card, trump: Suit) -> Suit {
    if is_left_bower(card, trump) {
        trump
    } else {
        card.suit
    }
}

/// Strictly-ordered rank value within a single trick given the active trump. Higher wins.
/// Off-suit cards of different suits are incomparable in play (legality prevents mixed-suit
/// comparison outside trump) but still need a total order for sorting hands.
pub fn rank_value(card: Card, trump: Suit) -> u32 {
    if is_right_bower(card, trump) {
        return 1000;
    }
    if is_left_bower(card, trump) {
        return 999;
    }
    if card.suit == trump {
        return 900 + card.rank.off_suit_value() as u32;
    }
    card.rank.off_suit_value() as u32
}

/// Resolves the winner of a completed trick (4 plays, or 3 when a lone hand is in progress).
pub fn trick_winner(trick: &Trick, trump: Suit) -> Seat {
    let lead_suit = trick
        .lead_suit(trump)
        .expect("trick_winner called on an empty trick");

    trick
        .plays
        .iter()
        .filter(|(_, card)| {
            is_trump(*card, trump) || effective_suit(*card, trump) == lead_suit
        })
        .max_by_key(|(_, card)| rank_value(*card, trump))
        .map(|(seat, _)| *seat)
        .expect("at least the lead play qualifies")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn left_bower_counts_as_trump() {
        let left_bower = Card::new(Suit::Spades, Rank::Jack);
        assert!(is_left_bower(left_bower, Suit::Clubs));
        assert_eq!(effective_suit(left_bower, Suit::Clubs), Suit::Clubs);
    }

    #[test]
    fn right_bower_beats_left_bower_beats_ace_of_trump() {
        let right = rank_value(Card::new(Suit::Clubs, Rank::Jack), Suit::Clubs);
        let left = rank_value(Card::new(Suit::Spades, Rank::Jack), Suit::Clubs);
        let ace_trump = rank_value(Card::new(Suit::Clubs, Rank::Ace), Suit::Clubs);
        assert!(right > left);
        assert!(left > ace_trump);
    }

    #[test]
    fn trump_always_beats_offsuit() {
        let nine_trump = rank_value(Card::new(Suit::Hearts, Rank::Nine), Suit::Hearts);
        let ace_offsuit = rank_value(Card::new(Suit::Spades, Rank::Ace), Suit::Hearts);
        assert!(nine_trump > ace_offsuit);
    }

    #[test]
    fn trick_winner_highest_trump_wins_over_lead_suit_ace() {
        let trump = Suit::Hearts;
        let mut trick = Trick::new(Seat::North);
        trick.plays.push((Seat::North, Card::new(Suit::Clubs, Rank::Ace)));
        trick.plays.push((Seat::East, Card::new(Suit::Hearts, Rank::Nine)));
        trick.plays.push((Seat::South, Card::new(Suit::Clubs, Rank::King)));
        trick.plays.push((Seat::West, Card::new(Suit::Clubs, Rank::Queen)));
        assert_eq!(trick_winner(&trick, trump), Seat::East);
    }

    #[test]
    fn trick_winner_highest_lead_suit_when_no_trump_played() {
        let trump = Suit::Hearts;
        let mut trick = Trick::new(Seat::North);
        trick.plays.push((Seat::North, Card::new(Suit::Clubs, Rank::Nine)));
        trick.plays.push((Seat::East, Card::new(Suit::Clubs, Rank::Ace)));
        trick.plays.push((Seat::South, Card::new(Suit::Diamonds, Rank::King)));
        trick.plays.push((Seat::West, Card::new(Suit::Clubs, Rank::King)));
        assert_eq!(trick_winner(&trick, trump), Seat::East);
    }
}
