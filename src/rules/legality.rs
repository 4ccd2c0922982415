//! Lead-suit follow rule: a player must follow the lead suit (left bower counting as trump) if
//! they hold any card of it.

use crate::domain::card::{Card, Suit};

use super::trump::effective_suit;

pub fn legal_plays(hand: &[Card], lead_suit: Option<Suit>, trump: Suit) -> Vec<Card> {
    match lead_suit {
        None => hand.to_vec(),
        Some(lead_suit) => {
            let following: Vec<Card> = hand
                .iter()
                .copied()
                .filter(|card| effective_suit(*card, trump) == lead_suit)
                .collect();
            if following.is_empty() {
                hand.to_vec()
            } else {
                following
            }
        }
    }
}

pub fn is_legal_play(card: Card, hand: &[Card], lead_suit: Option<Suit>, trump: Suit) -> bool {
    legal_plays(hand, lead_suit, trump).contains(&card)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::card::Rank;

    #[test]
    fn must_follow_suit_when_holding_it() {
        let hand = vec![
            Card::new(Suit::Clubs, Rank::Nine),
            Card::new(Suit::Hearts, Rank::Ace),
        ];
        let legal = legal_plays(&hand, Some(Suit::Clubs), Suit::Spades);
        assert_eq!(legal, vec![Card::new(Suit::Clubs, Rank::Nine)]);
    }

    #[test]
    fn left_bower_counts_as_trump_not_its_printed_suit() {
        let left_bower = Card::new(Suit::Spades, Rank::Jack);
        let hand = vec![left_bower, Card::new(Suit::Spades, Rank::Nine)];
        // trump is clubs, lead suit is clubs: the left bower (printed spades) must follow.
        let legal = legal_plays(&hand, Some(Suit::Clubs), Suit::Clubs);
        assert_eq!(legal, vec![left_bower]);
    }

    #[test]
    fn may_play_anything_when_void_in_lead_suit() {
        let hand = vec![Card::new(Suit::Hearts, Rank::Ace)];
        let legal = legal_plays(&hand, Some(Suit::Clubs), Suit::Spades);
        assert_eq!(legal, hand);
    }
}
