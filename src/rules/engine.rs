//! The pure rules engine: `apply(state, action) -> Ok(state') | Err(reject)`.
//!
//! No I/O, no clock, no shared state: callers inject a deck (or an RNG to shuffle a fresh one)
//! and get back either a new [`GameRecord`] or a [`RulesReject`] describing why the action was
//! refused. [`crate::manager`] and [`crate::protocol::adapter`] are the only callers.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::card::{Card, Suit};
use crate::domain::game::{Bidding, GamePhase, GameRecord, Trick};
use crate::domain::seat::{Seat, Team};

use super::bidding::BiddingAction;
use super::deck::shuffled_deck;
use super::legality::is_legal_play;
use super::scoring::score_hand;
use super::trump::{effective_suit, rank_value, trick_winner};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectCode {
    NotYourTurn,
    InvalidAction,
    InvalidState,
    Unauthorized,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{code:?}: {message}")]
pub struct RulesReject {
    pub code: RejectCode,
    pub message: String,
}

impl RulesReject {
    fn new(code: RejectCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Action {
    DealHand { deck: Option<Vec<Card>> },
    Bidding { actor: Seat, action: BiddingAction },
    PlayCard { actor: Seat, card: Card },
    ScoreHand,
}

const HAND_SIZE: usize = 5;
const KITTY_SIZE: usize = 4;

pub fn apply<R: Rng + ?Sized>(
    state: &GameRecord,
    action: &Action,
    rng: &mut R,
) -> Result<GameRecord, RulesReject> {
    if state.is_terminal() {
        return Err(RulesReject::new(
            RejectCode::InvalidState,
            "game already completed",
        ));
    }

    match action {
        Action::DealHand { deck } => deal_hand(state, deck.clone(), rng),
        Action::Bidding { actor, action } => apply_bidding(state, *actor, action),
        Action::PlayCard { actor, card } => apply_play_card(state, *actor, *card),
        Action::ScoreHand => apply_score_hand(state),
    }
}

fn deal_hand<R: Rng + ?Sized>(
    state: &GameRecord,
    deck: Option<Vec<Card>>,
    rng: &mut R,
) -> Result<GameRecord, RulesReject> {
    if state.phase != GamePhase::Deal {
        return Err(RulesReject::new(
            RejectCode::InvalidState,
            "deal_hand is only legal in the deal phase",
        ));
    }
    let deck = deck.unwrap_or_else(|| shuffled_deck(rng));
    if deck.len() != 24 {
        return Err(RulesReject::new(
            RejectCode::InvalidAction,
            "deck must contain exactly 24 cards",
        ));
    }

    let mut hands: [Vec<Card>; 4] = Default::default();
    let mut cursor = 0usize;
    for seat in Seat::ALL {
        hands[seat.index()] = deck[cursor..cursor + HAND_SIZE].to_vec();
        cursor += HAND_SIZE;
    }
    let kitty = deck[cursor..cursor + KITTY_SIZE].to_vec();
    let upcard = kitty[0];

    let mut next = state.clone();
    next.hand_number += 1;
    next.phase = GamePhase::Round1Bidding;
    next.trump = None;
    next.maker = None;
    next.alone = false;
    next.partner_sits_out = None;
    next.hands = Some(hands);
    next.upcard = Some(upcard);
    next.kitty = kitty;
    next.turn = state.dealer.next();
    next.bidding = Some(Bidding {
        round: 1,
        turn: state.dealer.next(),
        upcard: Some(upcard),
        turned_down_suit: None,
        passes: 0,
    });
    next.trick = None;
    Ok(next)
}

fn apply_bidding(
    state: &GameRecord,
    actor: Seat,
    action: &BiddingAction,
) -> Result<GameRecord, RulesReject> {
    let phase_ok = matches!(
        state.phase,
        GamePhase::Round1Bidding | GamePhase::Round2Bidding
    );
    if !phase_ok {
        return Err(RulesReject::new(
            RejectCode::InvalidState,
            "bidding is only legal during round1_bidding or round2_bidding",
        ));
    }
    let bidding = state
        .bidding
        .as_ref()
        .expect("bidding phase always carries a Bidding sub-state");
    if bidding.turn != actor {
        return Err(RulesReject::new(
            RejectCode::NotYourTurn,
            format!("it is {:?}'s turn to bid, not {actor:?}", bidding.turn),
        ));
    }

    match (state.phase, action) {
        (GamePhase::Round1Bidding, BiddingAction::Pass) => pass_round1(state, bidding),
        (GamePhase::Round1Bidding, BiddingAction::OrderUp { alone }) => {
            order_up(state, actor, *alone)
        }
        (GamePhase::Round1Bidding, BiddingAction::CallTrump { .. }) => Err(RulesReject::new(
            RejectCode::InvalidAction,
            "call_trump is only legal in round2_bidding",
        )),
        (GamePhase::Round2Bidding, BiddingAction::Pass) => pass_round2(state, bidding),
        (GamePhase::Round2Bidding, BiddingAction::CallTrump { trump, alone }) => {
            call_trump(state, actor, *trump, *alone, bidding)
        }
        (GamePhase::Round2Bidding, BiddingAction::OrderUp { .. }) => Err(RulesReject::new(
            RejectCode::InvalidAction,
            "order_up is only legal in round1_bidding",
        )),
        _ => unreachable!("phase_ok guarantees round1 or round2"),
    }
}

fn pass_round1(state: &GameRecord, bidding: &Bidding) -> Result<GameRecord, RulesReject> {
    let mut next = state.clone();
    let passes = bidding.passes + 1;
    if passes >= 4 {
        next.bidding = Some(Bidding {
            round: 2,
            turn: state.dealer.next(),
            upcard: None,
            turned_down_suit: bidding.upcard.map(|card| card.suit),
            passes: 0,
        });
        next.phase = GamePhase::Round2Bidding;
        next.turn = state.dealer.next();
    } else {
        let next_bidding = Bidding {
            passes,
            turn: bidding.turn.next(),
            ..bidding.clone()
        };
        next.turn = next_bidding.turn;
        next.bidding = Some(next_bidding);
    }
    Ok(next)
}

fn order_up(state: &GameRecord, actor: Seat, alone: bool) -> Result<GameRecord, RulesReject> {
    let upcard = state
        .upcard
        .expect("round1_bidding always has an upcard set by deal_hand");
    let mut next = state.clone();
    next.trump = Some(upcard.suit);
    next.maker = Some(actor);
    next.alone = alone;
    next.partner_sits_out = alone.then(|| actor.partner());

    let mut hands = next.hands.take().expect("hands set at deal time");
    hands[state.dealer.index()].push(upcard);
    let discard_idx = lowest_value_index(&hands[state.dealer.index()], upcard.suit);
    hands[state.dealer.index()].remove(discard_idx);
    next.hands = Some(hands);

    next.upcard = None;
    next.bidding = None;
    start_play_phase(&mut next);
    Ok(next)
}

fn pass_round2(state: &GameRecord, bidding: &Bidding) -> Result<GameRecord, RulesReject> {
    let mut next = state.clone();
    let passes = bidding.passes + 1;
    if passes >= 4 {
        // All four pass in round 2: the hand is thrown in. Redeal with the dealer rotated
        // rather than inventing a scoring outcome; see DESIGN.md for the recorded decision.
        next.phase = GamePhase::Deal;
        next.dealer = state.dealer.next();
        next.turn = next.dealer.next();
        next.bidding = None;
        next.hands = None;
        next.upcard = None;
        next.kitty.clear();
        next.trick = None;
    } else {
        let next_bidding = Bidding {
            passes,
            turn: bidding.turn.next(),
            ..bidding.clone()
        };
        next.turn = next_bidding.turn;
        next.bidding = Some(next_bidding);
    }
    Ok(next)
}

fn call_trump(
    state: &GameRecord,
    actor: Seat,
    trump: Suit,
    alone: bool,
    bidding: &Bidding,
) -> Result<GameRecord, RulesReject> {
    if Some(trump) == bidding.turned_down_suit {
        return Err(RulesReject::new(
            RejectCode::InvalidAction,
            "cannot call the suit that was turned down",
        ));
    }
    let mut next = state.clone();
    next.trump = Some(trump);
    next.maker = Some(actor);
    next.alone = alone;
    next.partner_sits_out = alone.then(|| actor.partner());
    next.bidding = None;
    start_play_phase(&mut next);
    Ok(next)
}

fn start_play_phase(next: &mut GameRecord) {
    next.phase = GamePhase::Play;
    let leader = next.next_active_seat(next.dealer);
    next.turn = leader;
    next.trick = Some(Trick::new(leader));
}

fn apply_play_card(state: &GameRecord, actor: Seat, card: Card) -> Result<GameRecord, RulesReject> {
    if state.phase != GamePhase::Play {
        return Err(RulesReject::new(
            RejectCode::InvalidState,
            "play_card is only legal during the play phase",
        ));
    }
    let trump = state
        .trump
        .expect("play phase always has a trump established by bidding");
    let trick = state
        .trick
        .as_ref()
        .expect("play phase always has an in-progress trick");
    if trick.turn != actor {
        return Err(RulesReject::new(
            RejectCode::NotYourTurn,
            format!("it is {:?}'s turn to play, not {actor:?}", trick.turn),
        ));
    }
    if next_should_sit_out(state, actor) {
        return Err(RulesReject::new(
            RejectCode::InvalidAction,
            "seat is sitting out this hand",
        ));
    }

    let hands = state.hands.as_ref().expect("hands present during play");
    let hand = &hands[actor.index()];
    if !hand.contains(&card) {
        return Err(RulesReject::new(
            RejectCode::InvalidAction,
            "card is not in the actor's hand",
        ));
    }
    let lead_suit = trick.lead_suit(trump);
    if !is_legal_play(card, hand, lead_suit, trump) {
        return Err(RulesReject::new(
            RejectCode::InvalidAction,
            "card does not follow the led suit",
        ));
    }

    let mut next = state.clone();
    let mut hands = next.hands.take().expect("hands present during play");
    hands[actor.index()].retain(|c| *c != card);
    next.hands = Some(hands);

    let mut trick = next.trick.take().expect("trick present during play");
    trick.plays.push((actor, card));

    let active_seats = if next.alone { 3 } else { 4 };
    if trick.plays.len() == active_seats {
        let winner = trick_winner(&trick, trump);
        next.tricks_won.add(winner.team());
        if next.tricks_won.total() == 5 {
            next.phase = GamePhase::Score;
            next.trick = None;
            next.turn = winner;
        } else {
            next.turn = winner;
            next.trick = Some(Trick::new(winner));
        }
    } else {
        let turn = next.next_active_seat(actor);
        trick.turn = turn;
        next.turn = turn;
        next.trick = Some(trick);
    }

    Ok(next)
}

fn apply_score_hand(state: &GameRecord) -> Result<GameRecord, RulesReject> {
    if state.phase != GamePhase::Score {
        return Err(RulesReject::new(
            RejectCode::InvalidState,
            "score_hand is only legal once all five tricks are played",
        ));
    }
    let maker = state
        .maker
        .expect("score phase always has a maker from bidding")
        .team();

    let outcome = score_hand(maker, state.alone, state.tricks_won);

    let mut next = state.clone();
    next.scores.add(outcome.team, outcome.points);

    if next.scores.get(outcome.team) >= next.target_score {
        next.phase = GamePhase::Completed;
        next.winner = Some(outcome.team);
        next.trick = None;
        next.hands = None;
    } else {
        next.phase = GamePhase::Deal;
        next.dealer = state.dealer.next();
        next.turn = next.dealer.next();
        next.trump = None;
        next.maker = None;
        next.alone = false;
        next.partner_sits_out = None;
        next.hands = None;
        next.upcard = None;
        next.kitty.clear();
        next.bidding = None;
        next.trick = None;
        next.tricks_won = Default::default();
    }
    Ok(next)
}

/// Resolves a forfeit: the opposing team is awarded enough points to reach `targetScore` and
/// the game becomes terminal immediately. Not a player-issued action — invoked by the lifecycle
/// sweeper once a disconnected seat exceeds its reconnect grace window.
pub fn forfeit(state: &GameRecord, forfeiting_team: Team) -> GameRecord {
    let winner = forfeiting_team.opponent();
    let mut next = state.clone();
    let current = next.scores.get(winner);
    if next.target_score > current {
        next.scores.add(winner, next.target_score - current);
    }
    next.phase = GamePhase::Completed;
    next.winner = Some(winner);
    next.trick = None;
    next.hands = None;
    next.bidding = None;
    next
}

fn next_should_sit_out(state: &GameRecord, seat: Seat) -> bool {
    state.alone && state.partner_sits_out == Some(seat)
}

fn lowest_value_index(hand: &[Card], trump: Suit) -> usize {
    hand.iter()
        .enumerate()
        .min_by_key(|(_, card)| rank_value(**card, trump))
        .map(|(idx, _)| idx)
        .expect("hand is non-empty after receiving the upcard")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::seat::Team;
    use crate::ids::{GameId, LobbyId};

    fn fresh_game() -> GameRecord {
        GameRecord::new(
            GameId::generate(),
            LobbyId::generate(),
            Seat::North,
            10,
            0,
        )
    }

    #[test]
    fn deal_hand_distributes_20_cards_and_sets_upcard() {
        let state = fresh_game();
        let deck = super::super::deck::full_deck();
        let dealt = deal_hand(&state, Some(deck.clone()), &mut rand::thread_rng()).unwrap();
        let hands = dealt.hands.unwrap();
        assert_eq!(hands.iter().map(Vec::len).sum::<usize>(), 20);
        assert_eq!(dealt.kitty.len(), 4);
        assert_eq!(dealt.upcard, Some(deck[20]));
        assert_eq!(dealt.phase, GamePhase::Round1Bidding);
    }

    #[test]
    fn four_passes_in_round1_moves_to_round2() {
        let state = fresh_game();
        let deck = super::super::deck::full_deck();
        let mut state = deal_hand(&state, Some(deck), &mut rand::thread_rng()).unwrap();
        for _ in 0..4 {
            let actor = state.bidding.as_ref().unwrap().turn;
            state = apply_bidding(&state, actor, &BiddingAction::Pass).unwrap();
        }
        assert_eq!(state.phase, GamePhase::Round2Bidding);
        assert_eq!(state.bidding.as_ref().unwrap().round, 2);
    }

    #[test]
    fn out_of_turn_bid_is_rejected() {
        let state = fresh_game();
        let deck = super::super::deck::full_deck();
        let state = deal_hand(&state, Some(deck), &mut rand::thread_rng()).unwrap();
        let not_turn = state.bidding.as_ref().unwrap().turn.next();
        let err = apply_bidding(&state, not_turn, &BiddingAction::Pass).unwrap_err();
        assert_eq!(err.code, RejectCode::NotYourTurn);
    }

    #[test]
    fn order_up_sets_trump_and_enters_play_with_dealer_discarding() {
        let state = fresh_game();
        let deck = super::super::deck::full_deck();
        let state = deal_hand(&state, Some(deck), &mut rand::thread_rng()).unwrap();
        let upcard = state.upcard.unwrap();
        let actor = state.bidding.as_ref().unwrap().turn;
        let played = apply_bidding(&state, actor, &BiddingAction::OrderUp { alone: false }).unwrap();
        assert_eq!(played.phase, GamePhase::Play);
        assert_eq!(played.trump, Some(upcard.suit));
        assert_eq!(played.maker, Some(actor));
        assert_eq!(played.hands.as_ref().unwrap()[state.dealer.index()].len(), 5);
    }

    #[test]
    fn play_card_rejects_illegal_follow() {
        let state = fresh_game();
        let deck = super::super::deck::full_deck();
        let mut state = deal_hand(&state, Some(deck), &mut rand::thread_rng()).unwrap();
        let actor = state.bidding.as_ref().unwrap().turn;
        state = apply_bidding(&state, actor, &BiddingAction::OrderUp { alone: false }).unwrap();

        let leader = state.turn;
        let hand = state.hands.as_ref().unwrap()[leader.index()].clone();
        let lead_card = hand[0];
        state = apply_play_card(&state, leader, lead_card).unwrap();

        let next_actor = state.turn;
        let next_hand = state.hands.as_ref().unwrap()[next_actor.index()].clone();
        let trump = state.trump.unwrap();
        let lead_suit = effective_suit(lead_card, trump);
        if let Some(off_suit_card) = next_hand
            .iter()
            .find(|c| effective_suit(**c, trump) != lead_suit)
            .copied()
        {
            let has_following = next_hand
                .iter()
                .any(|c| effective_suit(*c, trump) == lead_suit);
            if has_following {
                let err = apply_play_card(&state, next_actor, off_suit_card).unwrap_err();
                assert_eq!(err.code, RejectCode::InvalidAction);
            }
        }
    }

    #[test]
    fn scoring_transitions_to_completed_when_target_reached() {
        let mut state = fresh_game();
        state.target_score = 1;
        state.phase = GamePhase::Score;
        state.maker = Some(Seat::North);
        state.tricks_won = crate::domain::game::TricksWon {
            team_a: 5,
            team_b: 0,
        };
        let scored = apply_score_hand(&state).unwrap();
        assert_eq!(scored.phase, GamePhase::Completed);
        assert_eq!(scored.winner, Some(Team::TeamA));
    }

    #[test]
    fn forfeit_brings_opponent_to_target_score_and_ends_game() {
        let mut state = fresh_game();
        state.target_score = 10;
        state.scores.team_b = 7;
        let ended = forfeit(&state, Team::TeamA);
        assert_eq!(ended.phase, GamePhase::Completed);
        assert_eq!(ended.winner, Some(Team::TeamB));
        assert_eq!(ended.scores.team_b, 10);
        assert_eq!(ended.scores.team_a, 0);
    }
}
