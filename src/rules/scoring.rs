//! Hand scoring: makers take 1 point for 3-4 tricks, 2 for a march (not alone) or 4 for a lone
//! march; defenders take 2 for a euchre.

use crate::domain::game::TricksWon;
use crate::domain::seat::Team;

pub struct HandScore {
    pub team: Team,
    pub points: u32,
}

pub fn score_hand(maker: Team, alone: bool, tricks_won: TricksWon) -> HandScore {
    let maker_tricks = tricks_won.get(maker);
    if maker_tricks >= 3 {
        let points = if maker_tricks == 5 {
            if alone {
                4
            } else {
                2
            }
        } else {
            1
        };
        HandScore {
            team: maker,
            points,
        }
    } else {
        HandScore {
            team: maker.opponent(),
            points: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tricks(maker_tricks: u8) -> TricksWon {
        TricksWon {
            team_a: maker_tricks,
            team_b: 5 - maker_tricks,
        }
    }

    #[test]
    fn three_or_four_tricks_scores_one() {
        let score = score_hand(Team::TeamA, false, tricks(3));
        assert_eq!(score.team, Team::TeamA);
        assert_eq!(score.points, 1);
    }

    #[test]
    fn march_not_alone_scores_two() {
        let score = score_hand(Team::TeamA, false, tricks(5));
        assert_eq!(score.points, 2);
    }

    #[test]
    fn lone_march_scores_four() {
        let score = score_hand(Team::TeamA, true, tricks(5));
        assert_eq!(score.points, 4);
    }

    #[test]
    fn euchre_awards_defenders_two() {
        let score = score_hand(Team::TeamA, false, tricks(2));
        assert_eq!(score.team, Team::TeamB);
        assert_eq!(score.points, 2);
    }
}
