use serde::{Deserialize, Serialize};

/// A seat at the table. Seats form a fixed cyclic sequence north -> east -> south -> west.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seat {
    North,
    East,
    South,
    West,
}

/// Fixed pairing: {north, south} = team A, {east, west} = team B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    TeamA,
    TeamB,
}

impl Seat {
    pub const ALL: [Seat; 4] = [Seat::North, Seat::East, Seat::South, Seat::West];

    pub fn next(self) -> Seat {
        match self {
            Seat::North => Seat::East,
            Seat::East => Seat::South,
            Seat::South => Seat::West,
            Seat::West => Seat::North,
        }
    }

    pub fn partner(self) -> Seat {
        self.next().next()
    }

    pub fn team(self) -> Team {
        match self {
            Seat::North | Seat::South => Team::TeamA,
            Seat::East | Seat::West => Team::TeamB,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Seat::North => 0,
            Seat::East => 1,
            Seat::South => 2,
            Seat::West => 3,
        }
    }

    /// Seats in cyclic order starting just after `self`, e.g. for filling a lobby host-first.
    pub fn cycle_from(self) -> [Seat; 4] {
        let mut seats = [self; 4];
        let mut cur = self;
        for slot in seats.iter_mut() {
            *slot = cur;
            cur = cur.next();
        }
        seats
    }
}

impl Team {
    pub fn opponent(self) -> Team {
        match self {
            Team::TeamA => Team::TeamB,
            Team::TeamB => Team::TeamA,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_wraps_after_four() {
        assert_eq!(Seat::North.next().next().next().next(), Seat::North);
    }

    #[test]
    fn teams_are_fixed_pairs() {
        assert_eq!(Seat::North.team(), Seat::South.team());
        assert_eq!(Seat::East.team(), Seat::West.team());
        assert_ne!(Seat::North.team(), Seat::East.team());
    }

    #[test]
    fn partner_is_two_seats_away() {
        assert_eq!(Seat::North.partner(), Seat::South);
        assert_eq!(Seat::East.partner(), Seat::West);
    }
}
