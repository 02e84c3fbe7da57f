use std::fmt;

use serde::Serialize;

/// Number of players seated at every Love Letter game.
pub const SEAT_COUNT: usize = 4;

/// A player slot at the table, index 0 through 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Seat(u8);

impl Seat {
    pub const ALL: [Seat; SEAT_COUNT] = [Seat(0), Seat(1), Seat(2), Seat(3)];

    pub const fn from_index(index: usize) -> Option<Self> {
        if index < SEAT_COUNT {
            Some(Seat(index as u8))
        } else {
            None
        }
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
