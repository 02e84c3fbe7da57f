use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::seat::{SEAT_COUNT, Seat};

/// Draws the locally played seat uniformly from the four table positions.
pub struct SeatPicker {
    rng: StdRng,
}

impl SeatPicker {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    pub fn pick(&mut self) -> Seat {
        Seat::ALL[self.rng.gen_range(0..SEAT_COUNT)]
    }
}
