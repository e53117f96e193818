// Turn scheduler. Only the host's instance is authoritative; joiners keep
// the last `NEXT_TURN` value in their session instead of running one.
//
// Seats are the occupied player indices. `advance` moves to the next
// occupied index above the current one and wraps to the lowest, so with no
// departures the order is exactly 1, 2, ..., N, 1, ... and a vacated seat is
// skipped rather than cycled through.

use guess_who_protocol::PlayerIndex;

#[derive(Clone, Debug, Default)]
pub struct TurnScheduler {
    current: Option<PlayerIndex>,
}

impl TurnScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give the first turn to the lowest occupied seat.
    pub fn start(&mut self, seats: &[PlayerIndex]) -> Option<PlayerIndex> {
        self.current = seats.iter().copied().min();
        self.current
    }

    /// Move to the next occupied seat, wrapping. `None` if no seats remain.
    pub fn advance(&mut self, seats: &[PlayerIndex]) -> Option<PlayerIndex> {
        let next = match self.current {
            Some(current) => seats
                .iter()
                .copied()
                .filter(|s| *s > current)
                .min()
                .or_else(|| seats.iter().copied().min()),
            None => seats.iter().copied().min(),
        };
        self.current = next;
        next
    }

    /// Grant the turn to a specific seat out of rotation.
    pub fn hand_to(&mut self, seat: PlayerIndex) {
        self.current = Some(seat);
    }

    pub fn current(&self) -> Option<PlayerIndex> {
        self.current
    }
}
