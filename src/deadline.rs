//! Wall-clock budgeting for one turn of iterative deepening.
//!
//! The budget is nanosecond arithmetic only; the deepening loop polls it
//! between completed depths and never aborts a depth in flight.

/// Turns a game is expected to last when spreading the clock across turns.
pub const EXPECTED_GAME_TURNS: u64 = 20;
/// How many future turns must still fit in the remaining clock before a
/// turn is throttled below its even share.
pub const FUTURE_TURN_BUDGET: u64 = 12;

/// Tracks the game clock across turns and allocates a nanosecond budget
/// for each move decision.
#[derive(Clone, Copy, Debug)]
pub struct TurnBudget {
    /// The length of the current game in nanoseconds.
    game_length_nanos: u64,
    /// The number of nanoseconds to spend on average per turn.
    nanos_per_turn: u64,
}

impl TurnBudget {
    pub fn new() -> TurnBudget {
        let game_length_nanos = 60 * 1000 * 1_000_000;
        TurnBudget {
            game_length_nanos,
            nanos_per_turn: game_length_nanos / EXPECTED_GAME_TURNS,
        }
    }

    /// Records a fresh clock reading. The first reading of a game (or any
    /// reading above the assumed game length) resets the per-turn share.
    pub fn observe(&mut self, is_first_move: bool, time_left_nanos: u64) {
        if is_first_move || time_left_nanos > self.game_length_nanos {
            self.game_length_nanos = time_left_nanos;
            self.nanos_per_turn = self.game_length_nanos / EXPECTED_GAME_TURNS;
        }
    }

    /// The budget for this turn: the even per-turn share, throttled down
    /// when the remaining clock could no longer cover the budgeted number
    /// of future turns at that rate.
    pub fn target_nanos(&self, remaining_nanos: u64) -> u64 {
        let throttled = remaining_nanos / FUTURE_TURN_BUDGET;
        throttled.min(self.nanos_per_turn)
    }
}

impl Default for TurnBudget {
    fn default() -> Self {
        TurnBudget::new()
    }
}

/// Predicts how long the next depth will take from the durations of the
/// two most recently completed depths. The ratio between them estimates
/// the branching cost; when the last two completed depths were two plies
/// apart the ratio is damped by the 0.4 power, and the result is clamped
/// to at least 1 and padded by 4 as a safety margin.
pub fn predict_next_ply_nanos(
    ply: u64,
    ply_duration: u64,
    last_ply: u64,
    last_ply_duration: u64,
) -> u64 {
    let mut multiplier = if last_ply > 0 && last_ply_duration > 0 {
        (ply_duration + last_ply_duration - 1) / last_ply_duration
    } else {
        0
    };
    if ply - last_ply == 2 {
        multiplier = (multiplier as f64).powf(0.4).ceil() as u64;
    }
    multiplier = multiplier.max(1) + 4;
    multiplier * ply_duration
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_share_until_the_clock_runs_down() {
        let mut budget = TurnBudget::new();
        budget.observe(true, 60_000_000_000);
        assert_eq!(budget.target_nanos(60_000_000_000), 3_000_000_000);
        // With 12s left, the throttle kicks in: 12s / 12 = 1s < 3s.
        assert_eq!(budget.target_nanos(12_000_000_000), 1_000_000_000);
    }

    #[test]
    fn longer_clock_readings_stretch_the_game_length() {
        let mut budget = TurnBudget::new();
        budget.observe(true, 10_000_000_000);
        budget.observe(false, 90_000_000_000);
        assert_eq!(budget.target_nanos(90_000_000_000), 4_500_000_000);
    }

    #[test]
    fn prediction_is_padded_and_clamped() {
        // First completed depth: no history, multiplier max(1, 0) + 4 = 5.
        assert_eq!(predict_next_ply_nanos(2, 100, 0, 0), 500);
        // Ratio of 8 between consecutive depths.
        assert_eq!(predict_next_ply_nanos(3, 800, 2, 100), (8 + 4) * 800);
        // A two-ply gap dampens the ratio: ceil(8^0.4) = 3.
        assert_eq!(predict_next_ply_nanos(4, 800, 2, 100), (3 + 4) * 800);
    }
}
