//! Maximax models every colour as greedy for itself: each internal node
//! picks the move that maximises the turn colour's own utility, and the
//! utility vector of the resulting line is what propagates upward.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::catalogue::{catalogue, MoveId};
use crate::params::CombinedParams;
use crate::state::PackedState;
use crate::strategy::Strategy;
use crate::{Utility, NUM_COLORS};

pub struct Maximax {
    ply: usize,
    root_moves: Vec<MoveId>,
    scratch: Vec<PackedState>,
    rng: StdRng,
    last_utility: Utility,
}

impl Maximax {
    pub fn new(ply: usize) -> Maximax {
        Maximax::with_rng(ply, StdRng::from_entropy())
    }

    pub fn with_seed(ply: usize, seed: u64) -> Maximax {
        Maximax::with_rng(ply, StdRng::seed_from_u64(seed))
    }

    fn with_rng(ply: usize, rng: StdRng) -> Maximax {
        assert!(ply >= 1, "search needs at least one ply");
        Maximax {
            ply,
            root_moves: Vec::with_capacity(128),
            scratch: vec![PackedState::new(); ply],
            rng,
            last_utility: Utility::MIN,
        }
    }

    pub fn last_utility(&self) -> Utility {
        self.last_utility
    }
}

impl Strategy for Maximax {
    fn decide_move(&mut self, state: &PackedState, params: &CombinedParams) -> Option<MoveId> {
        let turn = state.turn;
        state.legal_moves_into(&mut self.root_moves);

        let mut best_utility = Utility::MIN;
        let mut best_move = None;

        for index in 0..self.root_moves.len() {
            let id = self.root_moves[index];
            let mv = catalogue().get(id);
            let (move_state, rest) = self
                .scratch
                .split_last_mut()
                .expect("ply is at least one");

            move_state.copy_from(state);
            move_state.apply_move(mv, params);

            let utilities = if move_state.is_game_over() {
                // Instant win for the root colour. Take it.
                self.last_utility = move_state.utility(turn as usize);
                return Some(id);
            } else if rest.is_empty() {
                move_state.utilities
            } else {
                match representative(move_state, rest, params) {
                    Some(utilities) => utilities,
                    None => continue,
                }
            };

            let utility = utilities[turn as usize];
            if utility > best_utility || (utility == best_utility && self.rng.gen_bool(0.5)) {
                best_utility = utility;
                best_move = Some(id);
            }
        }

        self.last_utility = best_utility;
        // If nothing scored, fall back to a random available move.
        best_move.or_else(|| self.root_moves.choose(&mut self.rng).copied())
    }

    fn ply(&self) -> usize {
        self.ply
    }
}

/// The utility vector of the line reached when every colour plays its own
/// best move from `state` for `scratch.len()` plies. A king capture
/// anywhere in the subtree returns that terminal line immediately. None
/// means no legal move existed.
fn representative(
    state: &PackedState,
    scratch: &mut [PackedState],
    params: &CombinedParams,
) -> Option<[Utility; NUM_COLORS]> {
    let turn = state.turn;
    let mut best_utility = Utility::MIN;
    let mut best: Option<[Utility; NUM_COLORS]> = None;

    let [rest @ .., move_state] = scratch else {
        return None;
    };

    for (_, mv) in state.moves_rev() {
        move_state.copy_from(state);
        move_state.apply_move(mv, params);

        let utilities = if move_state.is_game_over() {
            return Some(move_state.utilities);
        } else if rest.is_empty() {
            move_state.utilities
        } else {
            match representative(move_state, rest, params) {
                Some(utilities) => utilities,
                None => continue,
            }
        };

        if utilities[turn as usize] > best_utility {
            best_utility = utilities[turn as usize];
            best = Some(utilities);
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Color::*;
    use crate::PieceType::*;
    use crate::Position;

    fn three_kings() -> PackedState {
        let mut state = PackedState::new();
        state.place(Position::new(Blue, 0, 4).unwrap(), King, Blue);
        state.place(Position::new(Green, 0, 4).unwrap(), King, Green);
        state.place(Position::new(Red, 0, 4).unwrap(), King, Red);
        state
    }

    #[test]
    fn one_ply_maximax_takes_the_biggest_capture() {
        let params = CombinedParams::default_tuned();
        let mut state = three_kings();
        // A Blue rook that can take either a pawn or a queen.
        state.place(Position::new(Blue, 2, 3).unwrap(), Rook, Blue);
        state.place(Position::new(Blue, 2, 6).unwrap(), Queen, Red);
        state.place(Position::new(Blue, 1, 3).unwrap(), Pawn, Green);
        state.recompute_utilities(&params);

        let mut strategy = Maximax::with_seed(1, 11);
        let chosen = strategy.decide_move(&state, &params).unwrap();
        let mv = catalogue().get(chosen);
        assert_eq!(mv.to as usize, Position::new(Blue, 2, 6).unwrap().square());
    }

    #[test]
    fn instant_win_short_circuits_at_any_depth() {
        let params = CombinedParams::default_tuned();
        let mut state = three_kings();
        state.place(Position::new(Green, 2, 4).unwrap(), Rook, Blue);
        state.recompute_utilities(&params);

        let win_to = Position::new(Green, 0, 4).unwrap().square();
        for ply in 1..=4 {
            let mut strategy = Maximax::with_seed(ply, 3);
            let chosen = strategy.decide_move(&state, &params).unwrap();
            assert_eq!(catalogue().get(chosen).to as usize, win_to, "at ply {}", ply);
        }
    }

    #[test]
    fn deeper_maximax_still_wins_the_hanging_queen() {
        let params = CombinedParams::default_tuned();
        let mut state = three_kings();
        state.place(Position::new(Blue, 2, 3).unwrap(), Rook, Blue);
        state.place(Position::new(Blue, 2, 6).unwrap(), Queen, Red);
        state.recompute_utilities(&params);

        let queen_square = Position::new(Blue, 2, 6).unwrap().square();
        for ply in 2..=3 {
            let mut strategy = Maximax::with_seed(ply, 5);
            let chosen = strategy.decide_move(&state, &params).unwrap();
            assert_eq!(
                catalogue().get(chosen).to as usize,
                queen_square,
                "at ply {}",
                ply
            );
        }
    }
}
