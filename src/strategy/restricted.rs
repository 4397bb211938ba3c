//! Quiescence with a recency filter. The tail only explores captures that
//! became available recently: a capture that already existed three plies
//! ago is something the opponents have had every chance to see, so it is
//! no surprise worth deepening on. Three windows of capturing-move sets
//! are threaded through the recursion to track that.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::catalogue::{catalogue, MoveId};
use crate::params::CombinedParams;
use crate::state::{MoveSet, PackedState};
use crate::strategy::Strategy;
use crate::{Utility, NUM_COLORS};

/// The capturing moves available one, two and three plies above the
/// current node.
type Windows<'w> = (&'w MoveSet, &'w MoveSet, &'w MoveSet);

pub struct RestrictedQuiescence {
    ply: usize,
    quiescence_ply: usize,
    root_moves: Vec<MoveId>,
    scratch: Vec<PackedState>,
    quiescence_scratch: Vec<PackedState>,
    /// Capturing-move sets per main-search depth, plus two empty ones the
    /// root seeds its windows with.
    sets: Vec<MoveSet>,
    quiescence_sets: Vec<MoveSet>,
    rng: StdRng,
    last_utility: Utility,
}

impl RestrictedQuiescence {
    pub fn new(ply: usize) -> RestrictedQuiescence {
        RestrictedQuiescence::with_rng(ply, 1, StdRng::from_entropy())
    }

    pub fn with_tail(ply: usize, quiescence_ply: usize) -> RestrictedQuiescence {
        RestrictedQuiescence::with_rng(ply, quiescence_ply, StdRng::from_entropy())
    }

    pub fn with_seed(ply: usize, seed: u64) -> RestrictedQuiescence {
        RestrictedQuiescence::with_rng(ply, 1, StdRng::seed_from_u64(seed))
    }

    fn with_rng(ply: usize, quiescence_ply: usize, rng: StdRng) -> RestrictedQuiescence {
        assert!(ply >= 1, "search needs at least one ply");
        RestrictedQuiescence {
            ply,
            quiescence_ply,
            root_moves: Vec::with_capacity(128),
            scratch: vec![PackedState::new(); ply],
            quiescence_scratch: vec![PackedState::new(); quiescence_ply],
            sets: vec![MoveSet::new(); ply + 2],
            quiescence_sets: vec![MoveSet::new(); quiescence_ply],
            rng,
            last_utility: Utility::MIN,
        }
    }

    pub fn last_utility(&self) -> Utility {
        self.last_utility
    }
}

impl Strategy for RestrictedQuiescence {
    fn decide_move(&mut self, state: &PackedState, params: &CombinedParams) -> Option<MoveId> {
        let turn = state.turn;
        let depth = self.ply;
        state.legal_moves_into(&mut self.root_moves);

        // Seed the windows: the root's own captures one ply up, nothing
        // above that.
        let (lower, upper) = self.sets.split_at_mut(depth);
        let (current, lower_rest) = lower.split_last_mut().expect("ply is at least one");
        state.capturing_moves_into(current);
        upper[0].clear();
        upper[1].clear();

        let mut best_utility = Utility::MIN;
        let mut best_move = None;

        let search = Search {
            quiescence_ply: self.quiescence_ply,
        };

        for index in 0..self.root_moves.len() {
            let id = self.root_moves[index];
            let mv = catalogue().get(id);
            let is_capture = state.pieces[mv.to as usize] != 0;
            let (move_state, rest) = self
                .scratch
                .split_last_mut()
                .expect("ply is at least one");

            move_state.copy_from(state);
            move_state.apply_move(mv, params);

            let utilities = if move_state.is_game_over() {
                self.last_utility = move_state.utility(turn as usize);
                return Some(id);
            } else if depth == 1 {
                move_state.utilities
            } else {
                match search.representative(
                    move_state,
                    rest,
                    &mut self.quiescence_scratch,
                    lower_rest,
                    &mut self.quiescence_sets,
                    (&*current, &upper[0], &upper[1]),
                    is_capture,
                    params,
                ) {
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
        best_move.or_else(|| self.root_moves.choose(&mut self.rng).copied())
    }

    fn ply(&self) -> usize {
        self.ply
    }
}

struct Search {
    quiescence_ply: usize,
}

impl Search {
    /// Maximax over the remaining `scratch.len()` plies. Each level
    /// computes its own capturing moves and shifts them into the windows
    /// for the level below.
    #[allow(clippy::too_many_arguments)]
    fn representative(
        &self,
        state: &PackedState,
        scratch: &mut [PackedState],
        quiescence_scratch: &mut [PackedState],
        sets: &mut [MoveSet],
        quiescence_sets: &mut [MoveSet],
        windows: Windows<'_>,
        last_move_captured: bool,
        params: &CombinedParams,
    ) -> Option<[Utility; NUM_COLORS]> {
        let (one_up, two_up, three_up) = windows;
        let turn = state.turn;
        let mut best_utility = Utility::MIN;
        let mut best: Option<[Utility; NUM_COLORS]> = None;

        let [rest @ .., move_state] = scratch else {
            return None;
        };
        let (current, sets_rest) = match sets.split_last_mut() {
            Some(split) => split,
            None => return None,
        };
        state.capturing_moves_into(current);

        for (id, mv) in state.moves_rev() {
            let is_capture = state.pieces[mv.to as usize] != 0;
            move_state.copy_from(state);
            move_state.apply_move(mv, params);

            let utilities = if move_state.is_game_over() {
                return Some(move_state.utilities);
            } else if rest.is_empty() {
                // At a leaf: deepen only on a fresh exchange. A capture the
                // opponents could already see three plies ago is excluded.
                if self.quiescence_ply == 0
                    || (!is_capture && !last_move_captured)
                    || three_up.contains(id)
                {
                    move_state.utilities
                } else {
                    self.quiescence(
                        move_state,
                        quiescence_scratch,
                        quiescence_sets,
                        (&*current, one_up, two_up),
                        is_capture,
                        params,
                    )
                }
            } else {
                match self.representative(
                    move_state,
                    rest,
                    quiescence_scratch,
                    sets_rest,
                    quiescence_sets,
                    (&*current, one_up, two_up),
                    is_capture,
                    params,
                ) {
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

    /// The selective tail. Only recent captures (or immediate replies to
    /// one) are expanded; a quiet node keeps the state it was entered
    /// from.
    fn quiescence(
        &self,
        state: &PackedState,
        scratch: &mut [PackedState],
        sets: &mut [MoveSet],
        windows: Windows<'_>,
        last_move_captured: bool,
        params: &CombinedParams,
    ) -> [Utility; NUM_COLORS] {
        let (one_up, two_up, three_up) = windows;
        let turn = state.turn;
        let mut best_utility = Utility::MIN;
        let mut best = [0; NUM_COLORS];
        let mut best_is_capture = false;

        let [rest @ .., move_state] = scratch else {
            return state.utilities;
        };
        let Some((current, sets_rest)) = sets.split_last_mut() else {
            return state.utilities;
        };
        state.capturing_moves_into(current);

        for (id, mv) in state.moves_rev() {
            let is_capture = state.pieces[mv.to as usize] != 0;
            move_state.copy_from(state);
            move_state.apply_move(mv, params);

            let utilities = if move_state.is_game_over() {
                return move_state.utilities;
            } else if rest.is_empty()
                || (!is_capture && !last_move_captured)
                || three_up.contains(id)
            {
                move_state.utilities
            } else {
                self.quiescence(
                    move_state,
                    rest,
                    sets_rest,
                    (&*current, one_up, two_up),
                    is_capture,
                    params,
                )
            };

            let utility = utilities[turn as usize];
            if utility > best_utility || (utility == best_utility && is_capture) {
                best_utility = utility;
                best = utilities;
                best_is_capture = is_capture;
            }
        }

        if best_is_capture {
            best
        } else {
            state.utilities
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Color::*;
    use crate::PieceType::*;
    use crate::Position;

    fn exchange_position() -> PackedState {
        let mut state = PackedState::new();
        state.place(Position::new(Blue, 0, 4).unwrap(), King, Blue);
        state.place(Position::new(Green, 0, 4).unwrap(), King, Green);
        state.place(Position::new(Red, 0, 4).unwrap(), King, Red);
        state.place(Position::new(Blue, 1, 0).unwrap(), Rook, Green);
        state.place(Position::new(Blue, 3, 0).unwrap(), Queen, Blue);
        state.place(Position::new(Blue, 3, 4).unwrap(), Rook, Red);
        state.turn = Green.to_index() as u8;
        state
    }

    #[test]
    fn a_stale_capture_is_not_deepened() {
        let params = CombinedParams::default_tuned();
        let mut state = exchange_position();
        state.recompute_utilities(&params);

        // Plant Green's own capture in the three-plies-up window, marking
        // it as an exchange the opponents have already seen.
        let mut stale = MoveSet::new();
        state.capturing_moves_into(&mut stale);

        let empty = MoveSet::new();
        let search = Search { quiescence_ply: 1 };

        let mut scratch = vec![PackedState::new(); 1];
        let mut q_scratch = vec![PackedState::new(); 1];
        let mut sets = vec![MoveSet::new(); 1];
        let mut q_sets = vec![MoveSet::new(); 1];

        let fresh = search
            .representative(
                &state,
                &mut scratch,
                &mut q_scratch,
                &mut sets,
                &mut q_sets,
                (&empty, &empty, &empty),
                false,
                &params,
            )
            .unwrap();

        let filtered = search
            .representative(
                &state,
                &mut scratch,
                &mut q_scratch,
                &mut sets,
                &mut q_sets,
                (&empty, &empty, &stale),
                false,
                &params,
            )
            .unwrap();

        // With empty windows the tail sees Red's recapture and devalues
        // the queen grab; marking that recapture as already known three
        // plies ago suppresses the tail.
        assert!(fresh[Green.to_index()] < filtered[Green.to_index()]);
    }

    #[test]
    fn falls_back_to_maximax_shape_at_the_root() {
        let params = CombinedParams::default_tuned();
        let mut state = exchange_position();
        state.recompute_utilities(&params);

        let mut strategy = RestrictedQuiescence::with_seed(2, 13);
        let chosen = strategy.decide_move(&state, &params).unwrap();
        let mv = catalogue().get(chosen);
        // Whatever was chosen, it must be one of Green's legal moves.
        let mut legal = Vec::new();
        state.legal_moves_into(&mut legal);
        assert!(legal.contains(&chosen));
        assert_eq!(state.piece_at(mv.from as usize).unwrap().1, Green);
    }
}
