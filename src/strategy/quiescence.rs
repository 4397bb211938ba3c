//! Maximax with a quiescence tail: leaves that sit on a capturing
//! exchange are deepened by a few extra plies in which only further
//! captures (or immediate replies to one) are explored. The tail only
//! replaces a leaf when it actually finds a capture worth making.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::catalogue::{catalogue, MoveId};
use crate::params::CombinedParams;
use crate::state::PackedState;
use crate::strategy::Strategy;
use crate::{Utility, NUM_COLORS};

pub struct Quiescence {
    ply: usize,
    quiescence_ply: usize,
    root_moves: Vec<MoveId>,
    /// `ply` buffers for the main search plus `quiescence_ply` for the tail.
    scratch: Vec<PackedState>,
    rng: StdRng,
    last_utility: Utility,
}

impl Quiescence {
    pub fn new(ply: usize) -> Quiescence {
        Quiescence::with_rng(ply, 1, StdRng::from_entropy())
    }

    pub fn with_tail(ply: usize, quiescence_ply: usize) -> Quiescence {
        Quiescence::with_rng(ply, quiescence_ply, StdRng::from_entropy())
    }

    pub fn with_seed(ply: usize, seed: u64) -> Quiescence {
        Quiescence::with_rng(ply, 1, StdRng::seed_from_u64(seed))
    }

    fn with_rng(ply: usize, quiescence_ply: usize, rng: StdRng) -> Quiescence {
        assert!(ply >= 1, "search needs at least one ply");
        Quiescence {
            ply,
            quiescence_ply,
            root_moves: Vec::with_capacity(128),
            scratch: vec![PackedState::new(); ply + quiescence_ply],
            rng,
            last_utility: Utility::MIN,
        }
    }

    pub fn last_utility(&self) -> Utility {
        self.last_utility
    }
}

impl Strategy for Quiescence {
    fn decide_move(&mut self, state: &PackedState, params: &CombinedParams) -> Option<MoveId> {
        let turn = state.turn;
        let depth = self.ply;
        state.legal_moves_into(&mut self.root_moves);

        let mut best_utility = Utility::MIN;
        let mut best_move = None;

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
                let search = Search {
                    quiescence_ply: self.quiescence_ply,
                };
                match search.representative(move_state, rest, depth - 1, false, is_capture, params)
                {
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
        best_move
    }

    fn ply(&self) -> usize {
        self.ply
    }
}

struct Search {
    quiescence_ply: usize,
}

impl Search {
    /// Maximax recursion with the quiescence extension hanging off its
    /// leaves. While `in_quiescence`, non-capturing moves that do not
    /// follow a capture are not explored further, equal utilities prefer
    /// the capturing move, and a quiet node falls back to the state it was
    /// entered from.
    ///
    /// `scratch` carries `depth` buffers for the remaining plies plus, out
    /// of quiescence, another `quiescence_ply` for the tail.
    fn representative(
        &self,
        state: &PackedState,
        scratch: &mut [PackedState],
        depth: usize,
        in_quiescence: bool,
        last_move_captured: bool,
        params: &CombinedParams,
    ) -> Option<[Utility; NUM_COLORS]> {
        let turn = state.turn;
        let mut best_utility = Utility::MIN;
        let mut best: Option<[Utility; NUM_COLORS]> = None;
        let mut best_is_capture = false;

        let [rest @ .., move_state] = scratch else {
            return None;
        };

        for (_, mv) in state.moves_rev() {
            let is_capture = state.pieces[mv.to as usize] != 0;
            move_state.copy_from(state);
            move_state.apply_move(mv, params);

            let utilities = if move_state.is_game_over() {
                return Some(move_state.utilities);
            } else if in_quiescence && !is_capture && !last_move_captured {
                move_state.utilities
            } else if depth == 1 {
                if self.quiescence_ply == 0
                    || in_quiescence
                    || (!is_capture && !last_move_captured)
                {
                    move_state.utilities
                } else {
                    // The leaf sits on an exchange: deepen selectively.
                    match self.representative(
                        move_state,
                        rest,
                        self.quiescence_ply,
                        true,
                        is_capture,
                        params,
                    ) {
                        Some(utilities) => utilities,
                        None => continue,
                    }
                }
            } else {
                match self.representative(
                    move_state,
                    rest,
                    depth - 1,
                    in_quiescence,
                    is_capture,
                    params,
                ) {
                    Some(utilities) => utilities,
                    None => continue,
                }
            };

            let utility = utilities[turn as usize];
            if utility > best_utility || (utility == best_utility && is_capture) {
                best_utility = utility;
                best = Some(utilities);
                best_is_capture = is_capture;
            }
        }

        if (!in_quiescence && best.is_some()) || best_is_capture {
            return best;
        }
        // A quiet quiescence node keeps the state it was entered from.
        if in_quiescence {
            Some(state.utilities)
        } else {
            None
        }
    }
}
