//! Principal variation search: alpha-beta with minimal windows.
//!
//! The three-player adaptation treats both opponents as minimisers of the
//! agent's utility. The window is negated when the turn passes between the
//! agent and an opponent, but kept as-is between the two opponents, since
//! they share the same objective.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::catalogue::{catalogue, MoveId};
use crate::params::CombinedParams;
use crate::state::PackedState;
use crate::strategy::Strategy;
use crate::Utility;

/// Window infinity. Kept one step inside the integer limits so negating a
/// bound can never overflow.
const INFINITY: Utility = Utility::MAX;

pub struct PrincipalVariation {
    ply: usize,
    root_moves: Vec<MoveId>,
    scratch: Vec<PackedState>,
    rng: StdRng,
    last_utility: Utility,
}

impl PrincipalVariation {
    pub fn new(ply: usize) -> PrincipalVariation {
        PrincipalVariation::with_rng(ply, StdRng::from_entropy())
    }

    pub fn with_seed(ply: usize, seed: u64) -> PrincipalVariation {
        PrincipalVariation::with_rng(ply, StdRng::seed_from_u64(seed))
    }

    fn with_rng(ply: usize, rng: StdRng) -> PrincipalVariation {
        assert!(ply >= 1, "search needs at least one ply");
        PrincipalVariation {
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

impl Strategy for PrincipalVariation {
    fn decide_move(&mut self, state: &PackedState, params: &CombinedParams) -> Option<MoveId> {
        let agent = state.turn;
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

            let utility = if move_state.is_game_over() || rest.is_empty() {
                move_state.utility(agent as usize)
            } else {
                search(agent, move_state, rest, -INFINITY, INFINITY, params)
            };

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

/// Scores `state` within the window `(alpha, beta)` expressed in the
/// current turn colour's frame, returning the result in the agent's frame.
///
/// The first child is searched with the full window. Every later child is
/// probed with the null window `(alpha, alpha + 1)` and re-searched with
/// the full remaining window only when the probe lands strictly inside it.
fn search(
    agent: u8,
    state: &PackedState,
    scratch: &mut [PackedState],
    mut alpha: Utility,
    beta: Utility,
    params: &CombinedParams,
) -> Utility {
    let turn = state.turn;
    let next_turn = (turn + 1) % 3;
    let is_agent = turn == agent;
    // The utility sign in this node's frame, relative to the agent's.
    let mul: Utility = if is_agent { 1 } else { -1 };
    // Between the two opponents the frame does not flip.
    let keep_window = !is_agent && next_turn != agent;

    let [rest @ .., move_state] = scratch else {
        return mul * alpha;
    };

    let mut first_child = true;
    for (_, mv) in state.moves_rev() {
        move_state.copy_from(state);
        move_state.apply_move(mv, params);

        let utility = if move_state.is_game_over() || rest.is_empty() {
            mul * move_state.utility(agent as usize)
        } else if first_child {
            let (call_alpha, call_beta) = if keep_window {
                (alpha, beta)
            } else {
                (-beta, -alpha)
            };
            mul * search(agent, move_state, rest, call_alpha, call_beta, params)
        } else {
            let (call_alpha, call_beta) = if keep_window {
                (alpha, alpha + 1)
            } else {
                (-alpha - 1, -alpha)
            };
            let probe = mul * search(agent, move_state, rest, call_alpha, call_beta, params);
            if alpha < probe && probe < beta {
                let (call_alpha, call_beta) = if keep_window {
                    (probe, beta)
                } else {
                    (-beta, -probe)
                };
                mul * search(agent, move_state, rest, call_alpha, call_beta, params)
            } else {
                probe
            }
        };
        first_child = false;

        if utility > alpha {
            alpha = utility;
            if alpha >= beta {
                break;
            }
        }
    }

    mul * alpha
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::Minimax;
    use crate::Color::*;
    use crate::PieceType::*;
    use crate::Position;

    fn sparse_position() -> PackedState {
        let mut state = PackedState::new();
        state.place(Position::new(Blue, 0, 4).unwrap(), King, Blue);
        state.place(Position::new(Green, 0, 4).unwrap(), King, Green);
        state.place(Position::new(Red, 0, 4).unwrap(), King, Red);
        state.place(Position::new(Blue, 2, 1).unwrap(), Rook, Blue);
        state.place(Position::new(Blue, 2, 6).unwrap(), Knight, Green);
        state.place(Position::new(Green, 2, 2).unwrap(), Bishop, Red);
        state.place(Position::new(Green, 1, 6).unwrap(), Pawn, Blue);
        state
    }

    #[test]
    fn pvs_matches_minimax_value_at_every_depth() {
        let params = CombinedParams::default_tuned();
        let mut state = sparse_position();
        state.recompute_utilities(&params);

        for ply in 1..=4 {
            let mut pvs = PrincipalVariation::with_seed(ply, 1);
            let mut minimax = Minimax::with_seed(ply, 1);
            pvs.decide_move(&state, &params);
            minimax.decide_move(&state, &params);
            assert_eq!(
                pvs.last_utility(),
                minimax.last_utility(),
                "values diverge at ply {}",
                ply
            );
        }
    }

    #[test]
    fn pvs_matches_minimax_value_from_the_opening() {
        let params = CombinedParams::default_tuned();
        let mut state = PackedState::starting_position();
        state.recompute_utilities(&params);

        for ply in 1..=3 {
            let mut pvs = PrincipalVariation::with_seed(ply, 2);
            let mut minimax = Minimax::with_seed(ply, 2);
            pvs.decide_move(&state, &params);
            minimax.decide_move(&state, &params);
            assert_eq!(pvs.last_utility(), minimax.last_utility());
        }
    }
}
