//! Minimax with no frills: the root colour maximises its own utility and
//! both opponents are modelled as minimising it.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::catalogue::{catalogue, MoveId};
use crate::params::CombinedParams;
use crate::state::PackedState;
use crate::strategy::Strategy;
use crate::Utility;

pub struct Minimax {
    ply: usize,
    /// Root move list, reused across turns.
    root_moves: Vec<MoveId>,
    /// One state buffer per ply of depth.
    scratch: Vec<PackedState>,
    rng: StdRng,
    last_utility: Utility,
}

impl Minimax {
    pub fn new(ply: usize) -> Minimax {
        Minimax::with_rng(ply, StdRng::from_entropy())
    }

    /// A seeded instance reproduces its tie-breaks bit for bit.
    pub fn with_seed(ply: usize, seed: u64) -> Minimax {
        Minimax::with_rng(ply, StdRng::seed_from_u64(seed))
    }

    fn with_rng(ply: usize, rng: StdRng) -> Minimax {
        assert!(ply >= 1, "search needs at least one ply");
        Minimax {
            ply,
            root_moves: Vec::with_capacity(128),
            scratch: vec![PackedState::new(); ply],
            rng,
            last_utility: Utility::MIN,
        }
    }

    /// The root utility of the move chosen by the last decision.
    pub fn last_utility(&self) -> Utility {
        self.last_utility
    }
}

impl Strategy for Minimax {
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
                search(agent, move_state, rest, params)
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

/// Scores `state` for `agent`, maximising on the agent's turns and
/// minimising on both opponents' turns. `scratch` holds one buffer per
/// remaining ply.
fn search(
    agent: u8,
    state: &PackedState,
    scratch: &mut [PackedState],
    params: &CombinedParams,
) -> Utility {
    let maximise = state.turn == agent;
    let mut notable = if maximise { Utility::MIN } else { Utility::MAX };

    let [rest @ .., move_state] = scratch else {
        return notable;
    };

    for (_, mv) in state.moves_rev() {
        move_state.copy_from(state);
        move_state.apply_move(mv, params);

        let utility = if move_state.is_game_over() || rest.is_empty() {
            move_state.utility(agent as usize)
        } else {
            search(agent, move_state, rest, params)
        };

        if maximise {
            if utility > notable {
                notable = utility;
            }
        } else if utility < notable {
            notable = utility;
        }
    }

    notable
}
