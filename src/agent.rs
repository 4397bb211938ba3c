//! The playing agents: the time-budgeted iterative-deepening agent built
//! on the search strategies, the fixed-depth agent the tuning loop
//! evolves, and the greedy and random baselines.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::board::{Board, BoardView};
use crate::catalogue::{catalogue, MoveId};
use crate::deadline::{predict_next_ply_nanos, TurnBudget};
use crate::error::EngineError;
use crate::params::CombinedParams;
use crate::state::PackedState;
use crate::strategy::{
    Maximax, Minimax, PrincipalVariation, Quiescence, RestrictedQuiescence, Strategy,
};
use crate::{Position, TOTAL_SQUARES};

/// An autonomous player: takes a board snapshot, returns the endpoints of
/// the move it wants to make.
pub trait Agent: Send {
    fn play_move(&mut self, board: &Board) -> Result<(Position, Position), EngineError>;

    fn name(&self) -> &str;

    /// A fresh agent with the same configuration, for running independent
    /// games in parallel.
    fn clone_agent(&self) -> Box<dyn Agent>;
}

/// Which search strategy a deepening agent runs at each depth.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrategyKind {
    Maximax,
    Minimax,
    Quiescence,
    RestrictedQuiescence,
    PrincipalVariation,
}

impl StrategyKind {
    fn build(self, ply: usize) -> Box<dyn Strategy + Send> {
        match self {
            StrategyKind::Maximax => Box::new(Maximax::new(ply)),
            StrategyKind::Minimax => Box::new(Minimax::new(ply)),
            StrategyKind::Quiescence => Box::new(Quiescence::new(ply)),
            StrategyKind::RestrictedQuiescence => Box::new(RestrictedQuiescence::new(ply)),
            StrategyKind::PrincipalVariation => Box::new(PrincipalVariation::new(ply)),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StrategyKind::Maximax => "Maximax",
            StrategyKind::Minimax => "Minimax",
            StrategyKind::Quiescence => "Quiescence",
            StrategyKind::RestrictedQuiescence => "RQ",
            StrategyKind::PrincipalVariation => "PVS",
        }
    }
}

/// The first depth the deepening loop tries.
const INITIAL_PLY: usize = 2;
/// The depth after which deepening always stops.
const MAX_PLY: usize = 12;

/// Decides each move by running its strategy at depth 2, 3, 4, ... until
/// the predicted cost of the next depth exceeds the turn's time budget.
/// Whatever the deepest completed depth chose is played.
pub struct DeepeningAgent {
    name: String,
    kind: StrategyKind,
    /// Seconds to play to when the board reports no clock at all.
    artificial_time_limit_secs: u64,
    params: CombinedParams,
    budget: TurnBudget,
    initial: PackedState,
    move_state: PackedState,
    available: Vec<MoveId>,
    /// One strategy instance per depth, each with its own scratch fleet.
    strategies: Vec<Box<dyn Strategy + Send>>,
    rng: StdRng,
    /// Summed achieved depth, for mean-ply reporting.
    ply_sum: u64,
    decision_count: u64,
}

impl DeepeningAgent {
    pub fn new(kind: StrategyKind, params: CombinedParams) -> DeepeningAgent {
        DeepeningAgent::with_time_limit(kind, params, 20)
    }

    pub fn with_time_limit(
        kind: StrategyKind,
        params: CombinedParams,
        artificial_time_limit_secs: u64,
    ) -> DeepeningAgent {
        let strategies = (1..=MAX_PLY).map(|ply| kind.build(ply)).collect();
        DeepeningAgent {
            name: format!("Deepening-{}", kind.label()),
            kind,
            artificial_time_limit_secs,
            params,
            budget: TurnBudget::new(),
            initial: PackedState::new(),
            move_state: PackedState::new(),
            available: Vec::with_capacity(128),
            strategies,
            rng: StdRng::from_entropy(),
            ply_sum: 0,
            decision_count: 0,
        }
    }

    pub fn maximax() -> DeepeningAgent {
        DeepeningAgent::new(StrategyKind::Maximax, CombinedParams::default_tuned())
    }

    pub fn minimax() -> DeepeningAgent {
        DeepeningAgent::new(StrategyKind::Minimax, CombinedParams::default_tuned())
    }

    pub fn quiescence() -> DeepeningAgent {
        DeepeningAgent::new(StrategyKind::Quiescence, CombinedParams::default_tuned())
    }

    pub fn restricted_quiescence() -> DeepeningAgent {
        DeepeningAgent::new(
            StrategyKind::RestrictedQuiescence,
            CombinedParams::default_tuned(),
        )
    }

    pub fn principal_variation() -> DeepeningAgent {
        DeepeningAgent::new(
            StrategyKind::PrincipalVariation,
            CombinedParams::default_tuned(),
        )
    }

    /// Mean depth reached per decision so far.
    pub fn mean_ply(&self) -> f64 {
        if self.decision_count == 0 {
            0.0
        } else {
            self.ply_sum as f64 / self.decision_count as f64
        }
    }

    fn move_endpoints(id: MoveId) -> (Position, Position) {
        let mv = catalogue().get(id);
        (
            Position::from_square(mv.from as usize),
            Position::from_square(mv.to as usize),
        )
    }

    /// Defensive fallback when no legal move is known: any catalogued move
    /// of one of our pieces, rather than no move at all.
    fn random_catalogued_move(&mut self) -> Result<MoveId, EngineError> {
        let turn = self.initial.turn;
        let mut candidates = Vec::new();
        for square in 0..TOTAL_SQUARES {
            let byte = self.initial.pieces[square];
            if byte == 0 || byte & 3 != turn {
                continue;
            }
            let type_index = ((byte >> 2) & 7) as usize;
            let (offset, list) = catalogue().list(turn as usize, square, type_index);
            candidates.extend((0..list.len()).map(|index| offset + index as MoveId));
        }
        candidates
            .choose(&mut self.rng)
            .copied()
            .ok_or(EngineError::GameOver)
    }

    fn deepen(&mut self, target_nanos: u64) -> Option<MoveId> {
        let mut result = None;
        let mut ply = INITIAL_PLY;
        let mut last_ply = 0u64;
        let mut last_ply_duration = 0u64;
        let start = Instant::now();

        loop {
            let ply_start = Instant::now();
            if let Some(id) = self.strategies[ply - 1].decide_move(&self.initial, &self.params) {
                result = Some(id);
            }
            let ply_duration = ply_start.elapsed().as_nanos() as u64;
            let elapsed = start.elapsed().as_nanos() as u64;
            let remaining = target_nanos.saturating_sub(elapsed);

            let predicted =
                predict_next_ply_nanos(ply as u64, ply_duration, last_ply, last_ply_duration);
            last_ply = ply as u64;
            last_ply_duration = ply_duration;

            if predicted >= remaining {
                break;
            }
            ply += 1;
            if ply >= MAX_PLY {
                break;
            }
        }

        self.ply_sum += ply as u64;
        self.decision_count += 1;
        result
    }
}

impl Agent for DeepeningAgent {
    fn play_move(&mut self, board: &Board) -> Result<(Position, Position), EngineError> {
        let is_first_move = board.move_count() < 3;
        let mut time_left_nanos = board.time_left_millis(board.turn()) * 1_000_000;

        // Asked to move with no time on the clock: the game is untimed.
        if time_left_nanos == 0 {
            time_left_nanos = self.artificial_time_limit_secs * 1_000_000_000;
        }
        self.budget.observe(is_first_move, time_left_nanos);

        self.initial.load(board);
        self.params.update_interpolation(&self.initial)?;
        self.initial.recompute_utilities(&self.params);
        self.initial.legal_moves_into(&mut self.available);

        // Any immediately winning move short-circuits the search.
        for index in 0..self.available.len() {
            let id = self.available[index];
            self.move_state.copy_from(&self.initial);
            self.move_state.apply_move(catalogue().get(id), &self.params);
            if self.move_state.is_game_over() {
                return Ok(Self::move_endpoints(id));
            }
        }

        if self.available.is_empty() {
            let fallback = self.random_catalogued_move()?;
            return Ok(Self::move_endpoints(fallback));
        }

        let target_nanos = self.budget.target_nanos(time_left_nanos);
        let chosen = match self.deepen(target_nanos) {
            Some(id) => id,
            None => *self
                .available
                .choose(&mut self.rng)
                .expect("available is non-empty"),
        };
        Ok(Self::move_endpoints(chosen))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn clone_agent(&self) -> Box<dyn Agent> {
        Box::new(DeepeningAgent::with_time_limit(
            self.kind,
            self.params.clone(),
            self.artificial_time_limit_secs,
        ))
    }
}

/// A fixed-depth maximax agent with its own parameter pair. This is the
/// individual the offline tuning loop evolves.
pub struct FixedPlyAgent {
    name: String,
    ply: usize,
    params: CombinedParams,
    initial: PackedState,
    strategy: Maximax,
    /// How many tuning cycles in a row this individual has survived.
    pub consecutive_keeps: u32,
}

impl FixedPlyAgent {
    pub fn new(name: impl Into<String>, ply: usize, params: CombinedParams) -> FixedPlyAgent {
        FixedPlyAgent {
            name: name.into(),
            ply,
            params,
            initial: PackedState::new(),
            strategy: Maximax::new(ply),
            consecutive_keeps: 0,
        }
    }

    /// One-ply maximax is exactly a greedy utility argmax.
    pub fn greedy() -> FixedPlyAgent {
        FixedPlyAgent::new("Greedy-Utility", 1, CombinedParams::default_tuned())
    }

    pub fn of_ply(ply: usize) -> FixedPlyAgent {
        FixedPlyAgent::new(
            format!("{}-Ply-Maximax", ply),
            ply,
            CombinedParams::default_tuned(),
        )
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn params(&self) -> &CombinedParams {
        &self.params
    }
}

impl Agent for FixedPlyAgent {
    fn play_move(&mut self, board: &Board) -> Result<(Position, Position), EngineError> {
        self.initial.load(board);
        self.params.update_interpolation(&self.initial)?;
        self.initial.recompute_utilities(&self.params);

        let chosen = self
            .strategy
            .decide_move(&self.initial, &self.params)
            .ok_or(EngineError::GameOver)?;
        Ok(DeepeningAgent::move_endpoints(chosen))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn clone_agent(&self) -> Box<dyn Agent> {
        Box::new(FixedPlyAgent::new(
            self.name.clone(),
            self.ply,
            self.params.clone(),
        ))
    }
}

/// Takes the highest-valued capture available, or a random quiet move.
pub struct GreedyAgent {
    rng: StdRng,
}

impl GreedyAgent {
    pub fn new() -> GreedyAgent {
        GreedyAgent {
            rng: StdRng::from_entropy(),
        }
    }
}

impl Default for GreedyAgent {
    fn default() -> Self {
        GreedyAgent::new()
    }
}

impl Agent for GreedyAgent {
    fn play_move(&mut self, board: &Board) -> Result<(Position, Position), EngineError> {
        let mut best_take_value = 0u32;
        let mut best_moves: Vec<(Position, Position)> = Vec::new();

        for (from, to) in board.legal_moves() {
            match board.piece_at(to) {
                Some((piece_type, _)) => {
                    let take_value = piece_type.value();
                    if take_value > best_take_value {
                        best_moves.clear();
                    }
                    if take_value >= best_take_value {
                        best_take_value = take_value;
                        best_moves.push((from, to));
                    }
                }
                None => {
                    if best_take_value == 0 {
                        best_moves.push((from, to));
                    }
                }
            }
        }

        best_moves
            .choose(&mut self.rng)
            .copied()
            .ok_or(EngineError::GameOver)
    }

    fn name(&self) -> &str {
        "Greedy"
    }

    fn clone_agent(&self) -> Box<dyn Agent> {
        Box::new(GreedyAgent::new())
    }
}

/// Plays uniformly random legal moves.
pub struct RandomAgent {
    rng: StdRng,
}

impl RandomAgent {
    pub fn new() -> RandomAgent {
        RandomAgent {
            rng: StdRng::from_entropy(),
        }
    }
}

impl Default for RandomAgent {
    fn default() -> Self {
        RandomAgent::new()
    }
}

impl Agent for RandomAgent {
    fn play_move(&mut self, board: &Board) -> Result<(Position, Position), EngineError> {
        board
            .legal_moves()
            .choose(&mut self.rng)
            .copied()
            .ok_or(EngineError::GameOver)
    }

    fn name(&self) -> &str {
        "Random"
    }

    fn clone_agent(&self) -> Box<dyn Agent> {
        Box::new(RandomAgent::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Color::*;
    use crate::PieceType::*;

    #[test]
    fn deepening_agent_short_circuits_an_instant_win() {
        let mut board = Board::initial(0);
        for position in Position::all() {
            board.set_piece(position, None);
        }
        board.set_piece(Position::new(Blue, 0, 4).unwrap(), Some((King, Blue)));
        board.set_piece(Position::new(Green, 0, 4).unwrap(), Some((King, Green)));
        board.set_piece(Position::new(Red, 0, 4).unwrap(), Some((King, Red)));
        board.set_piece(Position::new(Green, 2, 4).unwrap(), Some((Rook, Blue)));

        let mut agent = DeepeningAgent::maximax();
        let (from, to) = agent.play_move(&board).unwrap();
        assert_eq!(from, Position::new(Green, 2, 4).unwrap());
        assert_eq!(to, Position::new(Green, 0, 4).unwrap());
        // The win was found before any deepening started.
        assert_eq!(agent.mean_ply(), 0.0);
    }

    #[test]
    fn greedy_takes_the_most_valuable_piece() {
        let mut board = Board::initial(0);
        for position in Position::all() {
            board.set_piece(position, None);
        }
        board.set_piece(Position::new(Blue, 0, 4).unwrap(), Some((King, Blue)));
        board.set_piece(Position::new(Green, 0, 4).unwrap(), Some((King, Green)));
        board.set_piece(Position::new(Red, 0, 4).unwrap(), Some((King, Red)));
        board.set_piece(Position::new(Blue, 2, 3).unwrap(), Some((Rook, Blue)));
        board.set_piece(Position::new(Blue, 2, 6).unwrap(), Some((Queen, Green)));
        board.set_piece(Position::new(Blue, 1, 3).unwrap(), Some((Pawn, Red)));

        let mut agent = GreedyAgent::new();
        let (_, to) = agent.play_move(&board).unwrap();
        assert_eq!(to, Position::new(Blue, 2, 6).unwrap());
    }

    #[test]
    fn random_agent_plays_a_legal_move() {
        let board = Board::initial(0);
        let mut agent = RandomAgent::new();
        let (from, to) = agent.play_move(&board).unwrap();
        assert!(board.is_legal_move(from, to));
    }
}
