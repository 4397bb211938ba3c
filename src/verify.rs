//! Cross-checks the packed state against the reference board: move
//! generation must admit exactly the same (from, to) pairs, and the
//! incrementally maintained utilities must equal a full recomputation.
//! Driven from the test suite; panics describe the first divergence found.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::board::{Board, BoardView};
use crate::catalogue::catalogue;
use crate::params::CombinedParams;
use crate::state::PackedState;
use crate::Position;

/// Piece bytes, turn and game-over word must all agree.
pub fn assert_states_match(board: &Board, state: &PackedState) {
    assert_eq!(
        board.turn().to_index(),
        state.turn as usize,
        "turn colours diverge"
    );
    assert_eq!(
        board.game_over(),
        state.winner_loser(),
        "game-over words diverge"
    );
    for position in Position::all() {
        assert_eq!(
            board.piece_at(position),
            state.piece_at(position.square()),
            "piece mismatch at {}",
            position
        );
    }
}

/// The packed kernel and the board's naive walk must admit exactly the
/// same set of moves.
pub fn assert_movegen_matches(board: &Board, state: &PackedState) {
    let mut from_board: Vec<(usize, usize)> = board
        .legal_moves()
        .into_iter()
        .map(|(from, to)| (from.square(), to.square()))
        .collect();
    from_board.sort_unstable();

    let mut ids = Vec::new();
    state.legal_moves_into(&mut ids);
    let mut from_state: Vec<(usize, usize)> = ids
        .iter()
        .map(|&id| {
            let mv = catalogue().get(id);
            (mv.from as usize, mv.to as usize)
        })
        .collect();
    from_state.sort_unstable();
    from_state.dedup();

    assert_eq!(
        from_board, from_state,
        "legal move sets diverge for {:?} to move",
        board.turn()
    );
}

/// The stored utility vector must equal a recomputation from scratch.
pub fn assert_incremental_utilities(state: &PackedState, params: &CombinedParams) {
    let mut fresh = *state;
    fresh.recompute_utilities(params);
    assert_eq!(
        state.utilities, fresh.utilities,
        "incremental utilities drifted from a full recompute"
    );
}

/// packed -> board -> packed must reproduce the state byte for byte.
pub fn assert_round_trip(state: &PackedState) {
    let board = Board::from_packed(state);
    let mut reloaded = PackedState::new();
    reloaded.load(&board);
    assert_eq!(reloaded.pieces, state.pieces, "piece bytes changed");
    assert_eq!(reloaded.turn, state.turn, "turn changed");
    assert_eq!(reloaded.game_over, state.game_over, "game-over word changed");
}

/// Plays random legal moves on both representations in lock step,
/// checking every invariant after every move. Returns the number of moves
/// played before the game ended or the cap was hit.
pub fn verified_random_playout(seed: u64, max_moves: usize) -> usize {
    let params = CombinedParams::default_tuned();
    let mut rng = StdRng::seed_from_u64(seed);

    let mut board = Board::initial(0);
    let mut state = PackedState::new();
    state.load(&board);
    state.recompute_utilities(&params);

    let mut ids = Vec::new();
    for played in 0..max_moves {
        assert_states_match(&board, &state);
        assert_incremental_utilities(&state, &params);
        assert_round_trip(&state);

        // Move generation is only comparable while the game runs: a
        // finished board admits nothing.
        if state.is_game_over() {
            return played;
        }
        assert_movegen_matches(&board, &state);

        state.legal_moves_into(&mut ids);
        if ids.is_empty() {
            return played;
        }

        let id = *ids.choose(&mut rng).expect("list is non-empty");
        let mv = catalogue().get(id);
        board
            .apply(
                Position::from_square(mv.from as usize),
                Position::from_square(mv.to as usize),
            )
            .expect("packed kernel produced a move the board rejects");
        state.apply_move(mv, &params);
    }
    max_moves
}
