//! End-to-end checks that drive the whole decision pipeline: board
//! copy-in, move enumeration, the search strategies, and the deepening
//! controller, all cross-checked against the reference board.

use std::time::Instant;

use three_chess::agent::StrategyKind;
use three_chess::catalogue::catalogue;
use three_chess::strategy::{Maximax, Minimax, PrincipalVariation, Strategy};
use three_chess::verify;
use three_chess::{
    Agent, Board, Color, CombinedParams, DeepeningAgent, PackedState, PieceType, Position,
};

fn loaded_start() -> (Board, PackedState, CombinedParams) {
    let board = Board::initial(0);
    let mut params = CombinedParams::default_tuned();
    let mut state = PackedState::new();
    state.load(&board);
    params.update_interpolation(&state).unwrap();
    state.recompute_utilities(&params);
    (board, state, params)
}

#[test]
fn opening_enumeration_matches_the_reference_board() {
    let (board, state, _) = loaded_start();

    let mut ids = Vec::new();
    state.legal_moves_into(&mut ids);
    assert_eq!(ids.len(), board.legal_moves().len());

    // Eight single pawn steps, eight double steps, two moves per knight,
    // and nothing for the back rank.
    let mut singles = 0;
    let mut doubles = 0;
    let mut knight_moves = 0;
    for &id in &ids {
        let mv = catalogue().get(id);
        let from = Position::from_square(mv.from as usize);
        match state.piece_at(mv.from as usize).unwrap().0 {
            PieceType::Pawn => {
                assert_eq!(from.row, 1);
                if mv.to as usize == mv.from as usize + 8 {
                    singles += 1;
                } else {
                    doubles += 1;
                }
            }
            PieceType::Knight => knight_moves += 1,
            other => panic!("{:?} should have no opening moves", other),
        }
    }
    assert_eq!((singles, doubles, knight_moves), (8, 8, 4));
}

#[test]
fn one_ply_maximax_is_a_utility_argmax() {
    let (_, state, params) = loaded_start();

    let mut strategy = Maximax::with_seed(1, 42);
    let chosen = strategy.decide_move(&state, &params).unwrap();

    // Recompute the argmax by hand.
    let mut ids = Vec::new();
    state.legal_moves_into(&mut ids);
    let best = ids
        .iter()
        .map(|&id| {
            let mut child = state;
            child.apply_move(catalogue().get(id), &params);
            child.utility(state.turn as usize)
        })
        .max()
        .unwrap();

    let mut child = state;
    child.apply_move(catalogue().get(chosen), &params);
    assert_eq!(child.utility(state.turn as usize), best);

    // The same seed must reproduce the same choice, tie-breaks included.
    let mut replay = Maximax::with_seed(1, 42);
    assert_eq!(replay.decide_move(&state, &params), Some(chosen));
}

fn king_capture_position() -> (Board, PackedState, CombinedParams) {
    let mut board = Board::initial(0);
    for position in Position::all() {
        board.set_piece(position, None);
    }
    board.set_piece(
        Position::new(Color::Blue, 0, 4).unwrap(),
        Some((PieceType::King, Color::Blue)),
    );
    board.set_piece(
        Position::new(Color::Green, 0, 4).unwrap(),
        Some((PieceType::King, Color::Green)),
    );
    board.set_piece(
        Position::new(Color::Red, 0, 4).unwrap(),
        Some((PieceType::King, Color::Red)),
    );
    // A Blue rook one file up from Green's king.
    board.set_piece(
        Position::new(Color::Green, 2, 4).unwrap(),
        Some((PieceType::Rook, Color::Blue)),
    );

    let mut params = CombinedParams::default_tuned();
    let mut state = PackedState::new();
    state.load(&board);
    params.update_interpolation(&state).unwrap();
    state.recompute_utilities(&params);
    (board, state, params)
}

#[test]
fn a_one_move_king_capture_is_taken_at_every_depth() {
    let (_, state, params) = king_capture_position();
    let target = Position::new(Color::Green, 0, 4).unwrap().square();

    for ply in 1..=4 {
        let mut strategy = Maximax::with_seed(ply, 5);
        let chosen = strategy.decide_move(&state, &params).unwrap();
        assert_eq!(catalogue().get(chosen).to as usize, target, "ply {}", ply);
    }
}

#[test]
fn the_deepening_agent_short_circuits_the_win() {
    let (board, _, _) = king_capture_position();
    let mut agent = DeepeningAgent::maximax();
    let started = Instant::now();
    let (from, to) = agent.play_move(&board).unwrap();
    assert_eq!(from, Position::new(Color::Green, 2, 4).unwrap());
    assert_eq!(to, Position::new(Color::Green, 0, 4).unwrap());
    // No deepening happened at all.
    assert_eq!(agent.mean_ply(), 0.0);
    assert!(started.elapsed().as_millis() < 1_000);
}

#[test]
fn pvs_agrees_with_minimax_on_searched_utility() {
    // Walk a few plies into a real game and compare at every state.
    let (_, mut state, params) = loaded_start();
    let mut ids = Vec::new();

    for step in 0..6 {
        for ply in 1..=3 {
            let mut pvs = PrincipalVariation::with_seed(ply, 7);
            let mut minimax = Minimax::with_seed(ply, 7);
            pvs.decide_move(&state, &params);
            minimax.decide_move(&state, &params);
            assert_eq!(
                pvs.last_utility(),
                minimax.last_utility(),
                "diverged at step {} ply {}",
                step,
                ply
            );
        }

        state.legal_moves_into(&mut ids);
        let id = ids[(step * 5) % ids.len()];
        let mv = catalogue().get(id).clone();
        state.apply_move(&mv, &params);
        if state.is_game_over() {
            break;
        }
    }
}

#[test]
fn deepening_returns_a_legal_move_on_a_tiny_budget() {
    // 10ms on the clock: the controller must still return a legal move.
    let board = Board::initial(10);
    let mut agent = DeepeningAgent::new(StrategyKind::Maximax, CombinedParams::default_tuned());
    let (from, to) = agent.play_move(&board).unwrap();
    assert!(board.is_legal_move(from, to));
    // At least the initial depth completed; the cap was never exceeded.
    assert!(agent.mean_ply() >= 2.0);
    assert!(agent.mean_ply() <= 12.0);
}

#[test]
fn every_strategy_kind_plays_a_legal_opening_move() {
    for kind in [
        StrategyKind::Maximax,
        StrategyKind::Minimax,
        StrategyKind::Quiescence,
        StrategyKind::RestrictedQuiescence,
        StrategyKind::PrincipalVariation,
    ] {
        let board = Board::initial(2_000);
        let mut agent = DeepeningAgent::new(kind, CombinedParams::default_tuned());
        let (from, to) = agent.play_move(&board).unwrap();
        assert!(
            board.is_legal_move(from, to),
            "{:?} produced an illegal move",
            kind
        );
    }
}

#[test]
fn midgame_interpolation_follows_the_material_ratio() {
    use three_chess::params::{END_GAME, START_GAME, START_TOTAL_VALUE};

    // Strip material until only the kings remain: ratio goes all the way
    // to the end-game parameters.
    let mut state = PackedState::new();
    for color in three_chess::ALL_COLORS {
        state.place(
            Position::new(color, 0, 4).unwrap(),
            PieceType::King,
            color,
        );
    }
    assert_eq!(state.remaining_material(), 3 * PieceType::King.value());

    let mut params = CombinedParams::default_tuned();
    params.update_interpolation(&state).unwrap();
    let expected_ratio =
        1.0 - (3.0 * PieceType::King.value() as f64) / START_TOTAL_VALUE as f64;
    let expected =
        three_chess::params::EvalParams::interpolated(&START_GAME, &END_GAME, expected_ratio);
    assert_eq!(params.active(), &expected);
}

#[test]
fn long_verified_playouts_hold_every_invariant() {
    // Random play-outs with every move cross-checked against the oracle:
    // movegen equality, incremental utilities, and the packed/board
    // round-trip.
    for seed in [3, 17] {
        verify::verified_random_playout(seed, 120);
    }
}
