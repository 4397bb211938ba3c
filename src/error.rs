use thiserror::Error;

use crate::Position;

/// Errors surfaced by the decision core. Contract violations that can only
/// be produced by a programming mistake (catalogue overflow, unknown piece
/// bytes at search time) are trapped by assertions at initialisation
/// instead of being routed through this type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A derived utility fell outside the i16 range the packed tables use.
    #[error("derived utility {value} for {color} {piece_type} at square {square} overflows i16")]
    UtilityOverflow {
        color: usize,
        square: usize,
        piece_type: usize,
        value: f64,
    },

    /// The external board reported a square outside the 96-square manifold,
    /// or a piece encoding this version does not understand.
    #[error("board reported an impossible position: {detail}")]
    ImpossiblePosition { detail: String },

    /// A (from, to) pair that is not legal in the current board state.
    #[error("illegal move {from} -> {to}")]
    IllegalMove { from: Position, to: Position },

    /// A move was requested from an empty square.
    #[error("no piece at {position}")]
    NoPiece { position: Position },

    /// The game is already over and cannot accept further moves.
    #[error("game is over")]
    GameOver,
}
