//! The reference board: a straightforward, unoptimised implementation of
//! the three-player rules. The harness and CLI drive games through it, and
//! the tests use it as the oracle the packed state is checked against.
//!
//! Legality here is computed naively by walking step patterns square by
//! square, an entirely different algorithm from the packed catalogue walk.

use ansi_term::{Colour, Style};

use crate::error::EngineError;
use crate::geometry::{
    reverse_pattern, slider_rays, walk, walk_repeated, Direction, KING_STEPS, KNIGHT_STEPS,
    MAX_SLIDE_REPS, PAWN_CAPTURES, PAWN_PUSH,
};
use crate::state::PackedState;
use crate::{Color, PieceType, Position, NUM_COLORS, SIDE_LENGTH, SIDE_SQUARES, TOTAL_SQUARES};

/// What the decision core reads from an external board snapshot.
pub trait BoardView {
    fn turn(&self) -> Color;
    fn piece_at(&self, position: Position) -> Option<(PieceType, Color)>;
    /// `(winner, loser)` once a king has been captured.
    fn game_over(&self) -> Option<(Color, Color)>;
    fn time_left_millis(&self, color: Color) -> u64;
    fn move_count(&self) -> u32;
}

#[derive(Clone)]
pub struct Board {
    pieces: [Option<(PieceType, Color)>; TOTAL_SQUARES],
    turn: Color,
    result: Option<(Color, Color)>,
    time_left_ms: [u64; NUM_COLORS],
    move_count: u32,
}

impl Board {
    /// The standard starting position, Blue to move, with the given clock
    /// for each side. A zero clock means the game is untimed.
    pub fn initial(time_limit_ms: u64) -> Board {
        use PieceType::*;
        let mut pieces = [None; TOTAL_SQUARES];
        let back_rank = [Rook, Knight, Bishop, Queen, King, Bishop, Knight, Rook];
        for color in crate::ALL_COLORS {
            let base = color.to_index() * SIDE_SQUARES;
            for (col, &piece_type) in back_rank.iter().enumerate() {
                pieces[base + col] = Some((piece_type, color));
            }
            for col in 0..SIDE_LENGTH {
                pieces[base + SIDE_LENGTH + col] = Some((Pawn, color));
            }
        }
        Board {
            pieces,
            turn: Color::Blue,
            result: None,
            time_left_ms: [time_limit_ms; NUM_COLORS],
            move_count: 0,
        }
    }

    /// Rebuilds a board from a packed state. Used when round-tripping
    /// between the two representations.
    pub fn from_packed(state: &PackedState) -> Board {
        let mut pieces = [None; TOTAL_SQUARES];
        for (square, slot) in pieces.iter_mut().enumerate() {
            *slot = state.piece_at(square);
        }
        Board {
            pieces,
            turn: Color::from_index(state.turn as usize),
            result: state.winner_loser(),
            time_left_ms: [0; NUM_COLORS],
            move_count: 0,
        }
    }

    pub fn set_piece(&mut self, position: Position, piece: Option<(PieceType, Color)>) {
        self.pieces[position.square()] = piece;
    }

    pub fn set_turn(&mut self, color: Color) {
        self.turn = color;
    }

    pub fn deduct_time(&mut self, color: Color, millis: u64) {
        let left = &mut self.time_left_ms[color.to_index()];
        *left = left.saturating_sub(millis);
    }

    pub fn out_of_time(&self, color: Color) -> bool {
        self.time_left_ms[color.to_index()] == 0
    }

    /// Declares a result directly, e.g. on a timeout.
    pub fn declare_result(&mut self, winner: Color, loser: Color) {
        self.result = Some((winner, loser));
    }

    /// Every legal (from, to) pair for the side to move.
    pub fn legal_moves(&self) -> Vec<(Position, Position)> {
        let mut moves = Vec::new();
        if self.result.is_some() {
            return moves;
        }
        for from in Position::all() {
            let Some((piece_type, color)) = self.pieces[from.square()] else {
                continue;
            };
            if color != self.turn {
                continue;
            }
            self.piece_moves(from, piece_type, color, &mut moves);
        }
        moves.sort_by_key(|&(from, to)| (from.square(), to.square()));
        moves.dedup();
        moves
    }

    pub fn is_legal_move(&self, from: Position, to: Position) -> bool {
        self.legal_moves().contains(&(from, to))
    }

    fn occupant(&self, square: usize) -> Option<Color> {
        self.pieces[square].map(|(_, color)| color)
    }

    fn piece_moves(
        &self,
        from: Position,
        piece_type: PieceType,
        color: Color,
        out: &mut Vec<(Position, Position)>,
    ) {
        use PieceType::*;
        let from_square = from.square();
        match piece_type {
            Pawn => self.pawn_moves(from, color, out),
            Knight => self.step_pattern_moves(from, &KNIGHT_STEPS, color, out),
            King => {
                self.step_pattern_moves(from, &KING_STEPS, color, out);
                self.castle_moves(from, color, out);
            }
            Bishop | Rook | Queen => {
                for ray in slider_rays(piece_type) {
                    for reps in 1..=MAX_SLIDE_REPS {
                        let Some(to) = walk_repeated(from_square, ray, reps) else {
                            break;
                        };
                        match self.occupant(to) {
                            None => out.push((from, Position::from_square(to))),
                            Some(other) => {
                                if other != color {
                                    out.push((from, Position::from_square(to)));
                                }
                                break;
                            }
                        }
                    }
                }
            }
        }
    }

    fn step_pattern_moves(
        &self,
        from: Position,
        patterns: &[&[Direction]],
        color: Color,
        out: &mut Vec<(Position, Position)>,
    ) {
        for pattern in patterns {
            if let Some(to) = walk(from.square(), pattern) {
                if self.occupant(to) != Some(color) {
                    out.push((from, Position::from_square(to)));
                }
            }
        }
    }

    fn pawn_moves(&self, from: Position, color: Color, out: &mut Vec<(Position, Position)>) {
        let from_square = from.square();
        let home = from_square / SIDE_SQUARES == color.to_index();
        let adjust = |pattern: &[Direction]| -> Vec<Direction> {
            if home {
                pattern.to_vec()
            } else {
                reverse_pattern(pattern)
            }
        };

        if let Some(to) = walk(from_square, &adjust(PAWN_PUSH)) {
            if self.occupant(to).is_none() {
                out.push((from, Position::from_square(to)));
                if home && from.row == 1 {
                    let far = from_square + 2 * SIDE_LENGTH;
                    if self.occupant(far).is_none() {
                        out.push((from, Position::from_square(far)));
                    }
                }
            }
        }

        for pattern in PAWN_CAPTURES {
            if let Some(to) = walk(from_square, &adjust(pattern)) {
                if matches!(self.occupant(to), Some(other) if other != color) {
                    out.push((from, Position::from_square(to)));
                }
            }
        }
    }

    fn castle_moves(&self, from: Position, color: Color, out: &mut Vec<(Position, Position)>) {
        let base = color.to_index() * SIDE_SQUARES;
        if from.square() != base + 4 {
            return;
        }
        let rook = Some((PieceType::Rook, color));
        if self.pieces[base] == rook && (1..4).all(|col| self.pieces[base + col].is_none()) {
            out.push((from, Position::from_square(base + 2)));
        }
        if self.pieces[base + 7] == rook && (5..7).all(|col| self.pieces[base + col].is_none()) {
            out.push((from, Position::from_square(base + 6)));
        }
    }

    /// Applies a move by its endpoints, validating legality first.
    pub fn apply(&mut self, from: Position, to: Position) -> Result<(), EngineError> {
        if self.result.is_some() {
            return Err(EngineError::GameOver);
        }
        let Some((piece_type, color)) = self.pieces[from.square()] else {
            return Err(EngineError::NoPiece { position: from });
        };
        if color != self.turn || !self.is_legal_move(from, to) {
            return Err(EngineError::IllegalMove { from, to });
        }

        // A king travelling two files from its home square is a castle;
        // nothing else reaches that destination from there.
        if piece_type == PieceType::King {
            let base = color.to_index() * SIDE_SQUARES;
            if from.square() == base + 4 && to.square() == base + 2 {
                self.pieces[base + 3] = self.pieces[base].take();
            } else if from.square() == base + 4 && to.square() == base + 6 {
                self.pieces[base + 5] = self.pieces[base + 7].take();
            }
        }

        let captured = self.pieces[to.square()];
        self.pieces[to.square()] = Some((piece_type, color));
        self.pieces[from.square()] = None;

        if piece_type == PieceType::Pawn && to.row == 0 {
            self.pieces[to.square()] = Some((PieceType::Queen, color));
        }

        if let Some((PieceType::King, captured_color)) = captured {
            self.result = Some((color, captured_color));
        } else {
            self.turn = self.turn.next();
        }
        self.move_count += 1;
        Ok(())
    }
}

impl BoardView for Board {
    fn turn(&self) -> Color {
        self.turn
    }

    fn piece_at(&self, position: Position) -> Option<(PieceType, Color)> {
        self.pieces[position.square()]
    }

    fn game_over(&self) -> Option<(Color, Color)> {
        self.result
    }

    fn time_left_millis(&self, color: Color) -> u64 {
        self.time_left_ms[color.to_index()]
    }

    fn move_count(&self) -> u32 {
        self.move_count
    }
}

fn color_style(color: Color) -> Style {
    match color {
        Color::Blue => Colour::Fixed(75).bold(),
        Color::Green => Colour::Fixed(114).bold(),
        Color::Red => Colour::Fixed(174).bold(),
    }
}

fn piece_letter(piece_type: PieceType) -> char {
    match piece_type {
        PieceType::Pawn => 'P',
        PieceType::Knight => 'N',
        PieceType::Bishop => 'B',
        PieceType::Rook => 'R',
        PieceType::Queen => 'Q',
        PieceType::King => 'K',
    }
}

impl std::fmt::Display for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = String::new();
        s.push('\n');
        match self.result {
            None => s.push_str(&format!(
                "    {} to move\n",
                color_style(self.turn).paint(self.turn.to_string())
            )),
            Some((winner, loser)) => s.push_str(&format!(
                "    {} wins, {} loses\n",
                color_style(winner).paint(winner.to_string()),
                color_style(loser).paint(loser.to_string())
            )),
        }
        for segment in crate::ALL_COLORS {
            s.push_str(&format!(
                "  {}\n",
                color_style(segment).paint(segment.to_string())
            ));
            for row in (0..crate::SIDE_DEPTH).rev() {
                s.push_str(
                    Colour::Fixed(94)
                        .paint(&format!("  {} ", row + 1))
                        .to_string()
                        .as_str(),
                );
                for col in 0..SIDE_LENGTH {
                    let square = segment.to_index() * SIDE_SQUARES + row * SIDE_LENGTH + col;
                    match self.pieces[square] {
                        Some((piece_type, color)) => s.push_str(
                            &color_style(color)
                                .paint(format!("{} ", piece_letter(piece_type)))
                                .to_string(),
                        ),
                        None => s.push_str(". "),
                    }
                }
                s.push('\n');
            }
        }
        s.push_str(
            Colour::Fixed(94)
                .paint("    a b c d e f g h\n")
                .to_string()
                .as_str(),
        );
        write!(f, "{}", s)
    }
}
