//! Board topology: square indexing, the centre junction between the three
//! segments, and multi-step walks with direction reflection.
//!
//! Directions are relative to the segment a square sits in, not to the piece
//! standing on it. Stepping forward off row 3 crosses into another segment's
//! row 3, and every later direction in the same walk must be reversed.

use once_cell::sync::Lazy;

use crate::{PieceType, SIDE_DEPTH, SIDE_LENGTH, SIDE_SQUARES, TOTAL_SQUARES};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
    Left,
    Right,
}

use Direction::*;

pub const ALL_DIRECTIONS: [Direction; 4] = [Forward, Backward, Left, Right];

impl Direction {
    pub fn reverse(self) -> Direction {
        match self {
            Forward => Backward,
            Backward => Forward,
            Left => Right,
            Right => Left,
        }
    }
}

/// End index of a single step in every direction from every square, or -1
/// off the board. Computed once, read on every catalogue walk.
static NEIGHBORS: Lazy<[[i16; 4]; TOTAL_SQUARES]> = Lazy::new(|| {
    let mut table = [[-1i16; 4]; TOTAL_SQUARES];
    for (square, entry) in table.iter_mut().enumerate() {
        for direction in ALL_DIRECTIONS {
            entry[direction as usize] = match single_step(square, direction) {
                Some(to) => to as i16,
                None => -1,
            };
        }
    }
    table
});

/// One step from `square`, honouring the centre junction. Crossing happens
/// only when stepping forward off row 3: columns 0-3 enter the next
/// segment, columns 4-7 the previous one, and the column mirrors to
/// `7 - col` so that the two half-edges glue symmetrically.
fn single_step(square: usize, direction: Direction) -> Option<usize> {
    let segment = square / SIDE_SQUARES;
    let row = (square % SIDE_SQUARES) / SIDE_LENGTH;
    let col = square % SIDE_LENGTH;
    match direction {
        Forward => {
            if row + 1 < SIDE_DEPTH {
                Some(square + SIDE_LENGTH)
            } else {
                let target = if col < SIDE_LENGTH / 2 {
                    (segment + 1) % 3
                } else {
                    (segment + 2) % 3
                };
                Some(target * SIDE_SQUARES + (SIDE_DEPTH - 1) * SIDE_LENGTH + (7 - col))
            }
        }
        Backward => {
            if row > 0 {
                Some(square - SIDE_LENGTH)
            } else {
                None
            }
        }
        Left => {
            if col > 0 {
                Some(square - 1)
            } else {
                None
            }
        }
        Right => {
            if col + 1 < SIDE_LENGTH {
                Some(square + 1)
            } else {
                None
            }
        }
    }
}

pub fn neighbor(square: usize, direction: Direction) -> Option<usize> {
    let to = NEIGHBORS[square][direction as usize];
    if to >= 0 {
        Some(to as usize)
    } else {
        None
    }
}

/// Applies `pattern` once from `square`. Returns None when the walk leaves
/// the board.
pub fn walk(square: usize, pattern: &[Direction]) -> Option<usize> {
    walk_repeated(square, pattern, 1)
}

/// Applies `pattern` `reps` times from `square`. After the walk first
/// crosses into a different segment than it started in, every remaining
/// direction is reversed. The reversal is sticky: walking back into the
/// starting segment does not undo it.
pub fn walk_repeated(square: usize, pattern: &[Direction], reps: usize) -> Option<usize> {
    let start_segment = square / SIDE_SQUARES;
    let mut current = square;
    let mut reverse = false;
    for _ in 0..reps {
        for &direction in pattern {
            let step = if reverse { direction.reverse() } else { direction };
            current = neighbor(current, step)?;
            if current / SIDE_SQUARES != start_segment {
                reverse = true;
            }
        }
    }
    Some(current)
}

pub fn reverse_pattern(pattern: &[Direction]) -> Vec<Direction> {
    pattern.iter().map(|d| d.reverse()).collect()
}

pub const PAWN_PUSH: &[Direction] = &[Forward];

/// All the diagonal step orders a pawn can capture along. Both orders of
/// each diagonal are listed because they reach different squares near the
/// centre junction.
pub const PAWN_CAPTURES: [&[Direction]; 4] = [
    &[Forward, Left],
    &[Forward, Right],
    &[Left, Forward],
    &[Right, Forward],
];

pub const KNIGHT_STEPS: [&[Direction]; 8] = [
    &[Forward, Forward, Left],
    &[Forward, Forward, Right],
    &[Backward, Backward, Left],
    &[Backward, Backward, Right],
    &[Left, Left, Forward],
    &[Left, Left, Backward],
    &[Right, Right, Forward],
    &[Right, Right, Backward],
];

pub const KING_STEPS: [&[Direction]; 12] = [
    &[Forward],
    &[Backward],
    &[Left],
    &[Right],
    &[Forward, Left],
    &[Left, Forward],
    &[Forward, Right],
    &[Right, Forward],
    &[Backward, Left],
    &[Left, Backward],
    &[Backward, Right],
    &[Right, Backward],
];

pub const ROOK_RAYS: [&[Direction]; 4] = [&[Forward], &[Backward], &[Left], &[Right]];

/// Ray orders matter for sliders: rays are grouped so that the move lists
/// built from them stay contiguous per ray, which the blocked-ray skip in
/// the move kernel relies on.
pub const BISHOP_RAYS: [&[Direction]; 8] = [
    &[Forward, Left],
    &[Left, Forward],
    &[Forward, Right],
    &[Right, Forward],
    &[Backward, Left],
    &[Left, Backward],
    &[Backward, Right],
    &[Right, Backward],
];

pub const QUEEN_RAYS: [&[Direction]; 12] = [
    &[Forward, Left],
    &[Left, Forward],
    &[Forward, Right],
    &[Right, Forward],
    &[Backward, Left],
    &[Left, Backward],
    &[Backward, Right],
    &[Right, Backward],
    &[Forward],
    &[Backward],
    &[Left],
    &[Right],
];

pub fn slider_rays(piece_type: PieceType) -> &'static [&'static [Direction]] {
    match piece_type {
        PieceType::Rook => &ROOK_RAYS,
        PieceType::Bishop => &BISHOP_RAYS,
        PieceType::Queen => &QUEEN_RAYS,
        _ => unreachable!("{:?} is not a slider", piece_type),
    }
}

/// The longest useful ray: four rows to the centre plus four on the far
/// side, or seven squares along a rank.
pub const MAX_SLIDE_REPS: usize = 7;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Color, Position};

    #[test]
    fn forward_within_segment() {
        let from = Position::new(Color::Blue, 0, 3).unwrap().square();
        let to = Position::new(Color::Blue, 1, 3).unwrap().square();
        assert_eq!(neighbor(from, Forward), Some(to));
    }

    #[test]
    fn crossing_is_symmetric() {
        for col in 0..SIDE_LENGTH {
            for segment in 0..3 {
                let from = segment * SIDE_SQUARES + 3 * SIDE_LENGTH + col;
                let to = neighbor(from, Forward).unwrap();
                assert_ne!(from / SIDE_SQUARES, to / SIDE_SQUARES);
                assert_eq!(neighbor(to, Forward), Some(from));
            }
        }
    }

    #[test]
    fn left_half_crosses_to_next_segment() {
        let from = Position::new(Color::Blue, 3, 1).unwrap().square();
        let to = neighbor(from, Forward).unwrap();
        assert_eq!(Position::from_square(to), Position::new(Color::Green, 3, 6).unwrap());
    }

    #[test]
    fn edges_leave_the_board() {
        let back_rank = Position::new(Color::Red, 0, 5).unwrap().square();
        assert_eq!(neighbor(back_rank, Backward), None);
        let left_edge = Position::new(Color::Green, 2, 0).unwrap().square();
        assert_eq!(neighbor(left_edge, Left), None);
        let right_edge = Position::new(Color::Green, 2, 7).unwrap().square();
        assert_eq!(neighbor(right_edge, Right), None);
    }

    #[test]
    fn walk_reverses_after_crossing() {
        // Two forward steps from row 3 cross the centre and then head away
        // from it in the far segment.
        let from = Position::new(Color::Blue, 3, 2).unwrap().square();
        let to = walk_repeated(from, &[Forward], 2).unwrap();
        assert_eq!(Position::from_square(to), Position::new(Color::Green, 2, 5).unwrap());
    }

    #[test]
    fn rook_ray_spans_seven_squares() {
        let from = Position::new(Color::Blue, 0, 2).unwrap().square();
        assert!(walk_repeated(from, &[Forward], MAX_SLIDE_REPS).is_some());
        assert_eq!(
            walk_repeated(from, &[Forward], MAX_SLIDE_REPS).map(Position::from_square),
            Position::new(Color::Green, 0, 5)
        );
    }
}
