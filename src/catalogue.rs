//! The precomputed move catalogue: every move each piece type of each
//! colour could geometrically make from each of the 96 squares.
//!
//! Catalogued moves are not necessarily legal in a given state. Legality is
//! the destination-not-same-colour check plus each move's own validity
//! predicate, both applied by the kernel in [`crate::state`].
//!
//! The per-(square, colour, type) lists are flattened into one `moves`
//! buffer with a parallel directive table storing `(offset << 8) | length`
//! for each list.

use once_cell::sync::Lazy;

use crate::geometry::{
    reverse_pattern, slider_rays, walk, walk_repeated, Direction, KING_STEPS, KNIGHT_STEPS,
    MAX_SLIDE_REPS, PAWN_CAPTURES, PAWN_PUSH,
};
use crate::state::pack_piece;
use crate::{
    Color, PieceType, ALL_COLORS, ALL_PIECE_TYPES, NUM_PIECE_TYPES, PIECE_INDEX_STRIDE,
    SIDE_LENGTH, SIDE_SQUARES, TOTAL_SQUARES,
};

/// Identifies a move by its offset into the flattened catalogue buffer.
pub type MoveId = u32;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Move {
    pub from: u8,
    pub to: u8,
    pub kind: MoveKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MoveKind {
    /// Pawn advancing one square; requires an empty destination.
    PawnPush { promote: bool },
    /// Pawn advancing two squares from its starting row; both the middle
    /// square and the destination must be empty.
    PawnDouble { middle: u8 },
    /// Pawn capturing diagonally; requires an occupied destination.
    PawnCapture { promote: bool },
    Knight,
    /// One prefix of a slider ray. `empties` are the squares the piece
    /// passes over; `skip` is the list index of the first move past this
    /// ray, jumped to by the kernel when the destination is occupied.
    Slide {
        reps: u8,
        skip: u16,
        empties: Box<[u8]>,
    },
    King,
    /// King castling. Validated against the rook still standing on its
    /// corner and the squares between king and rook being empty.
    Castle {
        rook_from: u8,
        rook_to: u8,
        rook_byte: u8,
        empties: Box<[u8]>,
    },
}

impl Move {
    /// Whether this move can be applied to a board with the given piece
    /// bytes. Assumes the destination does not hold a piece of the moving
    /// colour; the kernel checks that before calling.
    pub fn is_valid(&self, pieces: &[u8; TOTAL_SQUARES]) -> bool {
        match &self.kind {
            MoveKind::PawnPush { .. } => pieces[self.to as usize] == 0,
            MoveKind::PawnDouble { middle } => {
                pieces[*middle as usize] == 0 && pieces[self.to as usize] == 0
            }
            MoveKind::PawnCapture { .. } => pieces[self.to as usize] != 0,
            MoveKind::Knight | MoveKind::King => true,
            MoveKind::Slide { empties, .. } => {
                empties.iter().all(|&sq| pieces[sq as usize] == 0)
            }
            MoveKind::Castle {
                rook_from,
                rook_to,
                rook_byte,
                empties,
            } => {
                pieces[*rook_from as usize] == *rook_byte
                    && empties.iter().all(|&sq| pieces[sq as usize] == 0)
                    && pieces[*rook_to as usize] == 0
            }
        }
    }

    pub fn promotes(&self) -> bool {
        matches!(
            self.kind,
            MoveKind::PawnPush { promote: true } | MoveKind::PawnCapture { promote: true }
        )
    }
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} -> {}",
            crate::Position::from_square(self.from as usize),
            crate::Position::from_square(self.to as usize)
        )
    }
}

/// A pawn promotes when it reaches the back rank of any segment. Pawns can
/// never re-enter their own segment's back rank, so geometrically this is
/// always a far row.
fn promotes_at(to: usize) -> bool {
    (to % SIDE_SQUARES) < SIDE_LENGTH
}

pub struct Catalogue {
    moves: Vec<Move>,
    directives: Vec<u32>,
}

static CATALOGUE: Lazy<Catalogue> = Lazy::new(Catalogue::build);

pub fn catalogue() -> &'static Catalogue {
    &CATALOGUE
}

impl Catalogue {
    /// The flattened list for (colour, square, type): its global offset and
    /// the moves themselves.
    pub fn list(&self, color: usize, square: usize, type_index: usize) -> (MoveId, &[Move]) {
        let directive =
            self.directives[color * PIECE_INDEX_STRIDE + square * NUM_PIECE_TYPES + type_index];
        let offset = (directive >> 8) as usize;
        let length = (directive & 255) as usize;
        (offset as MoveId, &self.moves[offset..offset + length])
    }

    pub fn get(&self, id: MoveId) -> &Move {
        &self.moves[id as usize]
    }

    pub fn total_moves(&self) -> usize {
        self.moves.len()
    }

    fn build() -> Catalogue {
        let mut moves = Vec::new();
        let mut directives = Vec::with_capacity(TOTAL_SQUARES * 3 * NUM_PIECE_TYPES);

        for color in ALL_COLORS {
            for square in 0..TOTAL_SQUARES {
                for piece_type in ALL_PIECE_TYPES {
                    let list = filter_moves(square, generate_moves(square, color, piece_type));
                    assert!(
                        list.len() <= 255,
                        "move list for {:?} {:?} at {} exceeds a directive byte",
                        color,
                        piece_type,
                        square
                    );
                    let offset = moves.len();
                    directives.push(((offset as u32) << 8) | list.len() as u32);
                    moves.extend(list);
                }
            }
        }

        Catalogue { moves, directives }
    }
}

fn generate_moves(square: usize, color: Color, piece_type: PieceType) -> Vec<Move> {
    match piece_type {
        PieceType::Pawn => pawn_moves(square, color),
        PieceType::Knight => step_moves(square, &KNIGHT_STEPS, MoveKind::Knight),
        PieceType::Bishop | PieceType::Rook | PieceType::Queen => {
            slide_moves(square, piece_type)
        }
        PieceType::King => king_moves(square, color),
    }
}

/// Pawns move relative to their own side: when standing in a foreign
/// segment the whole pattern is reversed up front, since the crossing
/// already happened on the way in.
fn pawn_moves(square: usize, color: Color) -> Vec<Move> {
    let mut moves = Vec::new();
    let home = square / SIDE_SQUARES == color.to_index();

    let push: Vec<Direction> = if home {
        PAWN_PUSH.to_vec()
    } else {
        reverse_pattern(PAWN_PUSH)
    };
    if let Some(to) = walk(square, &push) {
        moves.push(Move {
            from: square as u8,
            to: to as u8,
            kind: MoveKind::PawnPush {
                promote: promotes_at(to),
            },
        });
    }

    for pattern in PAWN_CAPTURES {
        let pattern: Vec<Direction> = if home {
            pattern.to_vec()
        } else {
            reverse_pattern(pattern)
        };
        if let Some(to) = walk(square, &pattern) {
            moves.push(Move {
                from: square as u8,
                to: to as u8,
                kind: MoveKind::PawnCapture {
                    promote: promotes_at(to),
                },
            });
        }
    }

    // From the starting row the pawn may advance two squares. The double
    // step never leaves the home segment, so the indices are direct.
    let start_row = color.to_index() * SIDE_SQUARES + SIDE_LENGTH;
    if square >= start_row && square < start_row + SIDE_LENGTH {
        moves.push(Move {
            from: square as u8,
            to: (square + 2 * SIDE_LENGTH) as u8,
            kind: MoveKind::PawnDouble {
                middle: (square + SIDE_LENGTH) as u8,
            },
        });
    }

    moves
}

fn step_moves(square: usize, patterns: &[&[Direction]], kind: MoveKind) -> Vec<Move> {
    let mut moves = Vec::new();
    for pattern in patterns {
        if let Some(to) = walk(square, pattern) {
            moves.push(Move {
                from: square as u8,
                to: to as u8,
                kind: kind.clone(),
            });
        }
    }
    moves
}

/// Every non-empty prefix of every ray, reps ascending within a ray. The
/// skip indices patched in afterwards rely on that ordering.
fn slide_moves(square: usize, piece_type: PieceType) -> Vec<Move> {
    let mut moves = Vec::new();
    for ray in slider_rays(piece_type) {
        for reps in 1..=MAX_SLIDE_REPS {
            let Some(to) = walk_repeated(square, ray, reps) else {
                break;
            };
            let empties: Box<[u8]> = (1..reps)
                .map(|intermediate| {
                    walk_repeated(square, ray, intermediate)
                        .expect("prefix of a reachable ray stays on the board")
                        as u8
                })
                .collect();
            moves.push(Move {
                from: square as u8,
                to: to as u8,
                kind: MoveKind::Slide {
                    reps: reps as u8,
                    skip: 0,
                    empties,
                },
            });
        }
    }
    moves
}

fn king_moves(square: usize, color: Color) -> Vec<Move> {
    let mut moves = step_moves(square, &KING_STEPS, MoveKind::King);

    // Castling is only catalogued from the king's starting square.
    let base = color.to_index() * SIDE_SQUARES;
    if square == base + 4 {
        let rook_byte = pack_piece(PieceType::Rook, color);
        moves.push(Move {
            from: (base + 4) as u8,
            to: (base + 2) as u8,
            kind: MoveKind::Castle {
                rook_from: base as u8,
                rook_to: (base + 3) as u8,
                rook_byte,
                empties: Box::new([(base + 1) as u8, (base + 2) as u8]),
            },
        });
        moves.push(Move {
            from: (base + 4) as u8,
            to: (base + 6) as u8,
            kind: MoveKind::Castle {
                rook_from: (base + 7) as u8,
                rook_to: (base + 5) as u8,
                rook_byte,
                empties: Box::new([(base + 6) as u8]),
            },
        });
    }
    moves
}

/// Removes duplicate (from, to) pairs, keeping the first occurrence, then
/// patches the slider skip indices: each slide's `skip` is the index of the
/// first later move with no more reps than its own, which is the start of
/// the next ray. When a slide's destination turns out occupied, every later
/// move in the same ray is longer and therefore also blocked, so the kernel
/// can resume from `skip` directly.
fn filter_moves(square: usize, raw: Vec<Move>) -> Vec<Move> {
    let mut filtered: Vec<Move> = Vec::with_capacity(raw.len());
    for mv in raw {
        debug_assert_eq!(mv.from as usize, square);
        if !filtered.iter().any(|kept| kept.to == mv.to) {
            filtered.push(mv);
        }
    }

    let reps_of = |mv: &Move| match mv.kind {
        MoveKind::Slide { reps, .. } => Some(reps),
        _ => None,
    };
    if filtered.first().and_then(reps_of).is_some() {
        let all_reps: Vec<u8> = filtered
            .iter()
            .map(|mv| reps_of(mv).expect("slider lists hold only slides"))
            .collect();
        for (index, mv) in filtered.iter_mut().enumerate() {
            let MoveKind::Slide { reps, skip, .. } = &mut mv.kind else {
                unreachable!();
            };
            *skip = all_reps[index + 1..]
                .iter()
                .position(|&later| later <= *reps)
                .map(|found| (index + 1 + found) as u16)
                .unwrap_or(all_reps.len() as u16);
        }
    }

    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Position;

    fn list_for(color: Color, pos: Position, piece_type: PieceType) -> &'static [Move] {
        catalogue()
            .list(color.to_index(), pos.square(), piece_type.to_index())
            .1
    }

    #[test]
    fn starting_pawn_has_push_capture_and_double() {
        let list = list_for(
            Color::Blue,
            Position::new(Color::Blue, 1, 0).unwrap(),
            PieceType::Pawn,
        );
        // One push, one surviving diagonal (the two orders of the same
        // diagonal deduplicate), one double step.
        assert_eq!(list.len(), 3);
        assert!(list
            .iter()
            .any(|mv| matches!(mv.kind, MoveKind::PawnDouble { .. })));
    }

    #[test]
    fn foreign_pawn_walks_toward_the_far_back_rank() {
        // A Blue pawn standing in Green's segment pushes toward Green's
        // back rank and promotes there.
        let pos = Position::new(Color::Green, 1, 3).unwrap();
        let list = list_for(Color::Blue, pos, PieceType::Pawn);
        let push = list
            .iter()
            .find(|mv| matches!(mv.kind, MoveKind::PawnPush { .. }))
            .unwrap();
        assert_eq!(
            Position::from_square(push.to as usize),
            Position::new(Color::Green, 0, 3).unwrap()
        );
        assert!(push.promotes());
    }

    #[test]
    fn corner_rook_covers_both_rays() {
        let list = list_for(
            Color::Blue,
            Position::new(Color::Blue, 0, 0).unwrap(),
            PieceType::Rook,
        );
        assert_eq!(list.len(), 14);
    }

    #[test]
    fn knight_near_the_corner() {
        let list = list_for(
            Color::Blue,
            Position::new(Color::Blue, 0, 1).unwrap(),
            PieceType::Knight,
        );
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn king_home_square_includes_castles() {
        let list = list_for(
            Color::Red,
            Position::new(Color::Red, 0, 4).unwrap(),
            PieceType::King,
        );
        let castles = list
            .iter()
            .filter(|mv| matches!(mv.kind, MoveKind::Castle { .. }))
            .count();
        assert_eq!(castles, 2);
    }

    #[test]
    fn skip_indices_jump_past_longer_moves_only() {
        for color in 0..3 {
            for square in 0..TOTAL_SQUARES {
                for piece_type in [PieceType::Bishop, PieceType::Rook, PieceType::Queen] {
                    let (_, list) = catalogue().list(color, square, piece_type.to_index());
                    for (index, mv) in list.iter().enumerate() {
                        let MoveKind::Slide { reps, skip, .. } = &mv.kind else {
                            panic!("non-slide in slider list");
                        };
                        let skip = *skip as usize;
                        assert!(skip > index && skip <= list.len());
                        for blocked in &list[index + 1..skip] {
                            let MoveKind::Slide {
                                reps: later_reps, ..
                            } = &blocked.kind
                            else {
                                panic!("non-slide in slider list");
                            };
                            assert!(later_reps > reps);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn duplicate_destinations_are_removed() {
        for color in 0..3 {
            for square in 0..TOTAL_SQUARES {
                for piece_type in ALL_PIECE_TYPES {
                    let (_, list) = catalogue().list(color, square, piece_type.to_index());
                    for (index, mv) in list.iter().enumerate() {
                        assert!(
                            !list[index + 1..].iter().any(|later| later.to == mv.to),
                            "duplicate destination in list for square {}",
                            square
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn move_ids_are_dense_and_total() {
        let total = catalogue().total_moves();
        let mut seen = 0usize;
        for color in 0..3 {
            for square in 0..TOTAL_SQUARES {
                for piece_type in 0..NUM_PIECE_TYPES {
                    let (offset, list) = catalogue().list(color, square, piece_type);
                    assert_eq!(offset as usize, seen);
                    seen += list.len();
                }
            }
        }
        assert_eq!(seen, total);
    }
}
