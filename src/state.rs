//! The packed game state the search runs on.
//!
//! Each square is one byte, `0 0 P T T T C C`: the present bit, three type
//! bits and two colour bits. A zero byte is an empty square, which keeps
//! the hot-path emptiness test a plain non-zero check. Utilities are
//! maintained incrementally on every applied move; after any sequence of
//! `apply_move` calls they equal what a full recomputation would produce.

use crate::board::BoardView;
use crate::catalogue::{catalogue, Move, MoveId, MoveKind};
use crate::params::CombinedParams;
use crate::{
    Color, PieceType, Position, Utility, BYSTANDER_UTILITY, LOSS_UTILITY, NUM_COLORS,
    TOTAL_SQUARES, WIN_UTILITY,
};

pub const PIECE_PRESENT: u8 = 0b10_0000;

pub fn pack_piece(piece_type: PieceType, color: Color) -> u8 {
    PIECE_PRESENT | ((piece_type as u8) << 2) | color as u8
}

pub fn unpack_piece(byte: u8) -> Option<(PieceType, Color)> {
    if byte == 0 {
        None
    } else {
        Some((
            PieceType::from_index(((byte >> 2) & 7) as usize),
            Color::from_index((byte & 3) as usize),
        ))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PackedState {
    pub pieces: [u8; TOTAL_SQUARES],
    /// Colour whose turn it is, 0..3.
    pub turn: u8,
    /// `(winner << 2) | loser`; zero while the game is in progress.
    pub game_over: u8,
    pub utilities: [Utility; NUM_COLORS],
}

impl Default for PackedState {
    fn default() -> Self {
        PackedState {
            pieces: [0; TOTAL_SQUARES],
            turn: 0,
            game_over: 0,
            utilities: [0; NUM_COLORS],
        }
    }
}

impl PackedState {
    pub fn new() -> PackedState {
        PackedState::default()
    }

    /// The standard three-sided starting position, Blue to move.
    pub fn starting_position() -> PackedState {
        let mut state = PackedState::new();
        use PieceType::*;
        let back_rank = [Rook, Knight, Bishop, Queen, King, Bishop, Knight, Rook];
        for color in crate::ALL_COLORS {
            let base = color.to_index() * crate::SIDE_SQUARES;
            for (col, &piece_type) in back_rank.iter().enumerate() {
                state.pieces[base + col] = pack_piece(piece_type, color);
            }
            for col in 0..crate::SIDE_LENGTH {
                state.pieces[base + crate::SIDE_LENGTH + col] = pack_piece(Pawn, color);
            }
        }
        state
    }

    /// Copies turn, game-over word and piece bytes in from an external
    /// board. Utilities are left stale; recompute them once the caller has
    /// settled the parameter interpolation for this ply.
    pub fn load(&mut self, board: &impl BoardView) {
        self.turn = board.turn().to_index() as u8;
        self.game_over = match board.game_over() {
            Some((winner, loser)) => ((winner.to_index() as u8) << 2) | loser.to_index() as u8,
            None => 0,
        };
        self.pieces = [0; TOTAL_SQUARES];
        for position in Position::all() {
            if let Some((piece_type, color)) = board.piece_at(position) {
                self.pieces[position.square()] = pack_piece(piece_type, color);
            }
        }
    }

    pub fn copy_from(&mut self, other: &PackedState) {
        *self = *other;
    }

    pub fn piece_at(&self, square: usize) -> Option<(PieceType, Color)> {
        unpack_piece(self.pieces[square])
    }

    pub fn place(&mut self, position: Position, piece_type: PieceType, color: Color) {
        self.pieces[position.square()] = pack_piece(piece_type, color);
    }

    pub fn clear_square(&mut self, square: usize) {
        self.pieces[square] = 0;
    }

    pub fn utility(&self, color: usize) -> Utility {
        self.utilities[color]
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over != 0
    }

    pub fn winner_loser(&self) -> Option<(Color, Color)> {
        if self.game_over == 0 {
            None
        } else {
            Some((
                Color::from_index((self.game_over >> 2) as usize),
                Color::from_index((self.game_over & 3) as usize),
            ))
        }
    }

    /// Sum of base piece values still on the board. Drives the parameter
    /// interpolation ratio.
    pub fn remaining_material(&self) -> u32 {
        self.pieces
            .iter()
            .filter_map(|&byte| unpack_piece(byte))
            .map(|(piece_type, _)| piece_type.value())
            .sum()
    }

    /// Applies a catalogued move in place: relocates the castling rook if
    /// any, moves the piece with incremental utility updates, promotes a
    /// pawn reaching a far back rank, and advances the turn unless the
    /// move captured a king.
    pub fn apply_move(&mut self, mv: &Move, params: &CombinedParams) {
        if let MoveKind::Castle {
            rook_from, rook_to, ..
        } = mv.kind
        {
            self.move_piece(rook_from as usize, rook_to as usize, params);
        }

        self.move_piece(mv.from as usize, mv.to as usize, params);

        if mv.promotes() {
            self.promote_to_queen(mv.to as usize, params);
        }

        if self.game_over == 0 {
            self.turn = (self.turn + 1) % 3;
        } else {
            self.set_terminal_utilities();
        }
    }

    fn move_piece(&mut self, from: usize, to: usize, params: &CombinedParams) {
        let captured = self.pieces[to];
        let moving = self.pieces[from];
        self.pieces[from] = 0;
        self.pieces[to] = moving;

        let color = (moving & 3) as usize;
        let type_index = ((moving >> 2) & 7) as usize;
        let change = params.piece_utility(color, to, type_index)
            - params.piece_utility(color, from, type_index);
        let self_weight = params.self_weight();
        self.utilities[color] += self_weight * change;
        self.utilities[(color + 1) % 3] -= 10 * change;
        self.utilities[(color + 2) % 3] -= 10 * change;

        if captured == 0 {
            return;
        }

        let captured_color = (captured & 3) as usize;
        let captured_type = ((captured >> 2) & 7) as usize;
        if captured_type == PieceType::King.to_index() {
            self.game_over = ((color as u8) << 2) | captured_color as u8;
            return;
        }

        let captured_utility = params.piece_utility(captured_color, to, captured_type);
        self.utilities[captured_color] -= self_weight * captured_utility;
        self.utilities[(captured_color + 1) % 3] += 10 * captured_utility;
        self.utilities[(captured_color + 2) % 3] += 10 * captured_utility;
    }

    fn promote_to_queen(&mut self, square: usize, params: &CombinedParams) {
        let byte = self.pieces[square];
        let color = (byte & 3) as usize;
        let from_type = ((byte >> 2) & 7) as usize;
        let queen = PieceType::Queen.to_index();
        self.pieces[square] = PIECE_PRESENT | ((queen as u8) << 2) | color as u8;

        let change =
            params.piece_utility(color, square, queen) - params.piece_utility(color, square, from_type);
        let self_weight = params.self_weight();
        self.utilities[color] += self_weight * change;
        self.utilities[(color + 1) % 3] -= 10 * change;
        self.utilities[(color + 2) % 3] -= 10 * change;
    }

    fn set_terminal_utilities(&mut self) {
        let winner = (self.game_over >> 2) as usize;
        let loser = (self.game_over & 3) as usize;
        self.utilities[winner] = WIN_UTILITY;
        self.utilities[loser] = LOSS_UTILITY;
        self.utilities[3 - winner - loser] = BYSTANDER_UTILITY;
    }

    /// Rebuilds the utility vector from scratch. The incremental updates in
    /// `apply_move` must always agree with this.
    pub fn recompute_utilities(&mut self, params: &CombinedParams) {
        if self.game_over != 0 {
            self.set_terminal_utilities();
            return;
        }

        self.utilities = [0; NUM_COLORS];
        let self_weight = params.self_weight();
        for square in 0..TOTAL_SQUARES {
            let byte = self.pieces[square];
            if byte == 0 {
                continue;
            }
            let color = (byte & 3) as usize;
            let type_index = ((byte >> 2) & 7) as usize;
            let value = params.piece_utility(color, square, type_index);
            self.utilities[color] += self_weight * value;
            self.utilities[(color + 1) % 3] -= 10 * value;
            self.utilities[(color + 2) % 3] -= 10 * value;
        }
    }

    /// Walks one square's catalogued move list, applying the same-colour
    /// skip, the blocked-ray jump for sliders, and each move's own validity
    /// predicate, calling `visit` for every legal move.
    ///
    /// Sliders never consult their predicate here: the list is walked
    /// short-to-long within each ray, so reaching a longer prefix means its
    /// intermediate squares were already seen empty.
    #[inline]
    fn walk_square_moves(&self, square: usize, visit: &mut impl FnMut(MoveId, &'static Move)) {
        let byte = self.pieces[square];
        let type_index = ((byte >> 2) & 7) as usize;
        let (offset, list) = catalogue().list(self.turn as usize, square, type_index);

        let mut index = 0;
        while index < list.len() {
            let mv = &list[index];
            let id = offset + index as MoveId;
            let mut next = index + 1;

            let to_byte = self.pieces[mv.to as usize];
            let legal = if let MoveKind::Slide { skip, .. } = mv.kind {
                if to_byte != 0 {
                    next = skip as usize;
                    to_byte & 3 != self.turn
                } else {
                    true
                }
            } else {
                (to_byte == 0 || to_byte & 3 != self.turn) && mv.is_valid(&self.pieces)
            };

            if legal {
                visit(id, mv);
            }
            index = next;
        }
    }

    /// Collects every legal move for the side to move, in ascending square
    /// order. The output list is reused across turns.
    pub fn legal_moves_into(&self, out: &mut Vec<MoveId>) {
        out.clear();
        for square in 0..TOTAL_SQUARES {
            let byte = self.pieces[square];
            if byte == 0 || byte & 3 != self.turn {
                continue;
            }
            self.walk_square_moves(square, &mut |id, _| out.push(id));
        }
    }

    /// Collects the legal moves that capture a piece.
    pub fn capturing_moves_into(&self, out: &mut MoveSet) {
        out.clear();
        for square in 0..TOTAL_SQUARES {
            let byte = self.pieces[square];
            if byte == 0 || byte & 3 != self.turn {
                continue;
            }
            self.walk_square_moves(square, &mut |id, mv| {
                if self.pieces[mv.to as usize] != 0 {
                    out.insert(id);
                }
            });
        }
    }

    /// Iterates the legal moves for the side to move, walking squares in
    /// descending order the way the search kernels do.
    pub fn moves_rev(&self) -> MovesRev<'_> {
        MovesRev {
            state: self,
            square: TOTAL_SQUARES as isize,
            offset: 0,
            list: &[],
            index: 0,
        }
    }
}

/// Legal-move iterator over a state, descending square order. Yields the
/// catalogue id alongside the move so callers can track move identity.
pub struct MovesRev<'s> {
    state: &'s PackedState,
    square: isize,
    offset: MoveId,
    list: &'static [Move],
    index: usize,
}

impl<'s> Iterator for MovesRev<'s> {
    type Item = (MoveId, &'static Move);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            while self.index < self.list.len() {
                let mv = &self.list[self.index];
                let id = self.offset + self.index as MoveId;
                let mut next = self.index + 1;

                let to_byte = self.state.pieces[mv.to as usize];
                let legal = if let MoveKind::Slide { skip, .. } = mv.kind {
                    if to_byte != 0 {
                        next = skip as usize;
                        to_byte & 3 != self.state.turn
                    } else {
                        true
                    }
                } else {
                    (to_byte == 0 || to_byte & 3 != self.state.turn)
                        && mv.is_valid(&self.state.pieces)
                };

                self.index = next;
                if legal {
                    return Some((id, mv));
                }
            }

            loop {
                self.square -= 1;
                if self.square < 0 {
                    return None;
                }
                let byte = self.state.pieces[self.square as usize];
                if byte != 0 && byte & 3 == self.state.turn {
                    let type_index = ((byte >> 2) & 7) as usize;
                    let (offset, list) = catalogue().list(
                        self.state.turn as usize,
                        self.square as usize,
                        type_index,
                    );
                    self.offset = offset;
                    self.list = list;
                    self.index = 0;
                    break;
                }
            }
        }
    }
}

/// A reusable set of catalogue move ids. The windows the restricted
/// quiescence search threads through recursion stay small, so membership
/// is a linear scan over a reused buffer.
#[derive(Default, Debug, Clone)]
pub struct MoveSet {
    ids: Vec<MoveId>,
}

impl MoveSet {
    pub fn new() -> MoveSet {
        MoveSet {
            ids: Vec::with_capacity(64),
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn insert(&mut self, id: MoveId) {
        self.ids.push(id);
    }

    pub fn contains(&self, id: MoveId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Color::*;
    use crate::PieceType::*;

    fn find_move(state: &PackedState, from: Position, to: Position) -> &'static Move {
        let mut moves = Vec::new();
        state.legal_moves_into(&mut moves);
        moves
            .iter()
            .map(|&id| catalogue().get(id))
            .find(|mv| mv.from as usize == from.square() && mv.to as usize == to.square())
            .expect("expected move to be legal")
    }

    #[test]
    fn packed_bytes_round_trip() {
        for color in crate::ALL_COLORS {
            for piece_type in crate::ALL_PIECE_TYPES {
                let byte = pack_piece(piece_type, color);
                assert_ne!(byte, 0);
                assert_eq!(unpack_piece(byte), Some((piece_type, color)));
            }
        }
        assert_eq!(unpack_piece(0), None);
    }

    #[test]
    fn starting_position_move_census() {
        let state = PackedState::starting_position();
        let mut moves = Vec::new();
        state.legal_moves_into(&mut moves);

        let mut pushes = 0;
        let mut doubles = 0;
        let mut knights = 0;
        for &id in &moves {
            match catalogue().get(id).kind {
                MoveKind::PawnPush { .. } => pushes += 1,
                MoveKind::PawnDouble { .. } => doubles += 1,
                MoveKind::Knight => knights += 1,
                ref other => panic!("unexpected opening move kind {:?}", other),
            }
        }
        assert_eq!(pushes, 8);
        assert_eq!(doubles, 8);
        assert_eq!(knights, 4);
        assert_eq!(moves.len(), 20);
    }

    #[test]
    fn incremental_utilities_match_recompute_over_a_game() {
        let params = CombinedParams::default_tuned();
        let mut state = PackedState::starting_position();
        state.recompute_utilities(&params);

        let mut moves = Vec::new();
        for turn in 0..60 {
            state.legal_moves_into(&mut moves);
            if moves.is_empty() || state.is_game_over() {
                break;
            }
            // A deterministic but scattered pick.
            let id = moves[(turn * 7) % moves.len()];
            let mv = catalogue().get(id).clone();
            state.apply_move(&mv, &params);

            let mut fresh = state;
            fresh.recompute_utilities(&params);
            assert_eq!(state.utilities, fresh.utilities, "after move {}", mv);
        }
    }

    #[test]
    fn king_capture_ends_the_game_with_terminal_utilities() {
        let params = CombinedParams::default_tuned();
        let mut state = PackedState::new();
        state.place(Position::new(Blue, 2, 4).unwrap(), Rook, Blue);
        state.place(Position::new(Blue, 0, 4).unwrap(), King, Green);
        state.place(Position::new(Red, 0, 0).unwrap(), King, Red);
        state.place(Position::new(Green, 0, 0).unwrap(), King, Blue);
        state.recompute_utilities(&params);

        let mv = find_move(
            &state,
            Position::new(Blue, 2, 4).unwrap(),
            Position::new(Blue, 0, 4).unwrap(),
        );
        let mut next = state;
        next.apply_move(mv, &params);

        assert_eq!(next.winner_loser(), Some((Blue, Green)));
        assert_eq!(next.utilities[Blue.to_index()], WIN_UTILITY);
        assert_eq!(next.utilities[Green.to_index()], LOSS_UTILITY);
        assert_eq!(next.utilities[Red.to_index()], BYSTANDER_UTILITY);
    }

    #[test]
    fn double_step_is_blocked_through_a_piece() {
        let mut state = PackedState::starting_position();
        // A Green knight parked right in front of a Blue pawn.
        state.place(Position::new(Blue, 2, 3).unwrap(), Knight, Green);
        let mut moves = Vec::new();
        state.legal_moves_into(&mut moves);
        let pawn_from = Position::new(Blue, 1, 3).unwrap().square();
        let blocked: Vec<_> = moves
            .iter()
            .map(|&id| catalogue().get(id))
            .filter(|mv| mv.from as usize == pawn_from)
            .filter(|mv| {
                matches!(
                    mv.kind,
                    MoveKind::PawnPush { .. } | MoveKind::PawnDouble { .. }
                )
            })
            .collect();
        assert!(blocked.is_empty());
    }

    #[test]
    fn castling_applies_the_rook_relocation() {
        let params = CombinedParams::default_tuned();
        let mut state = PackedState::starting_position();
        // Clear Blue's queenside between king and rook.
        for col in 1..4 {
            state.clear_square(Position::new(Blue, 0, col).unwrap().square());
        }
        state.recompute_utilities(&params);

        let mv = find_move(
            &state,
            Position::new(Blue, 0, 4).unwrap(),
            Position::new(Blue, 0, 2).unwrap(),
        );
        let mut next = state;
        next.apply_move(mv, &params);

        assert_eq!(
            next.piece_at(Position::new(Blue, 0, 2).unwrap().square()),
            Some((King, Blue))
        );
        assert_eq!(
            next.piece_at(Position::new(Blue, 0, 3).unwrap().square()),
            Some((Rook, Blue))
        );
        assert_eq!(next.piece_at(Position::new(Blue, 0, 0).unwrap().square()), None);

        let mut fresh = next;
        fresh.recompute_utilities(&params);
        assert_eq!(next.utilities, fresh.utilities);
    }

    #[test]
    fn promotion_swaps_the_pawn_for_a_queen() {
        let params = CombinedParams::default_tuned();
        let mut state = PackedState::new();
        state.place(Position::new(Green, 1, 2).unwrap(), Pawn, Blue);
        state.place(Position::new(Blue, 0, 4).unwrap(), King, Blue);
        state.place(Position::new(Green, 0, 4).unwrap(), King, Green);
        state.place(Position::new(Red, 0, 4).unwrap(), King, Red);
        state.recompute_utilities(&params);

        let mv = find_move(
            &state,
            Position::new(Green, 1, 2).unwrap(),
            Position::new(Green, 0, 2).unwrap(),
        );
        let mut next = state;
        next.apply_move(mv, &params);

        assert_eq!(
            next.piece_at(Position::new(Green, 0, 2).unwrap().square()),
            Some((Queen, Blue))
        );
        let mut fresh = next;
        fresh.recompute_utilities(&params);
        assert_eq!(next.utilities, fresh.utilities);
    }

    #[test]
    fn rev_iteration_matches_forward_enumeration() {
        let state = PackedState::starting_position();
        let mut forward = Vec::new();
        state.legal_moves_into(&mut forward);
        let mut backward: Vec<MoveId> = state.moves_rev().map(|(id, _)| id).collect();
        backward.sort_unstable();
        let mut forward_sorted = forward.clone();
        forward_sorted.sort_unstable();
        assert_eq!(forward_sorted, backward);
    }
}
