//! Evaluation parameters and the derived per-square utility table.
//!
//! A [`CombinedParams`] holds one parameter triple for the start of the
//! game and one for the end, and linearly interpolates between them by how
//! much material has left the board. The interpolated parameters are baked
//! into a flat i16 table that `apply_move` reads for its O(1) incremental
//! utility updates.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::state::PackedState;
use crate::tables::MEAN_MOVES_PER_POSITION;
use crate::{
    PieceType, Utility, NUM_COLORS, NUM_PIECE_TYPES, PIECE_INDEX_STRIDE, SIDE_LENGTH,
    SIDE_SQUARES, TOTAL_SQUARES,
};

/// One parameter triple: how much a side's own material is worth to it,
/// the value of each piece type, and positional bonuses for advanced pawns
/// and mobile squares.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvalParams {
    pub self_weight: i32,
    pub type_values: [f64; NUM_PIECE_TYPES],
    pub pawn_row_value: f64,
    pub move_count_value: f64,
}

/// Parameters that were determined favourable for winning early game
/// positions by the offline tuning loop.
pub const START_GAME: EvalParams = EvalParams {
    self_weight: 11,
    type_values: [4.3, 16.3, 17.9, 19.0, 36.6, 0.0],
    pawn_row_value: 5.1,
    move_count_value: 2.8,
};

/// Parameters that were determined favourable for winning end games.
pub const END_GAME: EvalParams = EvalParams {
    self_weight: 11,
    type_values: [8.2, 16.2, 12.2, 17.5, 35.5, 0.0],
    pawn_row_value: 8.4,
    move_count_value: 4.9,
};

/// Sum of base piece values over the whole board at the start of a game.
pub const START_TOTAL_VALUE: u32 = (8 * 1 + 2 * 3 + 2 * 3 + 2 * 5 + 9 + 20) * NUM_COLORS as u32;

fn interp(one: f64, two: f64, ratio: f64) -> f64 {
    one + ratio * (two - one)
}

impl EvalParams {
    pub fn interpolated(start: &EvalParams, end: &EvalParams, ratio: f64) -> EvalParams {
        let mut type_values = [0.0; NUM_PIECE_TYPES];
        for (index, value) in type_values.iter_mut().enumerate() {
            *value = interp(start.type_values[index], end.type_values[index], ratio);
        }
        EvalParams {
            self_weight: interp(start.self_weight as f64, end.self_weight as f64, ratio).round()
                as i32,
            type_values,
            pawn_row_value: interp(start.pawn_row_value, end.pawn_row_value, ratio),
            move_count_value: interp(start.move_count_value, end.move_count_value, ratio),
        }
    }

    /// Parameters drawn uniformly from the ranges the tuning loop explores.
    pub fn random(rng: &mut impl Rng) -> EvalParams {
        let mut type_values = [0.0; NUM_PIECE_TYPES];
        type_values[PieceType::Pawn.to_index()] = rng.gen_range(1.0..12.0);
        type_values[PieceType::Knight.to_index()] = rng.gen_range(5.0..30.0);
        type_values[PieceType::Bishop.to_index()] = rng.gen_range(5.0..30.0);
        type_values[PieceType::Rook.to_index()] = rng.gen_range(5.0..30.0);
        type_values[PieceType::Queen.to_index()] = rng.gen_range(20.0..50.0);
        // The king's material never changes hands, so its value stays zero.
        EvalParams {
            self_weight: rng.gen_range(5..20),
            type_values,
            pawn_row_value: rng.gen_range(0.0..12.0),
            move_count_value: rng.gen_range(0.0..8.0),
        }
    }

    /// Crossover of two parents: each field comes from one of them, with a
    /// small jitter so the population keeps exploring.
    pub fn mutate(one: &EvalParams, two: &EvalParams, rng: &mut impl Rng) -> EvalParams {
        let mut pick = |a: f64, b: f64| {
            let chosen = if rng.gen_bool(0.5) { a } else { b };
            chosen * rng.gen_range(0.9..1.1)
        };
        let mut type_values = [0.0; NUM_PIECE_TYPES];
        for (index, value) in type_values.iter_mut().enumerate() {
            *value = pick(one.type_values[index], two.type_values[index]);
        }
        let pawn_row_value = pick(one.pawn_row_value, two.pawn_row_value);
        let move_count_value = pick(one.move_count_value, two.move_count_value);
        let self_weight = pick(one.self_weight as f64, two.self_weight as f64)
            .round()
            .max(1.0) as i32;
        EvalParams {
            self_weight,
            type_values,
            pawn_row_value,
            move_count_value,
        }
    }
}

/// Round-trippable on-disk form of a parameter pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParamsFile {
    pub start: EvalParams,
    pub end: EvalParams,
}

pub struct CombinedParams {
    pub start: EvalParams,
    pub end: EvalParams,
    active: EvalParams,
    table: Vec<i16>,
}

impl CombinedParams {
    pub fn new(start: EvalParams, end: EvalParams) -> Result<CombinedParams, EngineError> {
        let mut params = CombinedParams {
            active: start.clone(),
            start,
            end,
            table: vec![0; NUM_COLORS * PIECE_INDEX_STRIDE],
        };
        params.rebuild_table()?;
        Ok(params)
    }

    /// The tuned defaults. These are known to fit the packed table.
    pub fn default_tuned() -> CombinedParams {
        CombinedParams::new(START_GAME, END_GAME).expect("tuned defaults fit the packed table")
    }

    pub fn from_file(file: ParamsFile) -> Result<CombinedParams, EngineError> {
        CombinedParams::new(file.start, file.end)
    }

    pub fn to_file(&self) -> ParamsFile {
        ParamsFile {
            start: self.start.clone(),
            end: self.end.clone(),
        }
    }

    /// The parameter triple currently in force.
    pub fn active(&self) -> &EvalParams {
        &self.active
    }

    pub fn self_weight(&self) -> Utility {
        self.active.self_weight as Utility
    }

    /// The derived utility of one piece standing on one square.
    #[inline]
    pub fn piece_utility(&self, color: usize, square: usize, type_index: usize) -> Utility {
        self.table[color * PIECE_INDEX_STRIDE + square * NUM_PIECE_TYPES + type_index] as Utility
    }

    /// Re-interpolates the active parameters from how much material remains
    /// in `state` and rebuilds the derived table.
    ///
    /// Call this at most once per ply decision, before utilities are
    /// computed for the root state. Changing the table mid-search would
    /// desynchronise the incrementally maintained utility vectors.
    pub fn update_interpolation(&mut self, state: &PackedState) -> Result<(), EngineError> {
        let ratio = 1.0 - state.remaining_material() as f64 / START_TOTAL_VALUE as f64;
        self.active = EvalParams::interpolated(&self.start, &self.end, ratio);
        self.rebuild_table()
    }

    fn rebuild_table(&mut self) -> Result<(), EngineError> {
        for color in 0..NUM_COLORS {
            for square in 0..TOTAL_SQUARES {
                for type_index in 0..NUM_PIECE_TYPES {
                    let index =
                        color * PIECE_INDEX_STRIDE + square * NUM_PIECE_TYPES + type_index;
                    let mut utility = self.active.type_values[type_index];

                    if type_index == PieceType::Pawn.to_index() {
                        let row = (square % SIDE_SQUARES) / SIDE_LENGTH;
                        let advancement = if square / SIDE_SQUARES == color {
                            row + 1
                        } else {
                            8 - row
                        };
                        utility += self.active.pawn_row_value * advancement as f64;
                    }

                    utility += self.active.move_count_value * MEAN_MOVES_PER_POSITION[index];

                    let rounded = utility.round();
                    if rounded < i16::MIN as f64 || rounded > i16::MAX as f64 {
                        return Err(EngineError::UtilityOverflow {
                            color,
                            square,
                            piece_type: type_index,
                            value: utility,
                        });
                    }
                    self.table[index] = rounded as i16;
                }
            }
        }
        Ok(())
    }
}

impl Clone for CombinedParams {
    fn clone(&self) -> Self {
        CombinedParams {
            start: self.start.clone(),
            end: self.end.clone(),
            active: self.active.clone(),
            table: self.table.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midpoint_interpolation_hits_every_component() {
        let mid = EvalParams::interpolated(&START_GAME, &END_GAME, 0.5);
        assert_eq!(
            mid.self_weight,
            ((START_GAME.self_weight + END_GAME.self_weight) as f64 / 2.0).round() as i32
        );
        for index in 0..NUM_PIECE_TYPES {
            assert_eq!(
                mid.type_values[index],
                (START_GAME.type_values[index] + END_GAME.type_values[index]) / 2.0
            );
        }
        assert_eq!(
            mid.pawn_row_value,
            (START_GAME.pawn_row_value + END_GAME.pawn_row_value) / 2.0
        );
        assert_eq!(
            mid.move_count_value,
            (START_GAME.move_count_value + END_GAME.move_count_value) / 2.0
        );
    }

    #[test]
    fn fresh_board_keeps_the_start_parameters() {
        let mut params = CombinedParams::default_tuned();
        let state = PackedState::starting_position();
        params.update_interpolation(&state).unwrap();
        assert_eq!(params.active(), &START_GAME);
    }

    #[test]
    fn update_interpolation_is_idempotent() {
        let mut params = CombinedParams::default_tuned();
        let mut state = PackedState::starting_position();
        // Clear out a couple of squares so the ratio is not zero.
        state.clear_square(crate::Position::new(crate::Color::Green, 1, 0).unwrap().square());
        state.clear_square(crate::Position::new(crate::Color::Red, 0, 3).unwrap().square());
        params.update_interpolation(&state).unwrap();
        let first = params.table.clone();
        params.update_interpolation(&state).unwrap();
        assert_eq!(params.table, first);
    }

    #[test]
    fn parameter_file_round_trips_exactly() {
        let params = CombinedParams::default_tuned();
        let json = serde_json::to_string(&params.to_file()).unwrap();
        let restored: ParamsFile = serde_json::from_str(&json).unwrap();
        let restored = CombinedParams::from_file(restored).unwrap();
        assert_eq!(restored.table, params.table);
    }

    #[test]
    fn absurd_parameters_overflow_the_table() {
        let mut start = START_GAME;
        start.type_values[PieceType::Queen.to_index()] = 1.0e9;
        assert!(matches!(
            CombinedParams::new(start, END_GAME),
            Err(EngineError::UtilityOverflow { .. })
        ));
    }

    #[test]
    fn pawn_advancement_raises_home_segment_utility() {
        let params = CombinedParams::default_tuned();
        let pawn = PieceType::Pawn.to_index();
        let near = crate::Position::new(crate::Color::Blue, 1, 0).unwrap().square();
        let far = crate::Position::new(crate::Color::Blue, 3, 0).unwrap().square();
        assert!(params.piece_utility(0, far, pawn) > params.piece_utility(0, near, pawn));
    }
}
