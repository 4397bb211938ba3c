//! The family of search strategies.
//!
//! Every variant shares the same move-generation kernel from
//! [`crate::state`] and the same scratch discipline: a fixed fleet of
//! state buffers, one per ply of depth, reused across sibling moves. A
//! buffer is never read after the call that used it returns.

mod maximax;
mod minimax;
mod pvs;
mod quiescence;
mod restricted;

pub use maximax::Maximax;
pub use minimax::Minimax;
pub use pvs::PrincipalVariation;
pub use quiescence::Quiescence;
pub use restricted::RestrictedQuiescence;

use crate::catalogue::MoveId;
use crate::params::CombinedParams;
use crate::state::PackedState;

/// A fixed-depth move decision. `state` must be in progress and have
/// utilities consistent with `params` (freshly recomputed after the last
/// interpolation update).
pub trait Strategy {
    fn decide_move(&mut self, state: &PackedState, params: &CombinedParams) -> Option<MoveId>;

    /// The target ply depth this instance searches to.
    fn ply(&self) -> usize;
}
