//! Compute module - Grid storage and the generation step.

mod bit_grid;
mod cellular_grid;
mod rule;

pub use bit_grid::*;
pub use cellular_grid::*;
pub use rule::*;
