//! Seed types for initializing each process's partition.
//!
//! Seeds are described in global coordinates; every process applies the seed to
//! the cells it owns, so the union over all processes is the global initial state.

use rand::prelude::*;
use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::compute::CellularGrid;
use crate::distributed::Partition;

/// Complete seed specification for simulation initialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Seed {
    /// Pattern to use for seeding.
    pub pattern: Pattern,
}

/// Initial-state patterns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Pattern {
    /// Each owned cell is alive with probability `density`.
    Random {
        /// Fraction of live cells (0.0-1.0).
        density: f64,
        /// Base RNG seed, offset by rank. `None` draws from entropy.
        seed: Option<u64>,
    },
    /// Explicit live cells in global coordinates.
    Cells {
        /// List of (x, y) entries.
        cells: Vec<(usize, usize)>,
    },
    /// Glider with its bounding box's top-left corner at (x, y), heading south-east.
    Glider { x: usize, y: usize },
    /// Horizontal blinker starting at (x, y).
    Blinker { x: usize, y: usize },
}

impl Default for Pattern {
    fn default() -> Self {
        Pattern::Random {
            density: 0.4,
            seed: None,
        }
    }
}

const GLIDER: [(usize, usize); 5] = [(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)];
const BLINKER: [(usize, usize); 3] = [(0, 0), (1, 0), (2, 0)];

impl Pattern {
    /// Literal live cells for the shape patterns, `None` for random fill.
    ///
    /// Shape cells whose coordinates would overflow are dropped.
    pub fn cells(&self) -> Option<Vec<(usize, usize)>> {
        self.shape_cells().map(|(cells, _)| cells)
    }

    /// Shape cells plus the number dropped for overflowing.
    fn shape_cells(&self) -> Option<(Vec<(usize, usize)>, usize)> {
        let (x, y, offsets) = match self {
            Pattern::Random { .. } => return None,
            Pattern::Cells { cells } => return Some((cells.clone(), 0)),
            Pattern::Glider { x, y } => (*x, *y, &GLIDER[..]),
            Pattern::Blinker { x, y } => (*x, *y, &BLINKER[..]),
        };
        let cells: Vec<_> = offsets
            .iter()
            .filter_map(|&(dx, dy)| Some((x.checked_add(dx)?, y.checked_add(dy)?)))
            .collect();
        let dropped = offsets.len() - cells.len();
        Some((cells, dropped))
    }
}

impl Seed {
    /// Check pattern parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.pattern {
            Pattern::Random { density, .. } if !(0.0..=1.0).contains(&density) => {
                Err(ConfigError::InvalidDensity(density))
            }
            _ => Ok(()),
        }
    }

    /// Populate the owned cells of `grid`, which holds `partition` of a
    /// `global_width x global_height` grid. Returns the number of live cells set.
    pub fn apply(
        &self,
        grid: &mut CellularGrid,
        partition: &Partition,
        rank: usize,
        global_width: usize,
        global_height: usize,
    ) -> usize {
        match &self.pattern {
            Pattern::Random { density, seed } => {
                let mut rng = match seed {
                    Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(rank as u64)),
                    None => StdRng::from_entropy(),
                };
                let density = density.clamp(0.0, 1.0);
                let mut live = 0;
                for y in 0..partition.height as i64 {
                    for x in 0..partition.width as i64 {
                        if rng.gen_bool(density) && revive(grid, x, y) {
                            live += 1;
                        }
                    }
                }
                live
            }
            pattern => {
                let (cells, overflowed) = pattern.shape_cells().unwrap_or_default();
                if overflowed > 0 && rank == 0 {
                    log::warn!("Dropped {} seed cells with overflowing coordinates", overflowed);
                }
                let mut live = 0;
                for (gx, gy) in cells {
                    if gx >= global_width || gy >= global_height {
                        if rank == 0 {
                            log::warn!(
                                "Seed cell ({}, {}) lies outside the {}x{} grid",
                                gx,
                                gy,
                                global_width,
                                global_height
                            );
                        }
                        continue;
                    }
                    if let Some((x, y)) = partition.to_local(gx, gy) {
                        if revive(grid, x as i64, y as i64) {
                            live += 1;
                        }
                    }
                }
                live
            }
        }
    }
}

/// Set an owned cell alive. Returns whether it was dead before.
fn revive(grid: &mut CellularGrid, x: i64, y: i64) -> bool {
    grid.get(x, y) == Some(false) && grid.set(x, y, true).is_ok()
}
