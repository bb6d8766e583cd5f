//! Process topology - mapping ranks onto a 2D torus of partitions.
//!
//! `size` processes are laid out as `width x height` with `height` the largest
//! divisor of `size` not exceeding its square root, which keeps the layout as
//! square as possible and minimizes total halo perimeter. Prime counts fall back
//! to a `size x 1` strip.
//!
//! ```text
//! size = 6  ->  3 x 2         size = 7  ->  7 x 1
//!
//!   0 | 1 | 2                   0 | 1 | 2 | 3 | 4 | 5 | 6
//!   --+---+--
//!   3 | 4 | 5
//! ```

use crate::compute::Side;

/// Errors raised when deriving a topology.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    #[error("Process count must be non-zero")]
    NoProcesses,
    #[error("Rank {rank} is outside a topology of {size} processes")]
    RankOutOfRange { rank: usize, size: usize },
}

/// Integer square root (floor).
#[inline]
pub fn isqrt(n: usize) -> usize {
    let mut root = (n as f64).sqrt() as usize;
    while root * root > n {
        root -= 1;
    }
    while (root + 1) * (root + 1) <= n {
        root += 1;
    }
    root
}

/// Largest `k` with `1 < k <= sqrt(n)` dividing `n`, or 1 if there is none.
pub fn find_factor(n: usize) -> usize {
    (2..=isqrt(n)).rev().find(|k| n % k == 0).unwrap_or(1)
}

/// `dividend / divisor` rounded to nearest, exact halves rounding down.
#[inline]
pub fn rounded_division(dividend: usize, divisor: usize) -> usize {
    let q = dividend / divisor;
    if dividend % divisor > divisor / 2 { q + 1 } else { q }
}

/// Length of the partition at `position` along an axis of `global_dim` cells split
/// `axis_count` ways. The last position absorbs the remainder.
///
/// Returns `None` when the split would leave the last position with no cells.
pub fn partition_len(global_dim: usize, axis_count: usize, position: usize) -> Option<usize> {
    let base = rounded_division(global_dim, axis_count);
    let others = base.checked_mul(axis_count - 1)?;
    if base == 0 || others >= global_dim {
        return None;
    }
    if position + 1 == axis_count {
        Some(global_dim - others)
    } else {
        Some(base)
    }
}

/// Global offset of the partition at `position`.
#[inline]
pub fn partition_origin(global_dim: usize, axis_count: usize, position: usize) -> usize {
    rounded_division(global_dim, axis_count) * position
}

/// A process's share of the global grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    /// Global x of the partition's first owned column.
    pub origin_x: usize,
    /// Global y of the partition's first owned row.
    pub origin_y: usize,
    /// Owned columns.
    pub width: usize,
    /// Owned rows.
    pub height: usize,
}

impl Partition {
    /// Convert a local owned coordinate to its global position.
    #[inline]
    pub fn to_global(&self, x: usize, y: usize) -> (usize, usize) {
        (self.origin_x + x, self.origin_y + y)
    }

    /// Convert a global coordinate to local, if this partition owns it.
    #[inline]
    pub fn to_local(&self, x: usize, y: usize) -> Option<(usize, usize)> {
        let owns = x >= self.origin_x
            && y >= self.origin_y
            && x < self.origin_x + self.width
            && y < self.origin_y + self.height;
        owns.then(|| (x - self.origin_x, y - self.origin_y))
    }
}

/// Immutable placement of one rank within the process torus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessTopology {
    size: usize,
    rank: usize,
    width: usize,
    height: usize,
}

impl ProcessTopology {
    /// Derive the topology for `rank` among `size` processes.
    pub fn new(size: usize, rank: usize) -> Result<Self, TopologyError> {
        if size == 0 {
            return Err(TopologyError::NoProcesses);
        }
        if rank >= size {
            return Err(TopologyError::RankOutOfRange { rank, size });
        }
        let height = find_factor(size);
        Ok(Self {
            size,
            rank,
            width: size / height,
            height,
        })
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Processes per row.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Processes per column.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// This rank's column in the topology.
    #[inline]
    pub fn coord_x(&self) -> usize {
        self.rank % self.width
    }

    /// This rank's row in the topology.
    #[inline]
    pub fn coord_y(&self) -> usize {
        self.rank / self.width
    }

    /// Rank at topology position (x, y), wrapping toroidally on both axes.
    #[inline]
    pub fn rank_at(&self, x: i64, y: i64) -> usize {
        let x = x.rem_euclid(self.width as i64) as usize;
        let y = y.rem_euclid(self.height as i64) as usize;
        x + y * self.width
    }

    /// Rank across `side` from this process. May be this process itself.
    pub fn neighbor(&self, side: Side) -> usize {
        let (dx, dy) = side.offset();
        self.rank_at(self.coord_x() as i64 + dx, self.coord_y() as i64 + dy)
    }

    /// The partition of a `global_width x global_height` grid owned by this rank.
    ///
    /// Returns `None` if either axis cannot give every position at least one cell.
    pub fn partition(&self, global_width: usize, global_height: usize) -> Option<Partition> {
        let (cx, cy) = (self.coord_x(), self.coord_y());
        Some(Partition {
            origin_x: partition_origin(global_width, self.width, cx),
            origin_y: partition_origin(global_height, self.height, cy),
            width: partition_len(global_width, self.width, cx)?,
            height: partition_len(global_height, self.height, cy)?,
        })
    }

    /// Partition of every rank, indexed by rank.
    pub fn all_partitions(&self, global_width: usize, global_height: usize) -> Option<Vec<Partition>> {
        (0..self.size)
            .map(|rank| {
                ProcessTopology { rank, ..*self }.partition(global_width, global_height)
            })
            .collect()
    }
}
