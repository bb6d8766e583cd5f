//! Per-tick collection of live cells on the coordinator.
//!
//! Two collectives per tick: a count gather so the coordinator can lay out one
//! contiguous buffer, then a variable-length gather that fills it. A barrier
//! closes the tick so nobody mutates state while the coordinator still reads.

use serde::{Deserialize, Serialize};

use crate::compute::CellularGrid;

use super::comm::{Communicator, GatherLayout};
use super::{Partition, SimulationError};

/// A live cell in global coordinates at a given tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellPoint {
    pub tick: u64,
    pub x: usize,
    pub y: usize,
}

impl CellPoint {
    #[inline]
    pub const fn new(tick: u64, x: usize, y: usize) -> Self {
        Self { tick, x, y }
    }
}

/// Exclusive prefix sum of `counts`: each rank's offset and the grand total.
pub fn prefix_offsets(counts: &[usize]) -> (Vec<usize>, usize) {
    let mut total = 0;
    let offsets = counts
        .iter()
        .map(|&count| {
            let offset = total;
            total += count;
            offset
        })
        .collect();
    (offsets, total)
}

/// Live cells of one tick, assembled on the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub tick: u64,
    /// Points per rank, indexed by rank.
    pub counts: Vec<usize>,
    /// Every rank's points, rank 0 first.
    pub points: Vec<CellPoint>,
}

impl Frame {
    #[inline]
    pub fn total(&self) -> usize {
        self.points.len()
    }
}

/// Collects this rank's live cells into the coordinator each tick.
#[derive(Debug, Clone, Copy)]
pub struct Aggregator {
    partition: Partition,
    root: usize,
}

impl Aggregator {
    pub fn new(partition: Partition, root: usize) -> Self {
        Self { partition, root }
    }

    #[inline]
    pub fn root(&self) -> usize {
        self.root
    }

    /// Owned live cells of `grid`, translated to global coordinates.
    pub fn collect_points(&self, grid: &CellularGrid, tick: u64) -> Vec<CellPoint> {
        grid.live_cells()
            .map(|(x, y)| {
                let (gx, gy) = self.partition.to_global(x, y);
                CellPoint::new(tick, gx, gy)
            })
            .collect()
    }

    /// Run the count gather and the point gather.
    ///
    /// The root gets the assembled [`Frame`]; everyone else gets `None`.
    pub fn gather<C: Communicator + ?Sized>(
        &self,
        comm: &C,
        grid: &CellularGrid,
        tick: u64,
    ) -> Result<Option<Frame>, SimulationError> {
        let points = self.collect_points(grid, tick);

        let frame = match comm.gather_count(self.root, points.len())? {
            Some(counts) => {
                let (offsets, total) = prefix_offsets(&counts);
                let mut buffer = vec![CellPoint::default(); total];
                comm.gather_points(
                    self.root,
                    &points,
                    Some(GatherLayout {
                        buffer: &mut buffer,
                        counts: &counts,
                        offsets: &offsets,
                    }),
                )?;
                Some(Frame {
                    tick,
                    counts,
                    points: buffer,
                })
            }
            None => {
                comm.gather_points(self.root, &points, None)?;
                None
            }
        };

        Ok(frame)
    }

    /// Gather, hand the frame to `render` on the root, then wait at the barrier.
    ///
    /// Every rank must call this exactly once per tick, in tick order; a rank that
    /// skips it leaves the others blocked.
    pub fn aggregate<C, F>(
        &self,
        comm: &C,
        grid: &CellularGrid,
        tick: u64,
        render: F,
    ) -> Result<Option<Frame>, SimulationError>
    where
        C: Communicator + ?Sized,
        F: FnOnce(&Frame),
    {
        let frame = self.gather(comm, grid, tick)?;
        if let Some(frame) = &frame {
            render(frame);
        }
        comm.barrier()?;
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::conway;
    use crate::distributed::{ProcessTopology, ThreadComm};

    #[test]
    fn test_prefix_offsets() {
        assert_eq!(prefix_offsets(&[3, 0, 2, 5]), (vec![0, 3, 3, 5], 10));
        assert_eq!(prefix_offsets(&[]), (vec![], 0));
    }

    #[test]
    fn test_collect_points_uses_global_coordinates() {
        let topology = ProcessTopology::new(4, 3).unwrap();
        let partition = topology.partition(8, 6).unwrap();
        let mut grid = CellularGrid::new(partition.width, partition.height, conway);
        grid.set(0, 0, true).unwrap();
        grid.set(3, 2, true).unwrap();
        // Halo cells are never reported.
        grid.set(-1, -1, true).unwrap();

        let points = Aggregator::new(partition, 0).collect_points(&grid, 7);
        assert_eq!(points, vec![CellPoint::new(7, 4, 3), CellPoint::new(7, 7, 5)]);
    }

    #[test]
    fn test_single_rank_gather() {
        let comm = ThreadComm::create(1).pop().unwrap();
        let topology = ProcessTopology::new(1, 0).unwrap();
        let partition = topology.partition(3, 3).unwrap();
        let mut grid = CellularGrid::new(3, 3, conway);
        grid.set(1, 2, true).unwrap();

        let mut rendered = 0;
        let frame = Aggregator::new(partition, 0)
            .aggregate(&comm, &grid, 0, |frame| rendered = frame.total())
            .unwrap()
            .unwrap();
        assert_eq!(rendered, 1);
        assert_eq!(frame.counts, vec![1]);
        assert_eq!(frame.points, vec![CellPoint::new(0, 1, 2)]);
    }
}
