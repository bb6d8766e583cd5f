//! Per-tick ghost-cell exchange with the four topological neighbors.
//!
//! The exchange runs in two phases, horizontal then vertical. Vertical walls are
//! read after the horizontal halo has been installed, so their end cells already
//! hold the east/west neighbors' edges; that is how diagonal corners arrive
//! without a separate diagonal message.
//!
//! ```text
//!   phase 1: E/W            phase 2: N/S (walls include fresh corners)
//!
//!   . . . . .               c N N N c
//!   W # # # E               W # # # E
//!   W # # # E               W # # # E
//!   . . . . .               c S S S c
//! ```
//!
//! Within a phase both sends and both receives are posted before waiting, so no
//! even/odd ordering is needed to avoid deadlock.

use crate::compute::{CellularGrid, Side};

use super::comm::{CommError, Communicator, Payload, Request, Tag};
use super::{ProcessTopology, SimulationError};

/// Base tag for halo walls; the side a wall travels toward is added to it.
const TAG_HALO: Tag = 0x10;

/// Tag for a wall leaving its owner through `toward`.
#[inline]
fn halo_tag(toward: Side) -> Tag {
    TAG_HALO + toward.index() as Tag
}

/// Exchanges halo walls with fixed neighbor ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HaloExchanger {
    neighbors: [usize; 4],
}

impl HaloExchanger {
    /// Resolve the four neighbor ranks from the topology.
    pub fn new(topology: &ProcessTopology) -> Self {
        let mut neighbors = [0; 4];
        for side in Side::ALL {
            neighbors[side.index()] = topology.neighbor(side);
        }
        Self { neighbors }
    }

    /// Rank across `side`.
    #[inline]
    pub fn neighbor(&self, side: Side) -> usize {
        self.neighbors[side.index()]
    }

    /// Refresh every ghost cell of `grid` from the neighbors' owned edges.
    ///
    /// Every rank must call this once per tick. Returns only after both phases have
    /// completed, so the halo is consistent when the step runs.
    pub fn exchange<C: Communicator + ?Sized>(
        &self,
        comm: &C,
        grid: &mut CellularGrid,
    ) -> Result<(), SimulationError> {
        self.exchange_pair(comm, grid, [Side::East, Side::West])?;
        self.exchange_pair(comm, grid, [Side::North, Side::South])?;
        Ok(())
    }

    fn exchange_pair<C: Communicator + ?Sized>(
        &self,
        comm: &C,
        grid: &mut CellularGrid,
        sides: [Side; 2],
    ) -> Result<(), SimulationError> {
        let mut requests: Vec<Request> = Vec::with_capacity(4);

        for side in sides {
            requests.push(comm.irecv(self.neighbor(side), halo_tag(side.opposite()))?);
        }
        for side in sides {
            let wall = grid.get_wall(side);
            requests.push(comm.isend(self.neighbor(side), halo_tag(side), Payload::Wall(wall))?);
        }

        log::trace!(
            "rank {}: exchanging {:?}/{:?} with {} and {}",
            comm.rank(),
            sides[0],
            sides[1],
            self.neighbor(sides[0]),
            self.neighbor(sides[1])
        );

        let completed = comm.wait_all(requests)?;

        // The first two requests are the receives, in `sides` order.
        for (side, payload) in sides.into_iter().zip(completed) {
            let source = self.neighbor(side);
            let wall = payload
                .ok_or(CommError::Disconnected { peer: source })?
                .into_wall(source)?;
            grid.set_wall(side, &wall)?;
        }
        Ok(())
    }
}
