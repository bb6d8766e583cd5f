//! Distributed execution - topology, halo exchange, aggregation and the tick loop.
//!
//! Every rank owns one rectangular partition of the global grid plus a one-cell
//! halo. A tick is:
//!
//! ```text
//! aggregate + render  ->  halo exchange  ->  step  ->  barrier
//! ```

mod aggregate;
mod comm;
mod halo;
mod simulation;
mod topology;

pub use aggregate::*;
pub use comm::*;
pub use halo::*;
pub use simulation::*;
pub use topology::*;
