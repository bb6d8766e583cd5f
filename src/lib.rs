//! Mesh Life - Game of Life partitioned over cooperating ranks.
//!
//! The global grid is cut into one rectangle per rank. Each rank keeps a
//! one-cell halo around its rectangle, refreshes it from its four toroidal
//! neighbors every tick, and steps its cells independently. The coordinator
//! gathers every live cell each tick and hands them to a renderer.
//!
//! # Architecture
//!
//! - `compute`: bit grids, the haloed cellular grid and convolution rules
//! - `distributed`: topology, message passing, halo exchange, aggregation, tick loop
//! - `render`: SVG, terminal and no-op frame sinks
//! - `schema`: configuration and seeding
//!
//! # Example
//!
//! ```rust,no_run
//! use mesh_life::{
//!     distributed::launch,
//!     render::NullRenderer,
//!     schema::{Pattern, Seed, SimulationConfig},
//! };
//!
//! let config = SimulationConfig {
//!     width: 64,
//!     height: 32,
//!     ticks: 100,
//!     processes: 4,
//!     seed: Seed {
//!         pattern: Pattern::Glider { x: 1, y: 1 },
//!     },
//!     ..Default::default()
//! };
//!
//! let summary = launch(&config, Box::new(NullRenderer::create())).unwrap();
//! println!("{} live cells after {} ticks", summary.final_population, summary.ticks);
//! ```

pub mod compute;
pub mod distributed;
pub mod render;
pub mod schema;

// Re-export commonly used types
pub use compute::{BitGrid, CellularGrid, Rule};
pub use distributed::{RunSummary, Simulation, SimulationError, launch};
pub use schema::{Pattern, Seed, SimulationConfig};
