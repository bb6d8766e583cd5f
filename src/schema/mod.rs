//! Schema module - Configuration and seeding types for distributed runs.

mod config;
mod seed;

pub use config::*;
pub use seed::*;
