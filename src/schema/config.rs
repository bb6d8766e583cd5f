//! Configuration types for distributed simulation runs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::Seed;
use crate::compute::Rule;
use crate::distributed::ProcessTopology;

fn default_processes() -> usize {
    4
}

fn default_frame_interval_ms() -> u64 {
    20
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Global grid width in cells, split between processes.
    pub width: usize,
    /// Global grid height in cells, split between processes.
    pub height: usize,
    /// Number of generations to run.
    pub ticks: u64,
    /// Number of cooperating processes (one thread each).
    #[serde(default = "default_processes")]
    pub processes: usize,
    /// Convolution rule.
    #[serde(default)]
    pub rule: Rule,
    /// Initial state.
    #[serde(default)]
    pub seed: Seed,
    /// Where and how frames are rendered.
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 500,
            ticks: 1000,
            processes: default_processes(),
            rule: Rule::default(),
            seed: Seed::default(),
            output: OutputConfig::default(),
        }
    }
}

/// Rendering backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RendererKind {
    /// Animated SVG written under `path`.
    #[default]
    Svg,
    /// Live redraw on stdout.
    Terminal,
    /// Discard frames.
    None,
}

/// Rendering output parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub renderer: RendererKind,
    /// Output directory for file-based renderers.
    pub path: PathBuf,
    /// Time between generations: SVG animation step, or terminal redraw pause.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            renderer: RendererKind::default(),
            path: PathBuf::from("./output"),
            frame_interval_ms: default_frame_interval_ms(),
        }
    }
}

impl SimulationConfig {
    /// Get total grid size (width * height).
    #[inline]
    pub fn grid_size(&self) -> usize {
        self.width * self.height
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.processes == 0 {
            return Err(ConfigError::InvalidProcessCount);
        }
        let topology = ProcessTopology::new(self.processes, 0)
            .map_err(|_| ConfigError::InvalidProcessCount)?;
        if topology.all_partitions(self.width, self.height).is_none() {
            return Err(ConfigError::Unpartitionable {
                width: self.width,
                height: self.height,
                columns: topology.width(),
                rows: topology.height(),
            });
        }
        self.seed.validate()?;
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Grid dimensions (width, height) must be non-zero")]
    InvalidDimensions,
    #[error("Process count must be non-zero")]
    InvalidProcessCount,
    #[error(
        "A {width}x{height} grid cannot be split over {columns}x{rows} processes without an empty partition"
    )]
    Unpartitionable {
        width: usize,
        height: usize,
        columns: usize,
        rows: usize,
    },
    #[error("Seed density {0} must lie in [0, 1]")]
    InvalidDensity(f64),
}
