//! Shared helpers: a frame-recording renderer and an unpartitioned reference.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use mesh_life::{
    compute::{Neighborhood, Rule},
    distributed::{CellPoint, RunSummary, launch},
    render::{RenderError, Renderer},
    schema::{OutputConfig, Pattern, RendererKind, Seed, SimulationConfig},
};

/// Keeps every frame it is given.
pub struct Recording(pub Arc<Mutex<Vec<Vec<CellPoint>>>>);

impl Renderer for Recording {
    fn render(&mut self, points: &[CellPoint], _tick: u64) -> Result<(), RenderError> {
        self.0.lock().unwrap().push(points.to_vec());
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<(), RenderError> {
        Ok(())
    }
}

/// Config seeded with literal cells and no output.
pub fn cells_config(
    width: usize,
    height: usize,
    processes: usize,
    ticks: u64,
    rule: Rule,
    cells: Vec<(usize, usize)>,
) -> SimulationConfig {
    SimulationConfig {
        width,
        height,
        ticks,
        processes,
        rule,
        seed: Seed {
            pattern: Pattern::Cells { cells },
        },
        output: OutputConfig {
            renderer: RendererKind::None,
            ..Default::default()
        },
    }
}

/// Launch `config` and return the summary with every frame as sorted `(x, y)` lists.
pub fn run_recorded(config: &SimulationConfig) -> (RunSummary, Vec<Vec<(usize, usize)>>) {
    let frames = Arc::new(Mutex::new(Vec::new()));
    let summary = launch(config, Box::new(Recording(Arc::clone(&frames)))).unwrap();
    let frames = frames.lock().unwrap();
    let frames = frames
        .iter()
        .enumerate()
        .map(|(tick, points)| {
            assert!(points.iter().all(|p| p.tick == tick as u64));
            let mut cells: Vec<_> = points.iter().map(|p| (p.x, p.y)).collect();
            cells.sort_by_key(|&(x, y)| (y, x));
            cells
        })
        .collect();
    (summary, frames)
}

/// One generation over the whole toroidal grid.
pub fn reference_step(cells: &[bool], width: usize, height: usize, rule: Rule) -> Vec<bool> {
    let convolution = rule.convolution();
    let mut next = vec![false; cells.len()];
    for y in 0..height {
        for x in 0..width {
            let mut neighborhood: Neighborhood = [false; 9];
            for dy in 0..3 {
                for dx in 0..3 {
                    let nx = (x + width + dx - 1) % width;
                    let ny = (y + height + dy - 1) % height;
                    neighborhood[dy * 3 + dx] = cells[ny * width + nx];
                }
            }
            next[y * width + x] = convolution(&neighborhood);
        }
    }
    next
}

/// Live cells of every generation `0..ticks` on the unpartitioned torus, sorted row-major.
pub fn reference_frames(config: &SimulationConfig) -> Vec<Vec<(usize, usize)>> {
    let (width, height) = (config.width, config.height);
    let mut cells = vec![false; width * height];
    for (x, y) in config.seed.pattern.cells().unwrap_or_default() {
        if x < width && y < height {
            cells[y * width + x] = true;
        }
    }

    let mut frames = Vec::new();
    for _ in 0..config.ticks {
        frames.push(live_of(&cells, width));
        cells = reference_step(&cells, width, height, config.rule);
    }
    frames.push(live_of(&cells, width));
    frames
}

fn live_of(cells: &[bool], width: usize) -> Vec<(usize, usize)> {
    cells
        .iter()
        .enumerate()
        .filter(|&(_, &alive)| alive)
        .map(|(i, _)| (i % width, i / width))
        .collect()
}
