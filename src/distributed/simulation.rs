//! The per-rank tick loop and the threaded launcher.

use std::thread;
use std::time::{Duration, Instant};

use crate::compute::{CellularGrid, GridError};
use crate::render::{RenderError, Renderer};
use crate::schema::{ConfigError, Seed, SimulationConfig};

use super::comm::{CommError, Communicator, ThreadComm};
use super::{Aggregator, HaloExchanger, Partition, ProcessTopology, TopologyError};

/// Rank that gathers frames and owns the renderer.
pub const COORDINATOR: usize = 0;

/// Errors that end a run.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),
    #[error("Communication error: {0}")]
    Comm(#[from] CommError),
    #[error("Grid error: {0}")]
    Grid(#[from] GridError),
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
    #[error("Rank {0} panicked")]
    RankPanicked(usize),
    #[error("Coordinator produced no summary")]
    MissingSummary,
}

/// Outcome of a run, reported by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    /// Generations rendered.
    pub ticks: u64,
    /// Live cells after the last generation.
    pub final_population: usize,
    /// Mean wall-clock time per tick, from the per-tick measurements.
    pub mean_tick: Duration,
    /// Wall-clock time of the whole loop, final population gather included.
    pub elapsed: Duration,
}

/// One rank's share of a run.
pub struct Simulation<'c, C: Communicator + ?Sized> {
    comm: &'c C,
    topology: ProcessTopology,
    partition: Partition,
    grid: CellularGrid,
    exchanger: HaloExchanger,
    aggregator: Aggregator,
    ticks: u64,
    global_width: usize,
    global_height: usize,
    render_error: Option<RenderError>,
}

impl<'c, C: Communicator + ?Sized> Simulation<'c, C> {
    /// Size this rank's grid from the topology of `comm`.
    pub fn new(comm: &'c C, config: &SimulationConfig) -> Result<Self, SimulationError> {
        let topology = ProcessTopology::new(comm.size(), comm.rank())?;
        let partition = topology.partition(config.width, config.height).ok_or(
            ConfigError::Unpartitionable {
                width: config.width,
                height: config.height,
                columns: topology.width(),
                rows: topology.height(),
            },
        )?;

        if topology.rank() == COORDINATOR {
            log::info!(
                "{} ranks as {}x{} over a {}x{} grid",
                topology.size(),
                topology.width(),
                topology.height(),
                config.width,
                config.height
            );
        }
        log::debug!(
            "rank {} at ({}, {}) owns {}x{} from ({}, {})",
            topology.rank(),
            topology.coord_x(),
            topology.coord_y(),
            partition.width,
            partition.height,
            partition.origin_x,
            partition.origin_y
        );

        Ok(Self {
            comm,
            topology,
            partition,
            grid: CellularGrid::new(partition.width, partition.height, config.rule.convolution()),
            exchanger: HaloExchanger::new(&topology),
            aggregator: Aggregator::new(partition, COORDINATOR),
            ticks: config.ticks,
            global_width: config.width,
            global_height: config.height,
            render_error: None,
        })
    }

    #[inline]
    pub fn topology(&self) -> &ProcessTopology {
        &self.topology
    }

    #[inline]
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    #[inline]
    pub fn grid(&self) -> &CellularGrid {
        &self.grid
    }

    #[inline]
    pub fn is_coordinator(&self) -> bool {
        self.topology.rank() == COORDINATOR
    }

    /// Populate the owned cells. Returns the live cells this rank received.
    pub fn seed(&mut self, seed: &Seed) -> usize {
        seed.apply(
            &mut self.grid,
            &self.partition,
            self.topology.rank(),
            self.global_width,
            self.global_height,
        )
    }

    /// Run one tick: aggregate and render, exchange halos, step, barrier.
    ///
    /// On the coordinator, returns the live cells rendered for `tick`. A render
    /// failure is kept and surfaced by [`Simulation::run`]; the coordinator keeps
    /// taking part in every collective so the other ranks are never stranded.
    pub fn tick(
        &mut self,
        tick: u64,
        renderer: Option<&mut (dyn Renderer + '_)>,
    ) -> Result<Option<usize>, SimulationError> {
        let Self {
            comm,
            grid,
            exchanger,
            aggregator,
            render_error,
            ..
        } = self;

        let frame = aggregator.aggregate(*comm, grid, tick, |frame| {
            let Some(renderer) = renderer else {
                return;
            };
            if render_error.is_some() {
                return;
            }
            if let Err(err) = renderer.render(&frame.points, frame.tick) {
                log::error!("Rendering tick {} failed: {}", frame.tick, err);
                *render_error = Some(err);
            }
        })?;

        exchanger.exchange(*comm, grid)?;
        grid.step()?;
        if log::log_enabled!(log::Level::Trace) {
            log::trace!(
                "Rank {} after tick {}:\n{}",
                comm.rank(),
                tick,
                grid.render_text('#', '.')
            );
        }
        comm.barrier()?;

        Ok(frame.map(|frame| frame.total()))
    }

    /// Run every configured tick. The coordinator returns the summary.
    pub fn run(
        &mut self,
        mut renderer: Option<&mut (dyn Renderer + '_)>,
    ) -> Result<Option<RunSummary>, SimulationError> {
        let start = Instant::now();
        let mut ticking = Duration::ZERO;

        for tick in 0..self.ticks {
            let tick_start = Instant::now();
            let live = self.tick(tick, renderer.as_deref_mut())?;
            let took = tick_start.elapsed();
            ticking += took;
            if let Some(live) = live {
                log::debug!("tick {}: {} live, {:?}", tick, live, took);
            }
        }

        // Population after the last step needs one more gather on every rank.
        let last = self.aggregator.gather(self.comm, &self.grid, self.ticks)?;

        if let Some(err) = self.render_error.take() {
            return Err(err.into());
        }

        let Some(frame) = last else {
            return Ok(None);
        };

        let elapsed = start.elapsed();
        let summary = RunSummary {
            ticks: self.ticks,
            final_population: frame.total(),
            mean_tick: if self.ticks == 0 {
                Duration::ZERO
            } else {
                ticking.div_f64(self.ticks as f64)
            },
            elapsed,
        };
        log::info!(
            "{} ticks in {:.2?} ({:.2?} per tick), {} live at the end",
            summary.ticks,
            summary.elapsed,
            summary.mean_tick,
            summary.final_population
        );
        Ok(Some(summary))
    }
}

/// Seed and run one rank; the coordinator also drives and releases `renderer`.
fn run_rank(
    comm: ThreadComm,
    config: &SimulationConfig,
    renderer: Option<Box<dyn Renderer>>,
) -> Result<Option<RunSummary>, SimulationError> {
    let mut simulation = Simulation::new(&comm, config)?;
    simulation.seed(&config.seed);

    match renderer {
        Some(mut renderer) => {
            let summary = simulation.run(Some(&mut *renderer));
            let released = renderer.finish();
            let summary = summary?;
            released?;
            Ok(summary)
        }
        None => simulation.run(None),
    }
}

/// Run `config` with one thread per rank and return the coordinator's summary.
///
/// `renderer` is handed to the coordinator and released when its loop ends.
pub fn launch(
    config: &SimulationConfig,
    renderer: Box<dyn Renderer>,
) -> Result<RunSummary, SimulationError> {
    config.validate()?;

    let comms = ThreadComm::create(config.processes);
    let mut renderer = Some(renderer);

    let results: Vec<Result<Option<RunSummary>, SimulationError>> = thread::scope(|scope| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                let rank = comm.rank();
                let renderer = if rank == COORDINATOR {
                    renderer.take()
                } else {
                    None
                };
                (rank, scope.spawn(move || run_rank(comm, config, renderer)))
            })
            .collect();

        handles
            .into_iter()
            .map(|(rank, handle)| {
                handle
                    .join()
                    .unwrap_or(Err(SimulationError::RankPanicked(rank)))
            })
            .collect()
    });

    let mut summary = None;
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(Some(rank_summary)) => summary = Some(rank_summary),
            Ok(None) => {}
            Err(err) => failures.push(err),
        }
    }

    // A failing rank makes its peers fail on hang-ups; report the first cause.
    if let Some(pos) = failures.iter().position(|err| !is_hang_up(err)) {
        return Err(failures.swap_remove(pos));
    }
    if let Some(err) = failures.into_iter().next() {
        return Err(err);
    }
    summary.ok_or(SimulationError::MissingSummary)
}

/// Whether `err` only reflects another rank having left the run.
fn is_hang_up(err: &SimulationError) -> bool {
    matches!(
        err,
        SimulationError::Comm(CommError::Disconnected { .. } | CommError::BarrierBroken)
    )
}
