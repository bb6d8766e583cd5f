//! Rendering backends for aggregated frames.
//!
//! A renderer is acquired once before the run, receives every tick's global
//! live-cell set on the coordinator, and is released with [`Renderer::finish`].
//!
//! # Backends
//!
//! | Backend | Output |
//! |---------|--------|
//! | [`SvgRenderer`] | One animated SVG, one generation per `dur` step |
//! | [`TerminalRenderer`] | Live redraw of the whole grid on a terminal |
//! | [`NullRenderer`] | Nothing |

mod svg;
mod terminal;

use std::io;
use std::time::Duration;

use crate::distributed::CellPoint;
use crate::schema::{OutputConfig, RendererKind, SimulationConfig};

pub use svg::{SvgOptions, SvgRenderer};
pub use terminal::TerminalRenderer;

/// Rendering failures.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Point ({x}, {y}) lies outside the {width}x{height} frame")]
    OutOfFrame {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },
}

/// Consumer of one tick's global live-cell set.
pub trait Renderer: Send {
    /// Draw the live cells of `tick`.
    fn render(&mut self, points: &[CellPoint], tick: u64) -> Result<(), RenderError>;

    /// Release the output resource.
    fn finish(self: Box<Self>) -> Result<(), RenderError>;
}

/// Renderer that discards every frame.
#[derive(Debug, Default)]
pub struct NullRenderer;

impl NullRenderer {
    pub fn create() -> Self {
        Self
    }
}

impl Renderer for NullRenderer {
    fn render(&mut self, _points: &[CellPoint], _tick: u64) -> Result<(), RenderError> {
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<(), RenderError> {
        Ok(())
    }
}

/// Acquire the renderer selected by `config.output`.
pub fn open_renderer(config: &SimulationConfig) -> Result<Box<dyn Renderer>, RenderError> {
    let OutputConfig {
        renderer,
        path,
        frame_interval_ms,
    } = &config.output;
    let interval = Duration::from_millis(*frame_interval_ms);

    let renderer: Box<dyn Renderer> = match renderer {
        RendererKind::Svg => Box::new(SvgRenderer::create(
            path,
            config.width,
            config.height,
            SvgOptions {
                frame_duration: interval,
                total_ticks: config.ticks,
            },
        )?),
        RendererKind::Terminal => Box::new(TerminalRenderer::create(
            io::stdout(),
            config.width,
            config.height,
            interval,
        )),
        RendererKind::None => Box::new(NullRenderer::create()),
    };
    Ok(renderer)
}
