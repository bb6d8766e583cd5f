//! Live terminal display.

use std::io::{Stdout, Write};
use std::thread;
use std::time::Duration;

use super::{RenderError, Renderer};
use crate::compute::BitGrid;
use crate::distributed::CellPoint;

const CLEAR: &str = "\x1b[1;1H\x1b[2J";
const ALIVE: char = '\u{2B1B}';
const DEAD: char = '\u{2B1C}';

/// Redraws the whole global grid on every tick.
pub struct TerminalRenderer<W: Write + Send = Stdout> {
    out: W,
    frame: BitGrid,
    interval: Duration,
}

impl<W: Write + Send> TerminalRenderer<W> {
    /// Draw a `width x height` grid to `out`, pausing `interval` after each frame.
    pub fn create(out: W, width: usize, height: usize, interval: Duration) -> Self {
        Self {
            out,
            frame: BitGrid::new(width, height),
            interval,
        }
    }

    /// Rasterize `points` into the frame buffer.
    fn rasterize(&mut self, points: &[CellPoint]) -> Result<(), RenderError> {
        let (width, height) = (self.frame.width(), self.frame.height());
        let coords: Vec<_> = points.iter().map(|p| (p.x, p.y)).collect();
        let mut frame = BitGrid::new(width, height);
        if frame.set_points(&coords) > 0 {
            let (x, y) = coords
                .into_iter()
                .find(|&(x, y)| x >= width || y >= height)
                .unwrap_or_default();
            return Err(RenderError::OutOfFrame { x, y, width, height });
        }
        self.frame = frame;
        Ok(())
    }

    /// Write the current frame buffer without clearing or pausing.
    fn draw(&mut self, tick: u64, live: usize) -> Result<(), RenderError> {
        let width = self.frame.width();
        let mut text = String::with_capacity((width * 3 + 1) * self.frame.height());
        for row in self.frame.as_slice().chunks(width.max(1)) {
            text.extend(row.iter().map(|&alive| if alive { ALIVE } else { DEAD }));
            text.push('\n');
        }
        write!(self.out, "{}", text)?;
        writeln!(self.out, "tick {} - {} live", tick, live)?;
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> Renderer for TerminalRenderer<W> {
    fn render(&mut self, points: &[CellPoint], tick: u64) -> Result<(), RenderError> {
        self.rasterize(points)?;
        write!(self.out, "{}", CLEAR)?;
        self.draw(tick, points.len())?;
        if !self.interval.is_zero() {
            thread::sleep(self.interval);
        }
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<(), RenderError> {
        self.out.flush()?;
        Ok(())
    }
}
