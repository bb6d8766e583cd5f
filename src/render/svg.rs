//! Animated SVG output.
//!
//! Every generation gets a zero-size anchor rect whose `<animate id="gen{t}">`
//! begins when the previous generation ends; generation 0 also restarts after the
//! last one, so the file loops. Live cells of generation `t` are 1x1 rects whose
//! width animates to 1 for the duration of `gen{t}`.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::{RenderError, Renderer};
use crate::distributed::CellPoint;

/// SVG animation settings.
#[derive(Debug, Clone, Copy)]
pub struct SvgOptions {
    /// Display time of one generation.
    pub frame_duration: Duration,
    /// Number of generations that will be rendered; closes the animation loop.
    pub total_ticks: u64,
}

impl Default for SvgOptions {
    fn default() -> Self {
        Self {
            frame_duration: Duration::from_millis(20),
            total_ticks: 1,
        }
    }
}

/// Writes one animated SVG per run.
///
/// Usage:
/// ```ignore
/// let mut svg = SvgRenderer::create("./output", 100, 50, SvgOptions::default())?;
/// svg.render(&points, 0)?;
/// Box::new(svg).finish()?;
/// ```
pub struct SvgRenderer {
    writer: BufWriter<File>,
    path: PathBuf,
    width: usize,
    height: usize,
    options: SvgOptions,
    frames_written: u64,
}

impl SvgRenderer {
    /// Create `<dir>/automata_<width>x<height>_<unix seconds>.svg` and write the header.
    pub fn create<P: AsRef<Path>>(
        dir: P,
        width: usize,
        height: usize,
        options: SvgOptions,
    ) -> Result<Self, RenderError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let path = dir.join(format!("automata_{}x{}_{}.svg", width, height, stamp));
        Self::create_at(path, width, height, options)
    }

    /// Create the SVG at an explicit path.
    pub fn create_at<P: AsRef<Path>>(
        path: P,
        width: usize,
        height: usize,
        options: SvgOptions,
    ) -> Result<Self, RenderError> {
        let path = path.as_ref().to_path_buf();
        let mut writer = BufWriter::new(File::create(&path)?);

        writeln!(
            writer,
            "<svg version='1.1' viewBox='0 0 {} {}' xmlns='http://www.w3.org/2000/svg'>",
            width, height
        )?;
        writeln!(
            writer,
            "<rect width='{}' height='{}' x='0' y='0' fill='white'/>",
            width, height
        )?;

        log::info!("Writing SVG animation to {}", path.display());

        Ok(Self {
            writer,
            path,
            width,
            height,
            options,
            frames_written: 0,
        })
    }

    /// Output file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Generations written so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    fn begin_of(&self, tick: u64) -> String {
        if tick == 0 {
            let last = self.options.total_ticks.saturating_sub(1);
            format!("0s;gen{}.end", last)
        } else {
            format!("gen{}.end", tick - 1)
        }
    }
}

impl Renderer for SvgRenderer {
    fn render(&mut self, points: &[CellPoint], tick: u64) -> Result<(), RenderError> {
        let dur = format!("{}ms", self.options.frame_duration.as_millis());

        writeln!(
            self.writer,
            "<rect width='0' height='0'><animate id='gen{}' attributeName='width' values='0' begin='{}' dur='{}'/></rect>",
            tick,
            self.begin_of(tick),
            dur
        )?;

        for point in points {
            if point.x >= self.width || point.y >= self.height {
                return Err(RenderError::OutOfFrame {
                    x: point.x,
                    y: point.y,
                    width: self.width,
                    height: self.height,
                });
            }
            writeln!(
                self.writer,
                "<rect width='0' height='1' x='{}' y='{}' fill='black'><animate attributeName='width' values='1' begin='gen{}.begin' dur='{}'/></rect>",
                point.x, point.y, tick, dur
            )?;
        }

        self.frames_written += 1;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<(), RenderError> {
        writeln!(self.writer, "</svg>")?;
        self.writer.flush()?;
        log::info!(
            "Wrote {} generations to {}",
            self.frames_written,
            self.path.display()
        );
        Ok(())
    }
}
