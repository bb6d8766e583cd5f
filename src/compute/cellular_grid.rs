//! Haloed cellular grid.
//!
//! A [`CellularGrid`] owns an `inner_width x inner_height` block of cells surrounded
//! by a one-cell ghost border. Logical coordinates address the owned block from
//! `(0, 0)`; the border sits at `-1` and `inner_dim`. Storage coordinates are
//! logical + 1.

use std::fmt::Write as _;

use rayon::prelude::*;

use super::{BitGrid, Convolution, GridError, Neighborhood};

/// One of the four edges of a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    North,
    East,
    South,
    West,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::North, Side::East, Side::South, Side::West];

    /// The side facing this one across a partition boundary.
    pub fn opposite(self) -> Side {
        match self {
            Side::North => Side::South,
            Side::East => Side::West,
            Side::South => Side::North,
            Side::West => Side::East,
        }
    }

    /// Unit offset in topology coordinates (y grows southward).
    pub fn offset(self) -> (i64, i64) {
        match self {
            Side::North => (0, -1),
            Side::East => (1, 0),
            Side::South => (0, 1),
            Side::West => (-1, 0),
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Owned cells plus ghost border and the rule that advances them.
#[derive(Clone)]
pub struct CellularGrid {
    grid: BitGrid,
    convolution: Convolution,
    inner_width: usize,
    inner_height: usize,
}

impl std::fmt::Debug for CellularGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CellularGrid")
            .field("inner_width", &self.inner_width)
            .field("inner_height", &self.inner_height)
            .field("live", &self.live_count())
            .finish()
    }
}

impl CellularGrid {
    /// Create an empty grid owning `inner_width x inner_height` cells.
    pub fn new(inner_width: usize, inner_height: usize, convolution: Convolution) -> Self {
        Self {
            grid: BitGrid::new(inner_width + 2, inner_height + 2),
            convolution,
            inner_width,
            inner_height,
        }
    }

    #[inline]
    pub fn inner_width(&self) -> usize {
        self.inner_width
    }

    #[inline]
    pub fn inner_height(&self) -> usize {
        self.inner_height
    }

    /// Map a logical coordinate to storage, if it lies within `[-1, inner_dim]`.
    #[inline]
    fn storage(&self, x: i64, y: i64) -> Option<(usize, usize)> {
        let in_range = x >= -1
            && y >= -1
            && x <= self.inner_width as i64
            && y <= self.inner_height as i64;
        in_range.then(|| ((x + 1) as usize, (y + 1) as usize))
    }

    /// Read a cell, halo included. `None` outside the haloed window.
    #[inline]
    pub fn get(&self, x: i64, y: i64) -> Option<bool> {
        let (sx, sy) = self.storage(x, y)?;
        self.grid.get(sx, sy)
    }

    /// Write a cell, halo included.
    #[inline]
    pub fn set(&mut self, x: i64, y: i64, value: bool) -> Result<(), GridError> {
        let (sx, sy) = self.storage(x, y).ok_or(GridError::OutOfRange { x, y })?;
        self.grid.set(sx, sy, value)
    }

    /// Length of the wall buffer exchanged across `side` (edge plus both corners).
    #[inline]
    pub fn wall_len(&self, side: Side) -> usize {
        match side {
            Side::North | Side::South => self.inner_width + 2,
            Side::East | Side::West => self.inner_height + 2,
        }
    }

    /// Extract the outermost owned row or column on `side`, corners included.
    pub fn get_wall(&self, side: Side) -> Vec<bool> {
        let w = self.inner_width as i64;
        let h = self.inner_height as i64;
        let read = |x: i64, y: i64| self.get(x, y).unwrap_or(false);
        match side {
            Side::North => (-1..=w).map(|x| read(x, 0)).collect(),
            Side::South => (-1..=w).map(|x| read(x, h - 1)).collect(),
            Side::West => (-1..=h).map(|y| read(0, y)).collect(),
            Side::East => (-1..=h).map(|y| read(w - 1, y)).collect(),
        }
    }

    /// Install a received wall into the ghost row or column on `side`.
    pub fn set_wall(&mut self, side: Side, values: &[bool]) -> Result<(), GridError> {
        let expected = self.wall_len(side);
        if values.len() != expected {
            return Err(GridError::WallLength {
                expected,
                actual: values.len(),
            });
        }
        let w = self.inner_width as i64;
        let h = self.inner_height as i64;
        for (i, &value) in values.iter().enumerate() {
            let t = i as i64 - 1;
            let (x, y) = match side {
                Side::North => (t, -1),
                Side::South => (t, h),
                Side::West => (-1, t),
                Side::East => (w, t),
            };
            self.set(x, y, value)?;
        }
        Ok(())
    }

    /// Gather the 3x3 neighborhood around owned cell (x, y).
    #[inline]
    fn neighborhood(&self, x: usize, y: usize) -> Neighborhood {
        // Storage (x, y) is the window's top-left corner.
        let mut n = [false; 9];
        let cells = self.grid.as_slice();
        let stride = self.grid.width();
        for dy in 0..3 {
            let row = (y + dy) * stride;
            for dx in 0..3 {
                n[dy * 3 + dx] = cells[row + x + dx];
            }
        }
        n
    }

    /// Advance every owned cell by one generation.
    ///
    /// Reads only the current grid (halo included) and assembles the next generation
    /// in a separate buffer that replaces the contents once all owned cells are
    /// computed. The halo keeps the old values until the next exchange overwrites them.
    pub fn step(&mut self) -> Result<(), GridError> {
        let width = self.inner_width;
        let stride = self.grid.width();

        let rows: Vec<Vec<bool>> = (0..self.inner_height)
            .into_par_iter()
            .map(|y| self.next_row(y, width))
            .collect();

        let mut next = self.grid.as_slice().to_vec();
        for (y, row) in rows.into_iter().enumerate() {
            let start = (y + 1) * stride + 1;
            next[start..start + width].copy_from_slice(&row);
        }

        self.grid.set_all(&next)
    }

    fn next_row(&self, y: usize, width: usize) -> Vec<bool> {
        (0..width)
            .map(|x| (self.convolution)(&self.neighborhood(x, y)))
            .collect()
    }

    /// Owned live cells as logical `(x, y)` in row-major order.
    pub fn live_cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.inner_height).flat_map(move |y| {
            (0..self.inner_width)
                .filter(move |&x| self.get(x as i64, y as i64) == Some(true))
                .map(move |x| (x, y))
        })
    }

    /// Number of owned live cells (halo excluded).
    pub fn live_count(&self) -> usize {
        self.live_cells().count()
    }

    /// Owned region as text, one line per row.
    pub fn render_text(&self, alive: char, dead: char) -> String {
        let mut out = String::with_capacity((self.inner_width + 1) * self.inner_height * 4);
        for y in 0..self.inner_height as i64 {
            for x in 0..self.inner_width as i64 {
                out.push(if self.get(x, y) == Some(true) { alive } else { dead });
            }
            let _ = writeln!(out);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::conway;

    fn grid_with(w: usize, h: usize, live: &[(i64, i64)]) -> CellularGrid {
        let mut grid = CellularGrid::new(w, h, conway);
        for &(x, y) in live {
            grid.set(x, y, true).unwrap();
        }
        grid
    }

    #[test]
    fn test_logical_window() {
        let mut grid = CellularGrid::new(3, 2, conway);
        assert_eq!(grid.get(-1, -1), Some(false));
        assert_eq!(grid.get(3, 2), Some(false));
        assert_eq!(grid.get(-2, 0), None);
        assert_eq!(grid.get(0, 3), None);
        assert!(grid.set(4, 0, true).is_err());
        assert!(grid.set(3, 2, true).is_ok());
    }

    #[test]
    fn test_halo_not_counted_as_live() {
        let grid = grid_with(3, 3, &[(-1, 0), (3, 3), (1, 1)]);
        assert_eq!(grid.live_count(), 1);
        assert_eq!(grid.live_cells().collect::<Vec<_>>(), vec![(1, 1)]);
    }

    #[test]
    fn test_get_wall_includes_corners() {
        // Halo cells (-1, 0) and (3, 0) are the north wall's corners.
        let grid = grid_with(3, 2, &[(0, 0), (2, 0), (-1, 0), (3, 0), (2, 1)]);

        assert_eq!(grid.get_wall(Side::North), vec![true, true, false, true, true]);
        assert_eq!(grid.get_wall(Side::South), vec![false, false, false, true, false]);
        assert_eq!(grid.get_wall(Side::West), vec![false, true, false, false]);
        assert_eq!(grid.get_wall(Side::East), vec![false, true, true, false]);
    }

    #[test]
    fn test_set_wall_fills_halo() {
        let mut grid = CellularGrid::new(2, 3, conway);
        grid.set_wall(Side::East, &[true, false, true, false, true]).unwrap();
        assert_eq!(grid.get(2, -1), Some(true));
        assert_eq!(grid.get(2, 1), Some(true));
        assert_eq!(grid.get(2, 3), Some(true));
        assert_eq!(grid.live_count(), 0);

        grid.set_wall(Side::North, &[true, true, true, true]).unwrap();
        assert_eq!(grid.get(-1, -1), Some(true));
        assert_eq!(grid.get(2, -1), Some(true));
    }

    #[test]
    fn test_set_wall_rejects_wrong_length() {
        let mut grid = CellularGrid::new(2, 3, conway);
        assert_eq!(
            grid.set_wall(Side::West, &[true; 4]),
            Err(GridError::WallLength {
                expected: 5,
                actual: 4
            })
        );
    }

    #[test]
    fn test_blinker_oscillates() {
        let mut grid = grid_with(5, 5, &[(1, 2), (2, 2), (3, 2)]);

        grid.step().unwrap();
        let vertical: Vec<_> = grid.live_cells().collect();
        assert_eq!(vertical, vec![(2, 1), (2, 2), (2, 3)]);

        grid.step().unwrap();
        let horizontal: Vec<_> = grid.live_cells().collect();
        assert_eq!(horizontal, vec![(1, 2), (2, 2), (3, 2)]);
    }

    #[test]
    fn test_step_is_double_buffered() {
        // An in-place update would kill (1, 0) before (1, 1) is evaluated.
        let mut grid = grid_with(3, 3, &[(0, 0), (1, 0), (2, 0)]);
        grid.step().unwrap();
        assert_eq!(grid.live_cells().collect::<Vec<_>>(), vec![(1, 0), (1, 1)]);
    }

    #[test]
    fn test_step_reads_halo() {
        // Three live halo cells west of (0, 1) give birth to it.
        let mut grid = CellularGrid::new(3, 3, conway);
        grid.set_wall(Side::West, &[false, true, true, true, false]).unwrap();
        grid.step().unwrap();
        assert_eq!(grid.get(0, 1), Some(true));
        assert_eq!(grid.get(0, 0), Some(false));
    }

    #[test]
    fn test_render_text() {
        let grid = grid_with(3, 2, &[(0, 0), (2, 1)]);
        assert_eq!(grid.render_text('#', '.'), "#..\n..#\n");
    }
}
