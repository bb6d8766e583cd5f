//! Flat bounds-checked boolean storage.

/// Errors raised by grid accessors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("Coordinate ({x}, {y}) is outside the grid")]
    OutOfRange { x: i64, y: i64 },
    #[error("Expected {expected} values, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("Wall buffer must hold {expected} cells, got {actual}")]
    WallLength { expected: usize, actual: usize },
}

/// Row-major 2D bit storage.
///
/// Indexing: `y * width + x`. Every read and write is bounds-checked; an
/// out-of-range access is reported, never wrapped or clamped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitGrid {
    cells: Vec<bool>,
    width: usize,
    height: usize,
}

impl BitGrid {
    /// Create a zero-initialized grid.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            cells: vec![false; width * height],
            width,
            height,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Total number of cells (width * height).
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    fn index(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }

    /// Read the bit at (x, y). Returns `None` outside `[0,width) x [0,height)`.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<bool> {
        self.index(x, y).map(|i| self.cells[i])
    }

    /// Write the bit at (x, y).
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: bool) -> Result<(), GridError> {
        let i = self.index(x, y).ok_or(GridError::OutOfRange {
            x: x as i64,
            y: y as i64,
        })?;
        self.cells[i] = value;
        Ok(())
    }

    /// Replace the whole contents. `values` must hold exactly `width * height` cells.
    pub fn set_all(&mut self, values: &[bool]) -> Result<(), GridError> {
        if values.len() != self.cells.len() {
            return Err(GridError::LengthMismatch {
                expected: self.cells.len(),
                actual: values.len(),
            });
        }
        self.cells.copy_from_slice(values);
        Ok(())
    }

    /// Turn on every listed point. Returns the number of points that fell outside.
    pub fn set_points(&mut self, points: &[(usize, usize)]) -> usize {
        points
            .iter()
            .filter(|&&(x, y)| self.set(x, y, true).is_err())
            .count()
    }

    /// Count live cells.
    pub fn count_ones(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    /// Raw row-major view.
    #[inline]
    pub fn as_slice(&self) -> &[bool] {
        &self.cells
    }
}
