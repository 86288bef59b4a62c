//! Grid value type for puzzle cells.
//!
//! A [`Grid`] is a rectangular 2-D array of symbol codes (small integers,
//! 0 meaning "empty"). All construction paths validate the rectangle
//! invariant, so a `Grid` held anywhere in the crate is always well-formed:
//! at least 1×1, every row the same length.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from grid construction and cell access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("grid must have at least one row and one column")]
    Empty,

    #[error("grid rows must all have the same length (row {row} has {found} cells, expected {expected})")]
    RaggedRows {
        row: usize,
        found: usize,
        expected: usize,
    },

    #[error("cell ({row}, {col}) is outside the {height}x{width} grid")]
    OutOfBounds {
        row: usize,
        col: usize,
        height: usize,
        width: usize,
    },

    #[error("grid dimensions must be positive, got {height}x{width}")]
    ZeroDimension { height: usize, width: usize },
}

/// A rectangular grid of symbol codes.
///
/// Serializes as nested arrays (`[[0,1],[2,3]]`), the shape used by the
/// ARC task files; deserialization re-validates the rectangle invariant so
/// malformed payloads are rejected at the serde boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<u8>>", into = "Vec<Vec<u8>>")]
pub struct Grid {
    rows: Vec<Vec<u8>>,
}

impl Grid {
    /// Build a grid from nested rows, validating the rectangle invariant.
    pub fn from_rows(rows: Vec<Vec<u8>>) -> Result<Self, GridError> {
        if rows.is_empty() || rows[0].is_empty() {
            return Err(GridError::Empty);
        }
        let expected = rows[0].len();
        for (row, cells) in rows.iter().enumerate() {
            if cells.len() != expected {
                return Err(GridError::RaggedRows {
                    row,
                    found: cells.len(),
                    expected,
                });
            }
        }
        Ok(Self { rows })
    }

    /// Build an all-zero grid with the given dimensions.
    pub fn zeros(height: usize, width: usize) -> Result<Self, GridError> {
        if height == 0 || width == 0 {
            return Err(GridError::ZeroDimension { height, width });
        }
        Ok(Self {
            rows: vec![vec![0; width]; height],
        })
    }

    /// Build an all-zero grid shaped like `other`.
    pub fn zeros_like(other: &Grid) -> Self {
        // `other` already satisfies the invariant, so this cannot fail.
        Self {
            rows: vec![vec![0; other.width()]; other.height()],
        }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.rows[0].len()
    }

    /// Borrow the underlying rows.
    pub fn rows(&self) -> &[Vec<u8>] {
        &self.rows
    }

    /// Read a single cell.
    pub fn get(&self, row: usize, col: usize) -> Result<u8, GridError> {
        self.check_bounds(row, col)?;
        Ok(self.rows[row][col])
    }

    /// Write a single cell.
    pub fn set(&mut self, row: usize, col: usize, value: u8) -> Result<(), GridError> {
        self.check_bounds(row, col)?;
        self.rows[row][col] = value;
        Ok(())
    }

    /// Copy cells from `source`'s top-left origin into this grid.
    ///
    /// Only positions that exist in both grids are copied
    /// (`min(height, source.height) × min(width, source.width)`); the
    /// clip is silent and the remaining cells are left untouched.
    pub fn copy_clipped_from(&mut self, source: &Grid) {
        let copy_h = self.height().min(source.height());
        let copy_w = self.width().min(source.width());
        for i in 0..copy_h {
            for j in 0..copy_w {
                self.rows[i][j] = source.rows[i][j];
            }
        }
    }

    fn check_bounds(&self, row: usize, col: usize) -> Result<(), GridError> {
        if row >= self.height() || col >= self.width() {
            return Err(GridError::OutOfBounds {
                row,
                col,
                height: self.height(),
                width: self.width(),
            });
        }
        Ok(())
    }
}

impl TryFrom<Vec<Vec<u8>>> for Grid {
    type Error = GridError;

    fn try_from(rows: Vec<Vec<u8>>) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

impl From<Grid> for Vec<Vec<u8>> {
    fn from(grid: Grid) -> Self {
        grid.rows
    }
}
