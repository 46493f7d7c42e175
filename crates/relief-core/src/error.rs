//! Error types for relief-core operations.
//!
//! # Usage
//!
//! ```rust
//! use relief_core::{Error, Result};
//!
//! fn check(row: usize, col: usize, rows: usize, cols: usize) -> Result<()> {
//!     if row >= rows || col >= cols {
//!         return Err(Error::OutOfBounds { row, col, rows, cols });
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or slicing grids and rasters.
#[derive(Debug, Error)]
pub enum Error {
    /// Buffer length does not match `rows * cols`.
    #[error("buffer size mismatch: expected {expected}, got {actual}")]
    BufferSizeMismatch {
        /// Expected element count.
        expected: usize,
        /// Actual element count.
        actual: usize,
    },

    /// Cell coordinates are outside the grid.
    #[error("cell ({row}, {col}) out of bounds for {rows}x{cols} grid")]
    OutOfBounds {
        /// Row index.
        row: usize,
        /// Column index.
        col: usize,
        /// Grid rows.
        rows: usize,
        /// Grid columns.
        cols: usize,
    },

    /// Invalid or inconsistent dimensions.
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// Coordinate vector length does not match the dimension it labels.
    #[error("coordinate '{dim}' has {actual} values, dimension has {expected}")]
    CoordLengthMismatch {
        /// Dimension name.
        dim: String,
        /// Dimension length.
        expected: usize,
        /// Coordinate length.
        actual: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::BufferSizeMismatch { expected: 12, actual: 10 };
        assert_eq!(err.to_string(), "buffer size mismatch: expected 12, got 10");

        let err = Error::OutOfBounds { row: 5, col: 1, rows: 4, cols: 4 };
        assert!(err.to_string().contains("(5, 1)"));
    }
}
