//! Row-major 2D numeric buffer.
//!
//! [`Grid`] is the raw numeric payload every relief-rs kernel reads and
//! writes: elevation values on input, illumination values on output. Cell
//! `(row, col)` lives at `data[row * cols + col]`.
//!
//! Grids may carry sentinel no-data values (`NaN`, `±inf`); nothing in this
//! module interprets them.
//!
//! # Example
//!
//! ```rust
//! use relief_core::Grid;
//!
//! let g = Grid::from_fn(3, 4, |r, c| (r * 10 + c) as f64);
//! assert_eq!(g.shape(), (3, 4));
//! assert_eq!(g[(2, 1)], 21.0);
//! assert_eq!(g.row(1), &[10.0, 11.0, 12.0, 13.0]);
//! ```

use std::ops::{Index, IndexMut};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Error, Region, Result};

/// Anything with a 2D `(rows, cols)` shape.
///
/// Implemented by [`Grid`] here and by the storage wrappers in
/// `relief-compute`, so a [`crate::Raster`] can validate its coordinates
/// without knowing where its data lives.
pub trait GridShape {
    /// `(rows, cols)`.
    fn shape(&self) -> (usize, usize);
}

/// Row-major 2D buffer.
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Grid<T> {
    data: Vec<T>,
    rows: usize,
    cols: usize,
}

impl<T> Grid<T> {
    /// Wraps row-major data.
    ///
    /// Fails with [`Error::BufferSizeMismatch`] if `data.len() != rows * cols`.
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        let expected = rows
            .checked_mul(cols)
            .ok_or_else(|| Error::InvalidDimensions(format!("{rows}x{cols} overflows")))?;
        if data.len() != expected {
            return Err(Error::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { data, rows, cols })
    }

    /// Builds a grid by evaluating `f(row, col)` for every cell.
    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                data.push(f(r, c));
            }
        }
        Self { data, rows, cols }
    }

    /// Number of rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Number of cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the grid has no cells.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Row-major cell data.
    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Mutable row-major cell data.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Cell reference, `None` outside the grid.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        if row < self.rows && col < self.cols {
            self.data.get(row * self.cols + col)
        } else {
            None
        }
    }

    /// One row as a slice.
    ///
    /// # Panics
    ///
    /// Panics if `row >= rows`.
    #[inline]
    pub fn row(&self, row: usize) -> &[T] {
        let start = row * self.cols;
        &self.data[start..start + self.cols]
    }

    /// Applies `f` to every cell, producing a grid of the same shape.
    pub fn map<U>(&self, f: impl Fn(&T) -> U) -> Grid<U> {
        Grid {
            data: self.data.iter().map(f).collect(),
            rows: self.rows,
            cols: self.cols,
        }
    }

    /// Full-grid region.
    #[inline]
    pub fn region(&self) -> Region {
        Region::from_shape(self.rows, self.cols)
    }
}

impl<T: Clone> Grid<T> {
    /// Grid with every cell set to `value`.
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self {
            data: vec![value; rows * cols],
            rows,
            cols,
        }
    }

    /// Copies `region` out into a new grid.
    ///
    /// Fails with [`Error::InvalidDimensions`] if the region leaves the grid.
    pub fn crop(&self, region: Region) -> Result<Self> {
        if !self.region().contains_region(&region) {
            return Err(Error::InvalidDimensions(format!(
                "region {:?} exceeds {}x{} grid",
                region, self.rows, self.cols
            )));
        }
        let mut data = Vec::with_capacity(region.area());
        for r in region.row..region.bottom() {
            let start = r * self.cols + region.col;
            data.extend_from_slice(&self.data[start..start + region.cols]);
        }
        Ok(Self {
            data,
            rows: region.rows,
            cols: region.cols,
        })
    }
}

impl<T> GridShape for Grid<T> {
    fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }
}

impl<T> Index<(usize, usize)> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, (row, col): (usize, usize)) -> &T {
        assert!(row < self.rows && col < self.cols, "cell ({row}, {col}) out of bounds");
        &self.data[row * self.cols + col]
    }
}

impl<T> IndexMut<(usize, usize)> for Grid<T> {
    #[inline]
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut T {
        assert!(row < self.rows && col < self.cols, "cell ({row}, {col}) out of bounds");
        &mut self.data[row * self.cols + col]
    }
}

impl<T> std::fmt::Debug for Grid<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grid")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vec_size_mismatch() {
        let err = Grid::from_vec(vec![0.0f64; 5], 2, 3).unwrap_err();
        assert!(matches!(err, Error::BufferSizeMismatch { expected: 6, actual: 5 }));
    }

    #[test]
    fn test_index() {
        let mut g = Grid::filled(2, 3, 0.0f64);
        g[(1, 2)] = 7.0;
        assert_eq!(g.data()[5], 7.0);
        assert_eq!(g.get(1, 2), Some(&7.0));
        assert_eq!(g.get(2, 0), None);
    }

    #[test]
    fn test_crop() {
        let g = Grid::from_fn(4, 5, |r, c| (r * 5 + c) as f64);
        let sub = g.crop(Region::new(1, 2, 2, 3)).unwrap();
        assert_eq!(sub.shape(), (2, 3));
        assert_eq!(sub.row(0), &[7.0, 8.0, 9.0]);
        assert_eq!(sub.row(1), &[12.0, 13.0, 14.0]);

        assert!(g.crop(Region::new(3, 0, 2, 1)).is_err());
    }

    #[test]
    fn test_map_keeps_shape() {
        let g = Grid::from_fn(3, 2, |r, c| (r + c) as f64);
        let m = g.map(|v| *v as f32 * 2.0);
        assert_eq!(m.shape(), (3, 2));
        assert_eq!(m[(2, 1)], 6.0f32);
    }

    #[test]
    fn test_empty_grid() {
        let g: Grid<f64> = Grid::from_vec(Vec::new(), 0, 7).unwrap();
        assert!(g.is_empty());
        assert_eq!(g.shape(), (0, 7));
    }
}
