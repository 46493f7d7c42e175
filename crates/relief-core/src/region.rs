//! Rectangular regions in grid coordinates.
//!
//! A [`Region`] addresses cells by `(row, col)` with the origin at the
//! top-left cell. Rows grow downward, columns to the right. Regions are
//! half-open: `row..row + rows`, `col..col + cols`.
//!
//! ```text
//! (0,0) ────────► col
//!   │
//!   │   ┌──────────┐
//!   │   │  Region  │
//!   │   └──────────┘
//!   ▼
//!  row
//! ```
//!
//! # Used By
//!
//! - [`crate::Grid::crop`] - sub-grid extraction
//! - `relief-compute` - tile partitioning and halo windows

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A rectangle defined by its top-left cell and its extent.
///
/// # Example
///
/// ```rust
/// use relief_core::Region;
///
/// let r = Region::new(2, 3, 10, 20);
/// assert_eq!(r.bottom(), 12);
/// assert_eq!(r.right(), 23);
/// assert!(r.contains(2, 3));
/// assert!(!r.contains(12, 3));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Region {
    /// Top row (inclusive).
    pub row: usize,
    /// Left column (inclusive).
    pub col: usize,
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
}

impl Region {
    /// Creates a region from origin and extent.
    #[inline]
    pub const fn new(row: usize, col: usize, rows: usize, cols: usize) -> Self {
        Self { row, col, rows, cols }
    }

    /// Region covering a whole `rows x cols` grid.
    #[inline]
    pub const fn from_shape(rows: usize, cols: usize) -> Self {
        Self::new(0, 0, rows, cols)
    }

    /// First row past the region (exclusive).
    #[inline]
    pub const fn bottom(&self) -> usize {
        self.row + self.rows
    }

    /// First column past the region (exclusive).
    #[inline]
    pub const fn right(&self) -> usize {
        self.col + self.cols
    }

    /// Number of cells.
    #[inline]
    pub const fn area(&self) -> usize {
        self.rows * self.cols
    }

    /// Returns `true` if either extent is zero.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Returns `true` if cell `(r, c)` lies inside the region.
    #[inline]
    pub const fn contains(&self, r: usize, c: usize) -> bool {
        r >= self.row && r < self.bottom() && c >= self.col && c < self.right()
    }

    /// Returns `true` if `other` lies entirely inside this region.
    #[inline]
    pub const fn contains_region(&self, other: &Region) -> bool {
        other.row >= self.row
            && other.col >= self.col
            && other.bottom() <= self.bottom()
            && other.right() <= self.right()
    }

    /// Intersection of two regions, `None` if they share no cell.
    ///
    /// ```rust
    /// use relief_core::Region;
    ///
    /// let a = Region::new(0, 0, 10, 10);
    /// let b = Region::new(5, 8, 10, 10);
    /// assert_eq!(a.intersect(&b), Some(Region::new(5, 8, 5, 2)));
    /// ```
    pub fn intersect(&self, other: &Region) -> Option<Region> {
        let row = self.row.max(other.row);
        let col = self.col.max(other.col);
        let bottom = self.bottom().min(other.bottom());
        let right = self.right().min(other.right());

        if row < bottom && col < right {
            Some(Region::new(row, col, bottom - row, right - col))
        } else {
            None
        }
    }
}
