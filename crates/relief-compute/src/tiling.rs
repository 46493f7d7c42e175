//! Tiling for grids processed piece by piece.
//!
//! A tile is a disjoint core region of the output. To compute it, the host
//! kernel runs over the core expanded by [`HALO`] cells on every side; halo
//! cells that fall outside the grid are `NaN`, so a core cell on the grid
//! edge comes out undefined exactly as in a whole-grid run. After the kernel
//! the halo is trimmed and the cores are scattered back into one grid.
//!
//! ```text
//!   +-------------------+
//!   | halo (1 cell)     |
//!   |  +-------------+  |
//!   |  |    core     |  |
//!   |  +-------------+  |
//!   +-------------------+
//! ```

use rayon::prelude::*;
use relief_core::{Grid, Region};

use crate::memory::{BYTES_PER_CELL, TILE_OVERHEAD};
use crate::{ComputeError, ComputeResult};

/// Stencil reach of the kernel in cells.
pub const HALO: usize = 1;

/// Smallest automatically chosen tile edge.
pub const MIN_TILE: usize = 256;

/// Split a `rows x cols` grid into disjoint tiles, row-major.
///
/// Edge tiles are clipped to the grid.
pub fn generate_tiles(rows: usize, cols: usize, tile_rows: usize, tile_cols: usize) -> Vec<Region> {
    let tile_rows = tile_rows.max(1);
    let tile_cols = tile_cols.max(1);
    let mut tiles = Vec::new();

    let mut r = 0;
    while r < rows {
        let th = tile_rows.min(rows - r);
        let mut c = 0;
        while c < cols {
            let tw = tile_cols.min(cols - c);
            tiles.push(Region::new(r, c, th, tw));
            c += tile_cols;
        }
        r += tile_rows;
    }
    tiles
}

/// Calculate a square tile edge from a memory budget.
///
/// Power of two, at least [`MIN_TILE`], never larger than the grid.
pub fn optimal_tile_size(rows: usize, cols: usize, budget: u64) -> (usize, usize) {
    let max_tile_bytes = (budget as f64 / TILE_OVERHEAD) as u64;
    let max_edge = ((max_tile_bytes / BYTES_PER_CELL) as f64).sqrt() as usize;
    let edge = round_down_pow2(max_edge).max(MIN_TILE);
    (edge.min(rows).max(1), edge.min(cols).max(1))
}

fn round_down_pow2(n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    1 << (usize::BITS - 1 - n.leading_zeros())
}

/// Random-access source of elevation cells.
pub trait TileSource: Sync {
    /// `(rows, cols)` of the whole grid.
    fn shape(&self) -> (usize, usize);

    /// Copy `region` into `dst` with its top-left cell at `(dst_row, dst_col)`.
    ///
    /// `region` lies inside the grid.
    fn copy_region(&self, region: Region, dst: &mut Grid<f64>, dst_row: usize, dst_col: usize);

    /// Core expanded by [`HALO`], cells outside the grid set to `NaN`.
    fn read_window(&self, core: Region) -> Grid<f64> {
        let (rows, cols) = self.shape();
        let mut window = Grid::filled(core.rows + 2 * HALO, core.cols + 2 * HALO, f64::NAN);

        let top = core.row.saturating_sub(HALO);
        let left = core.col.saturating_sub(HALO);
        let wanted = Region::new(top, left, core.bottom() + HALO - top, core.right() + HALO - left);
        if let Some(inside) = wanted.intersect(&Region::from_shape(rows, cols)) {
            let dst_row = inside.row + HALO - core.row;
            let dst_col = inside.col + HALO - core.col;
            self.copy_region(inside, &mut window, dst_row, dst_col);
        }
        window
    }
}

impl TileSource for Grid<f64> {
    fn shape(&self) -> (usize, usize) {
        Grid::shape(self)
    }

    fn copy_region(&self, region: Region, dst: &mut Grid<f64>, dst_row: usize, dst_col: usize) {
        let dst_cols = dst.cols();
        let out = dst.data_mut();
        for r in 0..region.rows {
            let src = &self.row(region.row + r)[region.col..region.right()];
            let start = (dst_row + r) * dst_cols + dst_col;
            out[start..start + region.cols].copy_from_slice(src);
        }
    }
}

/// Strip [`HALO`] cells from every side of a kernel result.
pub fn trim_halo(result: &Grid<f64>) -> ComputeResult<Grid<f64>> {
    let (rows, cols) = result.shape();
    if rows < 2 * HALO || cols < 2 * HALO {
        return Err(ComputeError::OperationFailed(format!(
            "{rows}x{cols} result is smaller than its halo"
        )));
    }
    Ok(result.crop(Region::new(HALO, HALO, rows - 2 * HALO, cols - 2 * HALO))?)
}

/// Reassemble disjoint tile results into a `rows x cols` grid.
///
/// Rows are written in parallel; each output cell is written by at most one
/// piece. Cells no piece covers stay `NaN`.
pub fn scatter(rows: usize, cols: usize, pieces: &[(Region, Grid<f64>)]) -> ComputeResult<Grid<f64>> {
    let bounds = Region::from_shape(rows, cols);
    let mut covered = 0;
    for (region, data) in pieces {
        if data.shape() != (region.rows, region.cols) || !bounds.contains_region(region) {
            return Err(ComputeError::OperationFailed(format!(
                "tile {:?} with data {:?} does not fit a {rows}x{cols} grid",
                region,
                data.shape()
            )));
        }
        covered += region.area();
    }
    if covered > rows * cols {
        return Err(ComputeError::OperationFailed(format!(
            "tiles cover {covered} cells of a {rows}x{cols} grid"
        )));
    }

    let mut out = Grid::filled(rows, cols, f64::NAN);
    if cols == 0 {
        return Ok(out);
    }
    out.data_mut()
        .par_chunks_mut(cols)
        .enumerate()
        .for_each(|(r, line)| {
            for (region, data) in pieces {
                if r >= region.row && r < region.bottom() {
                    line[region.col..region.right()].copy_from_slice(data.row(r - region.row));
                }
            }
        });
    Ok(out)
}
