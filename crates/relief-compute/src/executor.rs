//! Tiled executor for the host kernel.
//!
//! # Architecture
//!
//! ```text
//! TiledExecutor
//!     |
//!     +-- execute_grid()    logical tiles over a contiguous grid
//!     +-- execute_chunked() one tile per chunk, same layout out
//!     |
//!     +-- per tile (rayon):  read_window (core + halo)
//!                              -> hillshade_host
//!                              -> trim_halo
//!     +-- join, then scatter / rebuild chunks
//! ```
//!
//! Tiles read neighbouring cells across tile and chunk boundaries, so the
//! result equals a whole-grid host run cell for cell.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use rayon::prelude::*;
use relief_core::{Grid, Region};
use tracing::{debug, trace};

use crate::chunked::{Chunk, ChunkedGrid};
use crate::host::hillshade_host;
use crate::model::HillshadeParams;
use crate::tiling::{HALO, TileSource, generate_tiles, optimal_tile_size, scatter, trim_halo};
use crate::{ComputeError, ComputeResult, memory};

/// Executor configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExecutorConfig {
    /// Override tile size `(rows, cols)` for contiguous grids (None = auto).
    pub tile_size: Option<(usize, usize)>,
    /// Run tiles concurrently on the rayon pool.
    pub parallel: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            tile_size: None,
            parallel: true,
        }
    }
}

/// Runs the host kernel tile by tile.
#[derive(Debug, Clone, Default)]
pub struct TiledExecutor {
    config: ExecutorConfig,
}

impl TiledExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Tile size for a contiguous `rows x cols` grid.
    ///
    /// Priority: config, then `RELIEF_TILE_SIZE`, then memory budget.
    pub fn tile_size(&self, rows: usize, cols: usize) -> (usize, usize) {
        if let Some((tr, tc)) = self.config.tile_size {
            return (tr.max(1), tc.max(1));
        }
        if let Some(edge) = memory::tile_size_override() {
            return (edge, edge);
        }
        optimal_tile_size(rows, cols, memory::processing_budget())
    }

    /// Hillshade of a contiguous host grid, computed in logical tiles.
    pub fn execute_grid(&self, grid: &Grid<f64>, params: &HillshadeParams) -> ComputeResult<Grid<f64>> {
        let (rows, cols) = grid.shape();
        let (tile_rows, tile_cols) = self.tile_size(rows, cols);
        let tiles = generate_tiles(rows, cols, tile_rows, tile_cols);
        debug!(
            rows,
            cols,
            tile_rows,
            tile_cols,
            tiles = tiles.len(),
            halo = HALO,
            tile_bytes = memory::grid_memory(tile_rows + 2 * HALO, tile_cols + 2 * HALO),
            "tiled plan"
        );

        let results = self.run_tiles(grid, &tiles, params)?;
        let pieces: Vec<_> = tiles.into_iter().zip(results).collect();
        scatter(rows, cols, &pieces)
    }

    /// Hillshade of a host-chunked grid.
    ///
    /// Each chunk is one tile; the output keeps the input's band layout.
    pub fn execute_chunked(&self, grid: &ChunkedGrid, params: &HillshadeParams) -> ComputeResult<ChunkedGrid> {
        let view = grid.host_view().ok_or_else(|| {
            ComputeError::UnimplementedCombination(
                "tiled execution of device-resident chunks".into(),
            )
        })?;
        let tiles = grid.chunk_regions();
        debug!(
            rows = grid.rows(),
            cols = grid.cols(),
            row_bands = grid.row_chunks().len(),
            col_bands = grid.col_chunks().len(),
            halo = HALO,
            "chunked plan"
        );

        let results = self.run_tiles(&view, &tiles, params)?;
        ChunkedGrid::new(
            grid.row_chunks().to_vec(),
            grid.col_chunks().to_vec(),
            results.into_iter().map(Chunk::Host).collect(),
        )
    }

    fn run_tiles<S: TileSource>(
        &self,
        src: &S,
        tiles: &[Region],
        params: &HillshadeParams,
    ) -> ComputeResult<Vec<Grid<f64>>> {
        let run = |core: &Region| {
            trace!(row = core.row, col = core.col, rows = core.rows, cols = core.cols, "tile");
            let window = src.read_window(*core);
            trim_halo(&hillshade_host(&window, params))
        };

        if self.config.parallel {
            tiles.par_iter().map(run).collect()
        } else {
            tiles.iter().map(run).collect()
        }
    }
}
