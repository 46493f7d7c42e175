//! Chunked grids.
//!
//! A [`ChunkedGrid`] splits a logical grid into bands of rows and bands of
//! columns; every (row band, column band) pair is one chunk. Chunk sizes are
//! listed per band, so edge chunks may be smaller than interior ones.
//!
//! ```text
//!          col_chunks = [4, 4, 2]
//!        +----+----+--+
//!  rc[0] | c0 | c1 |c2|
//!        +----+----+--+
//!  rc[1] | c3 | c4 |c5|
//!        +----+----+--+
//! ```

use relief_core::{Grid, GridShape, Region};

use crate::device::{AnyDevice, DeviceGrid};
use crate::tiling::{TileSource, scatter};
use crate::{ComputeError, ComputeResult};

/// One block of a chunked grid.
#[derive(Debug)]
pub enum Chunk {
    /// Host-resident `f64` block.
    Host(Grid<f64>),
    /// Device-resident `f32` block.
    Device(DeviceGrid),
}

impl Chunk {
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Self::Host(g) => g.shape(),
            Self::Device(d) => d.shape(),
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self, Self::Host(_))
    }
}

/// Where the chunks of a grid live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Residency {
    Host,
    Device,
    /// Some chunks on the host, some on a device.
    Mixed,
}

/// Grid partitioned into row and column bands.
#[derive(Debug)]
pub struct ChunkedGrid {
    rows: usize,
    cols: usize,
    row_chunks: Vec<usize>,
    col_chunks: Vec<usize>,
    /// Row-major over (row band, column band).
    chunks: Vec<Chunk>,
}

impl ChunkedGrid {
    /// Builds a chunked grid from band sizes and row-major chunks.
    ///
    /// Fails if the chunk count or any chunk shape disagrees with the bands.
    pub fn new(row_chunks: Vec<usize>, col_chunks: Vec<usize>, chunks: Vec<Chunk>) -> ComputeResult<Self> {
        let expected = row_chunks.len() * col_chunks.len();
        if chunks.len() != expected {
            return Err(relief_core::Error::InvalidDimensions(format!(
                "{} chunks for {}x{} bands",
                chunks.len(),
                row_chunks.len(),
                col_chunks.len()
            ))
            .into());
        }
        for (k, chunk) in chunks.iter().enumerate() {
            let want = (row_chunks[k / col_chunks.len()], col_chunks[k % col_chunks.len()]);
            if chunk.shape() != want {
                return Err(relief_core::Error::InvalidDimensions(format!(
                    "chunk {k} is {:?}, band layout expects {want:?}",
                    chunk.shape()
                ))
                .into());
            }
        }

        Ok(Self {
            rows: row_chunks.iter().sum(),
            cols: col_chunks.iter().sum(),
            row_chunks,
            col_chunks,
            chunks,
        })
    }

    /// Splits a host grid into chunks of at most `chunk_rows x chunk_cols`.
    pub fn from_grid(grid: &Grid<f64>, chunk_rows: usize, chunk_cols: usize) -> ComputeResult<Self> {
        if chunk_rows == 0 || chunk_cols == 0 {
            return Err(relief_core::Error::InvalidDimensions(format!(
                "chunk size {chunk_rows}x{chunk_cols} must be positive"
            ))
            .into());
        }
        let row_chunks = bands(grid.rows(), chunk_rows);
        let col_chunks = bands(grid.cols(), chunk_cols);
        let chunks = layout(&row_chunks, &col_chunks)
            .into_iter()
            .map(|region| grid.crop(region).map(Chunk::Host))
            .collect::<relief_core::Result<Vec<_>>>()?;
        Self::new(row_chunks, col_chunks, chunks)
    }

    /// Moves every host chunk to `device`; device chunks are kept.
    pub fn into_device(self, device: &AnyDevice) -> ComputeResult<Self> {
        let chunks = self
            .chunks
            .into_iter()
            .map(|chunk| match chunk {
                Chunk::Host(g) => device.upload(&g).map(Chunk::Device),
                other => Ok(other),
            })
            .collect::<ComputeResult<Vec<_>>>()?;
        Ok(Self { chunks, ..self })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Row band heights.
    pub fn row_chunks(&self) -> &[usize] {
        &self.row_chunks
    }

    /// Column band widths.
    pub fn col_chunks(&self) -> &[usize] {
        &self.col_chunks
    }

    /// Chunks in row-major band order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Global region of every chunk, same order as [`Self::chunks`].
    pub fn chunk_regions(&self) -> Vec<Region> {
        layout(&self.row_chunks, &self.col_chunks)
    }

    /// Classifies chunk residency. A grid without chunks counts as host.
    pub fn residency(&self) -> Residency {
        let host = self.chunks.iter().filter(|c| c.is_host()).count();
        if host == self.chunks.len() {
            Residency::Host
        } else if host == 0 {
            Residency::Device
        } else {
            Residency::Mixed
        }
    }

    /// Read-only view over host chunks, `None` if any chunk is on a device.
    pub fn host_view(&self) -> Option<HostChunkView<'_>> {
        let grids = self
            .chunks
            .iter()
            .map(|c| match c {
                Chunk::Host(g) => Some(g),
                Chunk::Device(_) => None,
            })
            .collect::<Option<Vec<_>>>()?;
        Some(HostChunkView {
            rows: self.rows,
            cols: self.cols,
            regions: self.chunk_regions(),
            grids,
        })
    }

    /// Gathers host chunks into one contiguous grid.
    pub fn assemble(&self) -> ComputeResult<Grid<f64>> {
        let mut pieces = Vec::with_capacity(self.chunks.len());
        for (region, chunk) in self.chunk_regions().into_iter().zip(&self.chunks) {
            match chunk {
                Chunk::Host(g) => pieces.push((region, g.clone())),
                Chunk::Device(_) => {
                    return Err(ComputeError::UnsupportedInputKind(
                        "cannot assemble device-resident chunks on the host".into(),
                    ));
                }
            }
        }
        scatter(self.rows, self.cols, &pieces)
    }
}

impl GridShape for ChunkedGrid {
    fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }
}

/// Host chunks seen as one [`TileSource`].
pub struct HostChunkView<'a> {
    rows: usize,
    cols: usize,
    regions: Vec<Region>,
    grids: Vec<&'a Grid<f64>>,
}

impl TileSource for HostChunkView<'_> {
    fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn copy_region(&self, region: Region, dst: &mut Grid<f64>, dst_row: usize, dst_col: usize) {
        for (chunk_region, grid) in self.regions.iter().zip(&self.grids) {
            let Some(part) = region.intersect(chunk_region) else {
                continue;
            };
            let local = Region::new(
                part.row - chunk_region.row,
                part.col - chunk_region.col,
                part.rows,
                part.cols,
            );
            grid.copy_region(
                local,
                dst,
                dst_row + part.row - region.row,
                dst_col + part.col - region.col,
            );
        }
    }
}

/// Band sizes covering `len` with bands of at most `size`.
fn bands(len: usize, size: usize) -> Vec<usize> {
    (0..len).step_by(size).map(|start| size.min(len - start)).collect()
}

/// Row-major regions for a band layout.
fn layout(row_chunks: &[usize], col_chunks: &[usize]) -> Vec<Region> {
    let mut regions = Vec::with_capacity(row_chunks.len() * col_chunks.len());
    let mut row = 0;
    for &rows in row_chunks {
        let mut col = 0;
        for &cols in col_chunks {
            regions.push(Region::new(row, col, rows, cols));
            col += cols;
        }
        row += rows;
    }
    regions
}
