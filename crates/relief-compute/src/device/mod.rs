//! Device kernel: one logical worker per output cell.
//!
//! # Architecture
//!
//! ```text
//! run_hillshade<D: DevicePrimitives>
//!     +-- allocate dst
//!     +-- exec_hillshade   (main pass, 2D launch grid, f32)
//!     +-- synchronize      (barrier)
//!     +-- exec_fill_border (post-pass, NaN ring)
//!     +-- synchronize
//!
//! DevicePrimitives
//!     +-- CpuDevice  (rayon emulation of the launch grid)
//!     +-- CudaDevice (NVRTC kernel, feature "cuda")
//! ```
//!
//! # Per-worker contract
//!
//! Worker `(i, j)` (row, column) derives its coordinates from the launch
//! grid as `i = block.y * block_dim.y + thread.y`,
//! `j = block.x * block_dim.x + thread.x`. It writes `dst[i, j]` only when
//! `0 < i < rows - 1` and `0 < j < cols - 1`, and writes nothing else. Each
//! interior cell therefore has exactly one writer and workers share no
//! mutable state. Cells no worker writes keep their allocation value until
//! the border pass overwrites them.

mod cpu;
mod detect;

#[cfg(feature = "cuda")]
mod cuda;

pub use cpu::{CpuBuffer, CpuDevice};
pub use detect::{describe_backends, detect_backends, select_best_backend, select_hardware_backend};

#[cfg(feature = "cuda")]
pub use cuda::{CudaBuffer, CudaDevice};

use relief_core::{Grid, GridShape};
use tracing::debug;

use crate::border::is_interior;
use crate::model::{self, HillshadeParams, Lighting};
use crate::{ComputeError, ComputeResult, memory};

/// Threads per block edge for 2D launches.
pub const BLOCK_DIM: u32 = 16;

/// Buffer resident in device memory.
pub trait DeviceBuffer: Send + Sync {
    /// `(rows, cols)`.
    fn shape(&self) -> (usize, usize);

    /// Bytes of device memory used.
    fn size_bytes(&self) -> u64 {
        let (rows, cols) = self.shape();
        rows as u64 * cols as u64 * 4 // f32
    }
}

/// 2D launch geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchConfig {
    /// Threads per block `(x, y)`; x runs along columns.
    pub block_dim: (u32, u32),
    /// Blocks per grid `(x, y)`.
    pub grid_dim: (u32, u32),
}

impl LaunchConfig {
    /// 16x16 blocks covering a `rows x cols` grid, rounded up.
    ///
    /// Fails if either extent does not fit the `u32` launch index space.
    pub fn for_grid(rows: usize, cols: usize) -> ComputeResult<Self> {
        let extent = |n: usize, axis: &str| {
            u32::try_from(n).map_err(|_| {
                ComputeError::OperationFailed(format!("{n} {axis} exceed the launch index range"))
            })
        };
        Ok(Self {
            block_dim: (BLOCK_DIM, BLOCK_DIM),
            grid_dim: (
                extent(cols, "cols")?.div_ceil(BLOCK_DIM),
                extent(rows, "rows")?.div_ceil(BLOCK_DIM),
            ),
        })
    }

    /// Total logical workers launched.
    pub fn threads(&self) -> u64 {
        self.block_dim.0 as u64 * self.grid_dim.0 as u64 * self.block_dim.1 as u64 * self.grid_dim.1 as u64
    }
}

/// Extents as 32-bit kernel arguments.
///
/// Kernels index cells as `i * cols + j` in `int`, so the cell count must
/// fit in `i32` as well as each extent.
pub(crate) fn kernel_dims(rows: usize, cols: usize) -> ComputeResult<(i32, i32)> {
    let too_large = || ComputeError::OperationFailed(format!("{rows}x{cols} grid exceeds kernel index range"));
    let cells = rows.checked_mul(cols).ok_or_else(too_large)?;
    if i32::try_from(cells).is_err() {
        return Err(too_large());
    }
    Ok((
        i32::try_from(rows).map_err(|_| too_large())?,
        i32::try_from(cols).map_err(|_| too_large())?,
    ))
}

/// Core device operations.
pub trait DevicePrimitives: Send + Sync {
    /// Backend-specific buffer type.
    type Buffer: DeviceBuffer;

    /// Copy host data to the device.
    fn upload(&self, data: &[f32], rows: usize, cols: usize) -> ComputeResult<Self::Buffer>;

    /// Copy device data back to the host.
    fn download(&self, buffer: &Self::Buffer) -> ComputeResult<Vec<f32>>;

    /// Allocate an output buffer.
    fn allocate(&self, rows: usize, cols: usize) -> ComputeResult<Self::Buffer>;

    /// Main pass: one worker per cell of `cfg`, interior cells only.
    fn exec_hillshade(
        &self,
        src: &Self::Buffer,
        dst: &mut Self::Buffer,
        light: &Lighting<f32>,
        cfg: &LaunchConfig,
    ) -> ComputeResult<()>;

    /// Post-pass: write `value` over the outer ring.
    fn exec_fill_border(&self, dst: &mut Self::Buffer, value: f32) -> ComputeResult<()>;

    /// Block until all submitted work has finished.
    fn synchronize(&self) -> ComputeResult<()>;

    /// Backend name.
    fn name(&self) -> &'static str;
}

/// Work done by worker `(i, j)`; `None` means "write nothing".
///
/// Shared by every Rust-side device so the emulation and the reference
/// contract stay identical.
#[inline]
pub(crate) fn cell_kernel(
    src: &[f32],
    rows: usize,
    cols: usize,
    i: usize,
    j: usize,
    light: &Lighting<f32>,
) -> Option<f32> {
    if !is_interior(i, j, rows, cols) {
        return None;
    }
    let x = (src[(i + 1) * cols + j] - src[(i - 1) * cols + j]) / 2.0;
    let y = (src[i * cols + j + 1] - src[i * cols + j - 1]) / 2.0;
    Some(model::shade_folded(x, y, light))
}

/// Runs the device hillshade on a resident buffer.
///
/// Lighting constants are computed once on the host. The border pass starts
/// only after the main pass has fully completed.
pub fn run_hillshade<D: DevicePrimitives>(
    device: &D,
    src: &D::Buffer,
    params: &HillshadeParams,
) -> ComputeResult<D::Buffer> {
    let (rows, cols) = src.shape();
    let mut dst = device.allocate(rows, cols)?;
    if rows == 0 || cols == 0 {
        return Ok(dst);
    }

    let light = Lighting::<f32>::from_params(params);
    let cfg = LaunchConfig::for_grid(rows, cols)?;
    debug!(
        backend = device.name(),
        rows,
        cols,
        bytes = src.size_bytes(),
        grid = ?cfg.grid_dim,
        block = ?cfg.block_dim,
        "device hillshade launch"
    );

    device.exec_hillshade(src, &mut dst, &light, &cfg)?;
    device.synchronize()?;
    device.exec_fill_border(&mut dst, f32::NAN)?;
    device.synchronize()?;
    Ok(dst)
}

// =============================================================================
// Backend selection
// =============================================================================

/// Available device backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Auto-select best available (CUDA > CPU emulation).
    #[default]
    Auto,
    /// Device emulation on the rayon pool.
    Cpu,
    /// NVIDIA CUDA.
    Cuda,
}

impl Backend {
    /// Check if this backend is available on current system.
    pub fn is_available(&self) -> bool {
        match self {
            Self::Auto => true,
            Self::Cpu => true,
            #[cfg(feature = "cuda")]
            Self::Cuda => CudaDevice::is_available(),
            #[cfg(not(feature = "cuda"))]
            Self::Cuda => false,
        }
    }

    /// Whether this backend runs on accelerator hardware.
    pub fn is_hardware(&self) -> bool {
        matches!(self, Self::Cuda)
    }

    /// Get human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Cpu => "cpu",
            Self::Cuda => "cuda",
        }
    }

    /// Parses `auto`, `cpu` or `cuda` (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "cpu" => Some(Self::Cpu),
            "cuda" => Some(Self::Cuda),
            _ => None,
        }
    }

    /// Backend named by `RELIEF_BACKEND`, if set and valid.
    pub fn from_env() -> Option<Self> {
        memory::backend_override().and_then(|s| Self::parse(&s))
    }
}

// =============================================================================
// Dynamic dispatch over compiled devices
// =============================================================================

/// Device-resident grid, one variant per compiled backend.
pub enum DeviceGrid {
    Cpu(CpuBuffer),
    #[cfg(feature = "cuda")]
    Cuda(CudaBuffer),
}

impl DeviceGrid {
    /// Backend owning this buffer.
    pub fn backend(&self) -> Backend {
        match self {
            Self::Cpu(_) => Backend::Cpu,
            #[cfg(feature = "cuda")]
            Self::Cuda(_) => Backend::Cuda,
        }
    }

    /// Bytes of device memory used.
    pub fn size_bytes(&self) -> u64 {
        match self {
            Self::Cpu(b) => b.size_bytes(),
            #[cfg(feature = "cuda")]
            Self::Cuda(b) => b.size_bytes(),
        }
    }
}

impl GridShape for DeviceGrid {
    fn shape(&self) -> (usize, usize) {
        match self {
            Self::Cpu(b) => b.shape(),
            #[cfg(feature = "cuda")]
            Self::Cuda(b) => b.shape(),
        }
    }
}

impl std::fmt::Debug for DeviceGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (rows, cols) = self.shape();
        f.debug_struct("DeviceGrid")
            .field("backend", &self.backend().name())
            .field("rows", &rows)
            .field("cols", &cols)
            .finish()
    }
}

/// Device enum for dynamic dispatch.
pub enum AnyDevice {
    Cpu(CpuDevice),
    #[cfg(feature = "cuda")]
    Cuda(CudaDevice),
}

impl AnyDevice {
    /// Opens a device for `backend`.
    ///
    /// Fails with [`ComputeError::AcceleratorUnavailable`] before touching
    /// any data if the requested accelerator is not present.
    pub fn create(backend: Backend) -> ComputeResult<Self> {
        match backend {
            Backend::Auto => Self::create(select_best_backend()),
            Backend::Cpu => Ok(Self::Cpu(CpuDevice::new())),
            Backend::Cuda => {
                #[cfg(feature = "cuda")]
                {
                    if !CudaDevice::is_available() {
                        return Err(ComputeError::AcceleratorUnavailable(
                            "no CUDA device detected".into(),
                        ));
                    }
                    Ok(Self::Cuda(CudaDevice::new()?))
                }
                #[cfg(not(feature = "cuda"))]
                {
                    Err(ComputeError::AcceleratorUnavailable(
                        "cuda feature not enabled".into(),
                    ))
                }
            }
        }
    }

    /// Backend of this device.
    pub fn backend(&self) -> Backend {
        match self {
            Self::Cpu(_) => Backend::Cpu,
            #[cfg(feature = "cuda")]
            Self::Cuda(_) => Backend::Cuda,
        }
    }

    /// Get backend name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cpu(d) => d.name(),
            #[cfg(feature = "cuda")]
            Self::Cuda(d) => d.name(),
        }
    }

    /// Uploads an `f64` host grid, narrowing to `f32`.
    pub fn upload(&self, grid: &Grid<f64>) -> ComputeResult<DeviceGrid> {
        let data: Vec<f32> = grid.data().iter().map(|&v| v as f32).collect();
        self.upload_f32(&data, grid.rows(), grid.cols())
    }

    /// Uploads row-major `f32` data.
    pub fn upload_f32(&self, data: &[f32], rows: usize, cols: usize) -> ComputeResult<DeviceGrid> {
        if data.len() != rows * cols {
            return Err(relief_core::Error::BufferSizeMismatch {
                expected: rows * cols,
                actual: data.len(),
            }
            .into());
        }
        match self {
            Self::Cpu(d) => Ok(DeviceGrid::Cpu(d.upload(data, rows, cols)?)),
            #[cfg(feature = "cuda")]
            Self::Cuda(d) => Ok(DeviceGrid::Cuda(d.upload(data, rows, cols)?)),
        }
    }

    /// Copies a device grid back to the host.
    pub fn download(&self, grid: &DeviceGrid) -> ComputeResult<Grid<f32>> {
        let (rows, cols) = grid.shape();
        let data = match (self, grid) {
            (Self::Cpu(d), DeviceGrid::Cpu(b)) => d.download(b)?,
            #[cfg(feature = "cuda")]
            (Self::Cuda(d), DeviceGrid::Cuda(b)) => d.download(b)?,
            #[allow(unreachable_patterns)]
            _ => return Err(self.mismatch(grid)),
        };
        Ok(Grid::from_vec(data, rows, cols)?)
    }

    /// Runs [`run_hillshade`] on this device.
    ///
    /// The buffer must belong to this device's backend.
    pub fn hillshade(&self, src: &DeviceGrid, params: &HillshadeParams) -> ComputeResult<DeviceGrid> {
        match (self, src) {
            (Self::Cpu(d), DeviceGrid::Cpu(b)) => Ok(DeviceGrid::Cpu(run_hillshade(d, b, params)?)),
            #[cfg(feature = "cuda")]
            (Self::Cuda(d), DeviceGrid::Cuda(b)) => Ok(DeviceGrid::Cuda(run_hillshade(d, b, params)?)),
            #[allow(unreachable_patterns)]
            _ => Err(self.mismatch(src)),
        }
    }

    /// Returns `true` if `grid` lives on this device's backend.
    pub fn owns(&self, grid: &DeviceGrid) -> bool {
        self.backend() == grid.backend()
    }

    fn mismatch(&self, grid: &DeviceGrid) -> ComputeError {
        ComputeError::AcceleratorUnavailable(format!(
            "{} buffer cannot run on the attached {} device",
            grid.backend().name(),
            self.name()
        ))
    }
}

impl std::fmt::Debug for AnyDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AnyDevice").field(&self.name()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_config_covers_grid() {
        let cfg = LaunchConfig::for_grid(100, 33).unwrap();
        assert_eq!(cfg.block_dim, (16, 16));
        assert_eq!(cfg.grid_dim, (3, 7));
        assert!(cfg.threads() >= 100 * 33);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_launch_config_rejects_wide_grid() {
        let wide = u32::MAX as usize + 1;
        assert!(matches!(LaunchConfig::for_grid(4, wide), Err(ComputeError::OperationFailed(_))));
        assert!(matches!(LaunchConfig::for_grid(wide, 4), Err(ComputeError::OperationFailed(_))));
    }

    #[test]
    fn test_kernel_dims_checks_cell_count() {
        assert_eq!(kernel_dims(40_000, 50_000).unwrap(), (40_000, 50_000));
        assert_eq!(kernel_dims(0, 7).unwrap(), (0, 7));
        // each extent fits i32, the cell count does not
        assert!(matches!(kernel_dims(50_000, 50_000), Err(ComputeError::OperationFailed(_))));
        assert!(matches!(kernel_dims(usize::MAX, 2), Err(ComputeError::OperationFailed(_))));
    }

    #[test]
    fn test_cell_kernel_bounds() {
        let src = vec![1.0f32; 9];
        let light = Lighting::<f32>::from_params(&HillshadeParams::default());
        assert!(cell_kernel(&src, 3, 3, 1, 1, &light).is_some());
        for (i, j) in [(0, 0), (0, 1), (1, 0), (2, 1), (1, 2), (5, 5)] {
            assert!(cell_kernel(&src, 3, 3, i, j, &light).is_none(), "({i}, {j})");
        }
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!(Backend::parse("CUDA"), Some(Backend::Cuda));
        assert_eq!(Backend::parse(" cpu "), Some(Backend::Cpu));
        assert_eq!(Backend::parse("metal"), None);
        assert!(Backend::Cpu.is_available());
        assert!(Backend::Cuda.is_hardware() && !Backend::Cpu.is_hardware());
    }

    #[test]
    fn test_device_grid_size_bytes() {
        let device = AnyDevice::create(Backend::Cpu).unwrap();
        let grid = device.upload_f32(&[0.5; 20], 4, 5).unwrap();
        assert_eq!(grid.size_bytes(), 80);
        assert_eq!(device.upload_f32(&[], 0, 9).unwrap().size_bytes(), 0);
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_cuda_unavailable_without_feature() {
        let err = AnyDevice::create(Backend::Cuda).unwrap_err();
        assert!(matches!(err, ComputeError::AcceleratorUnavailable(_)));
    }
}
