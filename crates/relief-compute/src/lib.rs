//! Hillshade illumination engine.
//!
//! Computes a per-cell illumination value in `[0, 1]` over a 2D elevation
//! grid for a given sun azimuth and altitude. The same result is produced
//! whether the grid lives in host memory, in device memory, or is split
//! into chunks processed tile by tile.
//!
//! # Architecture
//!
//! ```text
//! Dispatcher (storage kind -> path)
//!     +-- host::hillshade_host           (rayon, f64)
//!     +-- device::run_hillshade<D>       (2D launch grid, f32)
//!     |       +-- CpuDevice  (rayon emulation)
//!     |       +-- CudaDevice (NVRTC kernel, feature "cuda")
//!     +-- TiledExecutor over host kernel (1-cell halo, disjoint reassembly)
//!
//! model::shade / model::shade_folded  <- called by every Rust backend
//! ```
//!
//! # Example
//!
//! ```
//! use relief_compute::{hillshade, GridData, HillshadeParams};
//! use relief_core::{Grid, Raster};
//!
//! let dem = Grid::from_fn(64, 64, |r, c| (r as f64 * 0.3).sin() * 50.0 + c as f64);
//! let raster = Raster::new(GridData::Host(dem)).with_attr("units", "m");
//!
//! let out = hillshade(&raster, &HillshadeParams::default(), None)?;
//! assert_eq!(out.name(), Some("hillshade"));
//! # Ok::<(), relief_compute::ComputeError>(())
//! ```

pub mod border;
pub mod chunked;
pub mod device;
pub mod dispatch;
pub mod executor;
pub mod host;
pub mod memory;
pub mod model;
pub mod tiling;

pub use chunked::{Chunk, ChunkedGrid, Residency};
pub use device::{
    AnyDevice, Backend, CpuDevice, DeviceGrid, DevicePrimitives, LaunchConfig, describe_backends,
    detect_backends, run_hillshade, select_best_backend,
};
#[cfg(feature = "cuda")]
pub use device::CudaDevice;
pub use dispatch::{Dispatcher, ExecutionPath, GridData, StorageKind};
pub use executor::{ExecutorConfig, TiledExecutor};
pub use host::hillshade_host;
pub use model::{HillshadeParams, Lighting};

use relief_core::Raster;
use thiserror::Error;

/// Name given to the output raster when the caller does not pick one.
pub const DEFAULT_NAME: &str = "hillshade";

/// Compute errors.
#[derive(Error, Debug)]
pub enum ComputeError {
    /// Grid storage is not one the dispatcher knows how to handle.
    #[error("Unsupported input kind: {0}")]
    UnsupportedInputKind(String),

    /// Storage combination is recognised but deliberately not implemented.
    #[error("Unimplemented combination: {0}")]
    UnimplementedCombination(String),

    /// Device path selected but no matching accelerator is attached.
    #[error("Accelerator unavailable: {0}")]
    AcceleratorUnavailable(String),

    #[error("Backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("Failed to create device: {0}")]
    DeviceCreation(String),

    #[error("Failed to create buffer: {0}")]
    BufferCreation(String),

    #[error("Failed to compile kernel: {0}")]
    ShaderCompilation(String),

    #[error("Device operation failed: {0}")]
    OperationFailed(String),

    #[error(transparent)]
    Core(#[from] relief_core::Error),
}

pub type ComputeResult<T> = Result<T, ComputeError>;

/// Computes hillshade for a raster of any supported storage kind.
///
/// Uses [`Dispatcher::new`], so a CUDA device is attached when one is
/// detected. A raster already resident on the emulated device gets that
/// device attached for the call, since its buffer lives in host RAM and
/// needs no hardware. `name = None` names the output [`DEFAULT_NAME`].
pub fn hillshade(
    raster: &Raster<GridData>,
    params: &HillshadeParams,
    name: Option<&str>,
) -> ComputeResult<Raster<GridData>> {
    let mut dispatcher = Dispatcher::new();
    if let GridData::Device(grid) = raster.data() {
        let owned = dispatcher.device().is_some_and(|d| d.owns(grid));
        if !owned && grid.backend() == Backend::Cpu {
            dispatcher = dispatcher.with_device(AnyDevice::Cpu(CpuDevice::new()));
        }
    }
    dispatcher.hillshade(raster, params, name.unwrap_or(DEFAULT_NAME))
}
