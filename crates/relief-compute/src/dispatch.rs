//! Storage classification and path selection.
//!
//! Every input is classified once into a [`StorageKind`]; the kind alone
//! decides the [`ExecutionPath`]:
//!
//! | Storage | Path |
//! |---------|------|
//! | `HostContiguous` | host kernel |
//! | `DeviceContiguous` | device kernel on the attached accelerator |
//! | `HostTiled` | tiled executor over the host kernel |
//! | `DeviceTiled` | `UnimplementedCombination` |
//! | chunks on host and device | `UnsupportedInputKind` |
//!
//! All checks run before any numeric work.

use relief_core::{Grid, GridShape, Raster};
use tracing::debug;

use crate::chunked::{ChunkedGrid, Residency};
use crate::device::{AnyDevice, Backend, DeviceGrid, select_hardware_backend};
use crate::executor::{ExecutorConfig, TiledExecutor};
use crate::host::hillshade_host;
use crate::model::HillshadeParams;
use crate::{ComputeError, ComputeResult};

/// Elevation or illumination grid in any supported storage.
#[derive(Debug)]
pub enum GridData {
    /// Contiguous host memory.
    Host(Grid<f64>),
    /// Contiguous device memory.
    Device(DeviceGrid),
    /// Partitioned into chunks.
    Chunked(ChunkedGrid),
}

/// Storage category of a [`GridData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    HostContiguous,
    DeviceContiguous,
    HostTiled,
    DeviceTiled,
}

impl StorageKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::HostContiguous => "host-contiguous",
            Self::DeviceContiguous => "device-contiguous",
            Self::HostTiled => "host-tiled",
            Self::DeviceTiled => "device-tiled",
        }
    }
}

/// Path a dispatch resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPath {
    Host,
    Device,
    TiledHost,
}

impl GridData {
    /// Classifies storage. Chunks split between host and device are not a
    /// recognised kind.
    pub fn storage_kind(&self) -> ComputeResult<StorageKind> {
        match self {
            Self::Host(_) => Ok(StorageKind::HostContiguous),
            Self::Device(_) => Ok(StorageKind::DeviceContiguous),
            Self::Chunked(c) => match c.residency() {
                Residency::Host => Ok(StorageKind::HostTiled),
                Residency::Device => Ok(StorageKind::DeviceTiled),
                Residency::Mixed => Err(ComputeError::UnsupportedInputKind(
                    "chunked grid mixes host and device chunks".into(),
                )),
            },
        }
    }

    /// Host grid, if contiguous on the host.
    pub fn as_host(&self) -> Option<&Grid<f64>> {
        match self {
            Self::Host(g) => Some(g),
            _ => None,
        }
    }

    /// Chunked grid, if partitioned.
    pub fn as_chunked(&self) -> Option<&ChunkedGrid> {
        match self {
            Self::Chunked(c) => Some(c),
            _ => None,
        }
    }

    /// Device grid, if contiguous on a device.
    pub fn as_device(&self) -> Option<&DeviceGrid> {
        match self {
            Self::Device(d) => Some(d),
            _ => None,
        }
    }
}

impl GridShape for GridData {
    fn shape(&self) -> (usize, usize) {
        match self {
            Self::Host(g) => g.shape(),
            Self::Device(d) => d.shape(),
            Self::Chunked(c) => c.shape(),
        }
    }
}

impl From<Grid<f64>> for GridData {
    fn from(grid: Grid<f64>) -> Self {
        Self::Host(grid)
    }
}

impl From<ChunkedGrid> for GridData {
    fn from(grid: ChunkedGrid) -> Self {
        Self::Chunked(grid)
    }
}

impl From<DeviceGrid> for GridData {
    fn from(grid: DeviceGrid) -> Self {
        Self::Device(grid)
    }
}

/// Selects and runs one hillshade path per input.
#[derive(Debug, Default)]
pub struct Dispatcher {
    device: Option<AnyDevice>,
    executor: TiledExecutor,
}

impl Dispatcher {
    /// Host paths plus the best detected accelerator.
    ///
    /// `RELIEF_BACKEND=cpu` attaches the emulated device instead; without a
    /// setting only real hardware is attached.
    pub fn new() -> Self {
        let backend = match Backend::from_env() {
            Some(Backend::Auto) | None => select_hardware_backend(),
            Some(backend) => Some(backend),
        };
        let device = backend.and_then(|b| match AnyDevice::create(b) {
            Ok(device) => Some(device),
            Err(e) => {
                debug!(backend = b.name(), error = %e, "accelerator not attached");
                None
            }
        });
        Self {
            device,
            executor: TiledExecutor::new(),
        }
    }

    /// Host paths only; device inputs fail with `AcceleratorUnavailable`.
    pub fn host_only() -> Self {
        Self::default()
    }

    /// Attaches `device` for device-resident inputs.
    pub fn with_device(mut self, device: AnyDevice) -> Self {
        self.device = Some(device);
        self
    }

    /// Sets the tiled executor configuration.
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.executor = TiledExecutor::with_config(config);
        self
    }

    /// Attached accelerator, if any.
    pub fn device(&self) -> Option<&AnyDevice> {
        self.device.as_ref()
    }

    /// Resolves the path for `data` without computing anything.
    pub fn plan(&self, data: &GridData) -> ComputeResult<ExecutionPath> {
        let kind = data.storage_kind()?;
        let path = match (kind, data) {
            (StorageKind::HostContiguous, _) => ExecutionPath::Host,
            (StorageKind::HostTiled, _) => ExecutionPath::TiledHost,
            (StorageKind::DeviceTiled, _) => {
                return Err(ComputeError::UnimplementedCombination(
                    "hillshade over device-resident chunks".into(),
                ));
            }
            (StorageKind::DeviceContiguous, GridData::Device(grid)) => {
                let device = self.device.as_ref().ok_or_else(|| {
                    ComputeError::AcceleratorUnavailable(format!(
                        "{} grid given but no accelerator is attached",
                        grid.backend().name()
                    ))
                })?;
                if !device.owns(grid) {
                    return Err(ComputeError::AcceleratorUnavailable(format!(
                        "{} grid given but the attached accelerator is {}",
                        grid.backend().name(),
                        device.name()
                    )));
                }
                debug!(backend = device.name(), bytes = grid.size_bytes(), "device input");
                ExecutionPath::Device
            }
            (StorageKind::DeviceContiguous, _) => {
                return Err(ComputeError::UnsupportedInputKind(
                    "device storage without a device buffer".into(),
                ));
            }
        };
        let (rows, cols) = data.shape();
        debug!(storage = kind.name(), path = ?path, rows, cols, "dispatch");
        Ok(path)
    }

    /// Hillshade of `data`; output storage category matches the input's.
    pub fn compute(&self, data: &GridData, params: &HillshadeParams) -> ComputeResult<GridData> {
        match (self.plan(data)?, data) {
            (ExecutionPath::Host, GridData::Host(grid)) => Ok(GridData::Host(hillshade_host(grid, params))),
            (ExecutionPath::TiledHost, GridData::Chunked(grid)) => {
                Ok(GridData::Chunked(self.executor.execute_chunked(grid, params)?))
            }
            (ExecutionPath::Device, GridData::Device(grid)) => {
                let device = self.device.as_ref().ok_or_else(|| {
                    ComputeError::AcceleratorUnavailable("no accelerator attached".into())
                })?;
                Ok(GridData::Device(device.hillshade(grid, params)?))
            }
            (path, _) => Err(ComputeError::UnsupportedInputKind(format!(
                "{path:?} path does not accept this storage"
            ))),
        }
    }

    /// Hillshade of a raster, returned under `name` with dims, coords and
    /// attrs copied unchanged.
    pub fn hillshade(
        &self,
        raster: &Raster<GridData>,
        params: &HillshadeParams,
        name: &str,
    ) -> ComputeResult<Raster<GridData>> {
        let out = self.compute(raster.data(), params)?;
        Ok(raster.rewrap(out, Some(name))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_kinds() {
        let host = GridData::Host(Grid::filled(4, 4, 0.0));
        assert_eq!(host.storage_kind().unwrap(), StorageKind::HostContiguous);

        let chunked = ChunkedGrid::from_grid(&Grid::filled(4, 4, 0.0), 2, 2).unwrap();
        assert_eq!(GridData::from(chunked).storage_kind().unwrap(), StorageKind::HostTiled);

        let device = AnyDevice::create(Backend::Cpu).unwrap();
        let buf = device.upload(&Grid::filled(4, 4, 0.0)).unwrap();
        assert_eq!(GridData::Device(buf).storage_kind().unwrap(), StorageKind::DeviceContiguous);
    }

    #[test]
    fn test_plan() {
        let device = AnyDevice::create(Backend::Cpu).unwrap();
        let buf = device.upload(&Grid::filled(4, 4, 0.0)).unwrap();
        let dispatcher = Dispatcher::host_only().with_device(device);

        assert_eq!(dispatcher.plan(&GridData::Host(Grid::filled(3, 3, 0.0))).unwrap(), ExecutionPath::Host);
        assert_eq!(dispatcher.plan(&GridData::Device(buf)).unwrap(), ExecutionPath::Device);
    }

    #[test]
    fn test_host_only_rejects_device() {
        let device = AnyDevice::create(Backend::Cpu).unwrap();
        let buf = device.upload(&Grid::filled(4, 4, 0.0)).unwrap();
        let err = Dispatcher::host_only().plan(&GridData::Device(buf)).unwrap_err();
        assert!(matches!(err, ComputeError::AcceleratorUnavailable(_)));
    }

    #[test]
    fn test_device_tiled_unimplemented() {
        let device = AnyDevice::create(Backend::Cpu).unwrap();
        let chunked = ChunkedGrid::from_grid(&Grid::filled(6, 6, 0.0), 3, 3)
            .unwrap()
            .into_device(&device)
            .unwrap();
        let data = GridData::Chunked(chunked);
        for dispatcher in [Dispatcher::host_only(), Dispatcher::host_only().with_device(device)] {
            let err = dispatcher.compute(&data, &HillshadeParams::default()).unwrap_err();
            assert!(matches!(err, ComputeError::UnimplementedCombination(_)));
        }
    }
}
