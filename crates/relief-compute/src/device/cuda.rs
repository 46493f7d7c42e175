//! CUDA device backend.
//!
//! Requires the `cuda` feature and an NVIDIA GPU with CUDA support.

use std::sync::Arc;

use cudarc::driver::{CudaContext, CudaFunction, CudaModule, CudaSlice, CudaStream, PushKernelArg};

use super::{DeviceBuffer, DevicePrimitives, LaunchConfig, kernel_dims};
use crate::model::Lighting;
use crate::{ComputeError, ComputeResult};

/// CUDA kernel source, compiled at runtime via NVRTC.
///
/// - `hillshade_kernel`: one thread per cell, interior cells only
/// - `fill_border_kernel`: one thread per cell, outer ring only
const CUDA_KERNELS: &str = r#"
extern "C" {

__global__ void hillshade_kernel(
    const float* __restrict__ src,
    float* __restrict__ dst,
    int rows, int cols,
    float sin_alt, float cos_alt, float az_rad
) {
    int j = blockIdx.x * blockDim.x + threadIdx.x;
    int i = blockIdx.y * blockDim.y + threadIdx.y;
    if (i <= 0 || j <= 0 || i >= rows - 1 || j >= cols - 1) return;

    float x = (src[(i + 1) * cols + j] - src[(i - 1) * cols + j]) / 2.0f;
    float y = (src[i * cols + j + 1] - src[i * cols + j - 1]) / 2.0f;
    if (!isfinite(x) || !isfinite(y)) {
        dst[i * cols + j] = __int_as_float(0x7fc00000);
        return;
    }

    const float half_pi = 1.57079632679f;
    float slope = half_pi - atanf(sqrtf(x * x + y * y));
    float aspect = (az_rad - half_pi) - atan2f(-x, y);

    float sin_part = sin_alt * sinf(slope);
    float cos_part = cos_alt * cosf(slope) * cosf(aspect);

    dst[i * cols + j] = (sin_part + cos_part + 1.0f) * 0.5f;
}

__global__ void fill_border_kernel(
    float* __restrict__ dst,
    int rows, int cols,
    float value
) {
    int j = blockIdx.x * blockDim.x + threadIdx.x;
    int i = blockIdx.y * blockDim.y + threadIdx.y;
    if (i >= rows || j >= cols) return;
    if (i == 0 || j == 0 || i == rows - 1 || j == cols - 1) {
        dst[i * cols + j] = value;
    }
}

}
"#;

/// CUDA buffer handle.
///
/// Memory is managed by cudarc and freed when this handle is dropped.
pub struct CudaBuffer {
    buffer: CudaSlice<f32>,
    rows: usize,
    cols: usize,
}

impl DeviceBuffer for CudaBuffer {
    fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }
}

/// CUDA device.
pub struct CudaDevice {
    #[allow(dead_code)]
    ctx: Arc<CudaContext>,
    stream: Arc<CudaStream>,
    #[allow(dead_code)]
    module: Arc<CudaModule>,
    k_hillshade: CudaFunction,
    k_fill_border: CudaFunction,
}

impl CudaDevice {
    /// Create a device on GPU 0 and compile the kernels.
    pub fn new() -> ComputeResult<Self> {
        let ctx = CudaContext::new(0)
            .map_err(|e| ComputeError::DeviceCreation(format!("CUDA init failed: {e:?}")))?;
        let stream = ctx.default_stream();

        let ptx = cudarc::nvrtc::compile_ptx(CUDA_KERNELS).map_err(|e| {
            ComputeError::ShaderCompilation(format!("CUDA kernel compile failed: {e:?}"))
        })?;
        let module = ctx.load_module(ptx).map_err(|e| {
            ComputeError::ShaderCompilation(format!("CUDA module load failed: {e:?}"))
        })?;

        let load_err = |name: &str, e: cudarc::driver::result::DriverError| {
            ComputeError::ShaderCompilation(format!("Failed to load {name}: {e:?}"))
        };
        let k_hillshade = module
            .load_function("hillshade_kernel")
            .map_err(|e| load_err("hillshade_kernel", e))?;
        let k_fill_border = module
            .load_function("fill_border_kernel")
            .map_err(|e| load_err("fill_border_kernel", e))?;

        Ok(Self { ctx, stream, module, k_hillshade, k_fill_border })
    }

    /// Check if CUDA is available.
    pub fn is_available() -> bool {
        CudaContext::new(0).is_ok()
    }

    fn driver_config(cfg: &LaunchConfig) -> cudarc::driver::LaunchConfig {
        cudarc::driver::LaunchConfig {
            block_dim: (cfg.block_dim.0, cfg.block_dim.1, 1),
            grid_dim: (cfg.grid_dim.0, cfg.grid_dim.1, 1),
            shared_mem_bytes: 0,
        }
    }
}

impl DevicePrimitives for CudaDevice {
    type Buffer = CudaBuffer;

    fn upload(&self, data: &[f32], rows: usize, cols: usize) -> ComputeResult<Self::Buffer> {
        if data.len() != rows * cols {
            return Err(ComputeError::BufferCreation(format!(
                "expected {} values, got {}",
                rows * cols,
                data.len()
            )));
        }
        let buffer = self
            .stream
            .clone_htod(data)
            .map_err(|e| ComputeError::BufferCreation(format!("Upload failed: {e:?}")))?;
        Ok(CudaBuffer { buffer, rows, cols })
    }

    fn download(&self, buffer: &Self::Buffer) -> ComputeResult<Vec<f32>> {
        let mut data = self
            .stream
            .clone_dtoh(&buffer.buffer)
            .map_err(|e| ComputeError::OperationFailed(format!("Download failed: {e:?}")))?;
        // empty grids are backed by a one-element allocation
        data.truncate(buffer.rows * buffer.cols);
        Ok(data)
    }

    fn allocate(&self, rows: usize, cols: usize) -> ComputeResult<Self::Buffer> {
        let buffer: CudaSlice<f32> = self
            .stream
            .alloc_zeros((rows * cols).max(1))
            .map_err(|e| ComputeError::BufferCreation(format!("Allocate failed: {e:?}")))?;
        Ok(CudaBuffer { buffer, rows, cols })
    }

    fn exec_hillshade(
        &self,
        src: &Self::Buffer,
        dst: &mut Self::Buffer,
        light: &Lighting<f32>,
        cfg: &LaunchConfig,
    ) -> ComputeResult<()> {
        let (rows, cols) = kernel_dims(src.rows, src.cols)?;

        let mut builder = self.stream.launch_builder(&self.k_hillshade);
        builder.arg(&src.buffer);
        builder.arg(&dst.buffer);
        builder.arg(&rows);
        builder.arg(&cols);
        builder.arg(&light.sin_altitude);
        builder.arg(&light.cos_altitude);
        builder.arg(&light.azimuth_rad);

        #[allow(unsafe_code)]
        unsafe { builder.launch(Self::driver_config(cfg)) }
            .map_err(|e| ComputeError::OperationFailed(format!("Hillshade failed: {e:?}")))?;
        Ok(())
    }

    fn exec_fill_border(&self, dst: &mut Self::Buffer, value: f32) -> ComputeResult<()> {
        let (rows, cols) = kernel_dims(dst.rows, dst.cols)?;
        let cfg = LaunchConfig::for_grid(dst.rows, dst.cols)?;

        let mut builder = self.stream.launch_builder(&self.k_fill_border);
        builder.arg(&dst.buffer);
        builder.arg(&rows);
        builder.arg(&cols);
        builder.arg(&value);

        #[allow(unsafe_code)]
        unsafe { builder.launch(Self::driver_config(&cfg)) }
            .map_err(|e| ComputeError::OperationFailed(format!("Border fill failed: {e:?}")))?;
        Ok(())
    }

    fn synchronize(&self) -> ComputeResult<()> {
        self.stream
            .synchronize()
            .map_err(|e| ComputeError::OperationFailed(format!("Synchronize failed: {e:?}")))
    }

    fn name(&self) -> &'static str {
        "cuda"
    }
}
