//! Device emulation on the rayon pool.
//!
//! Walks the same 2D launch grid a hardware backend would: one band of
//! output rows per block row, blocks and threads visited inside the band.
//! Bands are disjoint so every cell keeps a single writer.

use rayon::prelude::*;

use super::{DeviceBuffer, DevicePrimitives, LaunchConfig, cell_kernel};
use crate::border::fill_border;
use crate::model::Lighting;
use crate::{ComputeError, ComputeResult};

/// Emulated device buffer - data stored in RAM.
pub struct CpuBuffer {
    data: Vec<f32>,
    rows: usize,
    cols: usize,
}

impl CpuBuffer {
    pub fn new(data: Vec<f32>, rows: usize, cols: usize) -> Self {
        Self { data, rows, cols }
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

impl DeviceBuffer for CpuBuffer {
    fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }
}

/// Emulated device.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuDevice;

impl CpuDevice {
    pub fn new() -> Self {
        Self
    }
}

impl DevicePrimitives for CpuDevice {
    type Buffer = CpuBuffer;

    fn upload(&self, data: &[f32], rows: usize, cols: usize) -> ComputeResult<Self::Buffer> {
        if data.len() != rows * cols {
            return Err(ComputeError::BufferCreation(format!(
                "expected {} values, got {}",
                rows * cols,
                data.len()
            )));
        }
        Ok(CpuBuffer::new(data.to_vec(), rows, cols))
    }

    fn download(&self, buffer: &Self::Buffer) -> ComputeResult<Vec<f32>> {
        Ok(buffer.data.clone())
    }

    fn allocate(&self, rows: usize, cols: usize) -> ComputeResult<Self::Buffer> {
        Ok(CpuBuffer::new(vec![0.0; rows * cols], rows, cols))
    }

    fn exec_hillshade(
        &self,
        src: &Self::Buffer,
        dst: &mut Self::Buffer,
        light: &Lighting<f32>,
        cfg: &LaunchConfig,
    ) -> ComputeResult<()> {
        let (rows, cols) = src.shape();
        if dst.shape() != (rows, cols) {
            return Err(ComputeError::OperationFailed(format!(
                "destination {:?} does not match source {:?}",
                dst.shape(),
                (rows, cols)
            )));
        }
        if rows == 0 || cols == 0 {
            return Ok(());
        }

        let (bx, by) = (cfg.block_dim.0 as usize, cfg.block_dim.1 as usize);
        let (gx, gy) = (cfg.grid_dim.0 as usize, cfg.grid_dim.1 as usize);
        let input = src.data();

        dst.data
            .par_chunks_mut(by * cols)
            .take(gy)
            .enumerate()
            .for_each(|(block_y, band)| {
                for block_x in 0..gx {
                    for ty in 0..by {
                        let i = block_y * by + ty;
                        for tx in 0..bx {
                            let j = block_x * bx + tx;
                            if let Some(v) = cell_kernel(input, rows, cols, i, j, light) {
                                band[ty * cols + j] = v;
                            }
                        }
                    }
                }
            });

        Ok(())
    }

    fn exec_fill_border(&self, dst: &mut Self::Buffer, value: f32) -> ComputeResult<()> {
        let (rows, cols) = dst.shape();
        fill_border(&mut dst.data, rows, cols, value);
        Ok(())
    }

    fn synchronize(&self) -> ComputeResult<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "cpu"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::run_hillshade;
    use crate::model::HillshadeParams;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_main_pass_writes_interior_only() {
        let dev = CpuDevice::new();
        let src = dev.upload(&vec![5.0; 6 * 7], 6, 7).unwrap();
        let mut dst = CpuBuffer::new(vec![-1.0; 6 * 7], 6, 7);
        let light = Lighting::<f32>::from_params(&HillshadeParams::default());
        dev.exec_hillshade(&src, &mut dst, &light, &LaunchConfig::for_grid(6, 7).unwrap()).unwrap();

        for r in 0..6 {
            for c in 0..7 {
                let v = dst.data()[r * 7 + c];
                if r == 0 || c == 0 || r == 5 || c == 6 {
                    assert_eq!(v, -1.0, "border ({r}, {c}) was written");
                } else {
                    assert_abs_diff_eq!(v, 0.71131, epsilon = 1e-4);
                }
            }
        }
    }

    #[test]
    fn test_spans_multiple_blocks() {
        let dev = CpuDevice::new();
        let (rows, cols) = (37, 50);
        let data: Vec<f32> = (0..rows * cols).map(|k| (k % 11) as f32).collect();
        let src = dev.upload(&data, rows, cols).unwrap();
        let out = run_hillshade(&dev, &src, &HillshadeParams::default()).unwrap();
        let out = dev.download(&out).unwrap();
        assert_eq!(out.len(), rows * cols);
        let nan_count = out.iter().filter(|v| v.is_nan()).count();
        assert_eq!(nan_count, 2 * cols + 2 * (rows - 2));
    }

    #[test]
    fn test_upload_size_checked() {
        let dev = CpuDevice::new();
        assert!(dev.upload(&[1.0, 2.0, 3.0], 2, 2).is_err());
    }
}
