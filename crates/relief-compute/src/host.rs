//! Host kernel: whole-grid hillshade in `f64`.
//!
//! Computes discrete gradients for every cell, applies [`model::shade`]
//! element-wise and voids the outer ring. Rows are evaluated in parallel on
//! the rayon pool; the call itself is synchronous.

use rayon::prelude::*;
use relief_core::Grid;
use tracing::trace;

use crate::border::fill_border;
use crate::model::{self, HillshadeParams, Lighting};

/// Discrete gradient along rows (`x`) and columns (`y`).
///
/// Interior cells use the central difference `(f[i+1] - f[i-1]) / 2`, edge
/// cells the one-sided difference. An axis shorter than 2 has no defined
/// gradient and yields `NaN`.
pub fn gradient(grid: &Grid<f64>) -> (Grid<f64>, Grid<f64>) {
    let (rows, cols) = grid.shape();
    let mut gx = Grid::filled(rows, cols, f64::NAN);
    let mut gy = Grid::filled(rows, cols, f64::NAN);
    if rows == 0 || cols == 0 {
        return (gx, gy);
    }

    if rows >= 2 {
        gx.data_mut()
            .par_chunks_mut(cols)
            .enumerate()
            .for_each(|(r, out)| {
                let (above, below, scale) = if r == 0 {
                    (grid.row(0), grid.row(1), 1.0)
                } else if r == rows - 1 {
                    (grid.row(rows - 2), grid.row(rows - 1), 1.0)
                } else {
                    (grid.row(r - 1), grid.row(r + 1), 2.0)
                };
                for c in 0..cols {
                    out[c] = (below[c] - above[c]) / scale;
                }
            });
    }

    if cols >= 2 {
        gy.data_mut()
            .par_chunks_mut(cols)
            .enumerate()
            .for_each(|(r, out)| {
                let src = grid.row(r);
                out[0] = src[1] - src[0];
                out[cols - 1] = src[cols - 1] - src[cols - 2];
                for c in 1..cols - 1 {
                    out[c] = (src[c + 1] - src[c - 1]) / 2.0;
                }
            });
    }

    (gx, gy)
}

/// Hillshade of a whole in-memory grid.
///
/// Output has the input's shape. The outer ring is `NaN`; so is every cell
/// whose stencil touches a `NaN` or infinite elevation. Grids with fewer than
/// three rows or columns have no interior and come back all `NaN`.
pub fn hillshade_host(grid: &Grid<f64>, params: &HillshadeParams) -> Grid<f64> {
    let (rows, cols) = grid.shape();
    if rows < 3 || cols < 3 {
        return Grid::filled(rows, cols, f64::NAN);
    }
    trace!(rows, cols, "host hillshade");

    let light = Lighting::<f64>::from_params(params);
    let (gx, gy) = gradient(grid);

    let mut out = Grid::filled(rows, cols, f64::NAN);
    out.data_mut()
        .par_chunks_mut(cols)
        .zip(gx.data().par_chunks(cols))
        .zip(gy.data().par_chunks(cols))
        .for_each(|((out, xs), ys)| {
            for ((o, &x), &y) in out.iter_mut().zip(xs).zip(ys) {
                *o = model::shade(x, y, &light);
            }
        });

    fill_border(out.data_mut(), rows, cols, f64::NAN);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::border::is_border;
    use approx::assert_abs_diff_eq;

    fn ramp(rows: usize, cols: usize) -> Grid<f64> {
        Grid::from_fn(rows, cols, |r, c| 3.0 * r as f64 + 0.5 * c as f64)
    }

    #[test]
    fn test_gradient_linear_surface() {
        let (gx, gy) = gradient(&ramp(5, 6));
        for v in gx.data() {
            assert_abs_diff_eq!(*v, 3.0);
        }
        for v in gy.data() {
            assert_abs_diff_eq!(*v, 0.5);
        }
    }

    #[test]
    fn test_gradient_edges_one_sided() {
        let g = Grid::from_vec(vec![0.0, 1.0, 4.0, 9.0], 1, 4).unwrap();
        let (gx, gy) = gradient(&g);
        assert_eq!(gy.data(), &[1.0, 2.0, 4.0, 5.0]);
        assert!(gx.data().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_shape_and_border() {
        let out = hillshade_host(&ramp(7, 9), &HillshadeParams::default());
        assert_eq!(out.shape(), (7, 9));
        for r in 0..7 {
            for c in 0..9 {
                assert_eq!(out[(r, c)].is_nan(), is_border(r, c, 7, 9), "cell ({r}, {c})");
            }
        }
    }

    #[test]
    fn test_flat_surface() {
        let out = hillshade_host(&Grid::filled(6, 6, 1234.5), &HillshadeParams::new(17.0, 25.0));
        let expected = (25.0f64.to_radians().sin() + 1.0) / 2.0;
        for r in 1..5 {
            for c in 1..5 {
                assert_abs_diff_eq!(out[(r, c)], expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_small_grid_all_undefined() {
        for (rows, cols) in [(0, 0), (1, 1), (2, 2), (2, 5), (5, 1)] {
            let out = hillshade_host(&Grid::filled(rows, cols, 1.0), &HillshadeParams::default());
            assert_eq!(out.shape(), (rows, cols));
            assert!(out.data().iter().all(|v| v.is_nan()));
        }
    }

    #[test]
    fn test_nodata_propagation() {
        let mut dem = ramp(7, 7);
        dem[(3, 3)] = f64::NAN;
        dem[(1, 5)] = f64::INFINITY;
        let out = hillshade_host(&dem, &HillshadeParams::default());

        // stencil neighbours of (3, 3)
        for (r, c) in [(2, 3), (4, 3), (3, 2), (3, 4)] {
            assert!(out[(r, c)].is_nan(), "({r}, {c}) should be NaN");
        }
        // stencil neighbours of (1, 5)
        for (r, c) in [(2, 5), (1, 4)] {
            assert!(out[(r, c)].is_nan(), "({r}, {c}) should be NaN");
        }
        // the no-data cell itself uses only its neighbours
        assert!(!out[(3, 3)].is_nan());
        assert!(!out[(5, 5)].is_nan());
    }

    #[test]
    fn test_deterministic() {
        let dem = Grid::from_fn(20, 17, |r, c| ((r * 31 + c * 7) % 13) as f64 * 2.5);
        let a = hillshade_host(&dem, &HillshadeParams::default());
        let b = hillshade_host(&dem, &HillshadeParams::default());
        for (x, y) in a.data().iter().zip(b.data()) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }
}
