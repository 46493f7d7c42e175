//! Cross-backend hillshade tests.

use approx::assert_abs_diff_eq;
use relief_compute::{
    AnyDevice, Backend, ChunkedGrid, ExecutorConfig, HillshadeParams, TiledExecutor, hillshade_host,
};
use relief_core::Grid;

fn terrain(rows: usize, cols: usize) -> Grid<f64> {
    Grid::from_fn(rows, cols, |r, c| {
        let (y, x) = (r as f64 / 7.0, c as f64 / 5.0);
        120.0 + 35.0 * y.sin() * x.cos() + 0.8 * r as f64 - 0.3 * c as f64
    })
}

fn border_is_nan(data: &[f64], rows: usize, cols: usize) -> bool {
    (0..rows).all(|r| {
        (0..cols).all(|c| {
            let edge = r == 0 || c == 0 || r == rows - 1 || c == cols - 1;
            !edge || data[r * cols + c].is_nan()
        })
    })
}

fn device_run(grid: &Grid<f64>, params: &HillshadeParams) -> Grid<f32> {
    let device = AnyDevice::create(Backend::Cpu).unwrap();
    let buf = device.upload(grid).unwrap();
    let out = device.hillshade(&buf, params).unwrap();
    device.download(&out).unwrap()
}

#[test]
fn test_shape_preserved() {
    let params = HillshadeParams::default();
    for (rows, cols) in [(2, 2), (3, 3), (2, 9), (17, 4), (64, 65)] {
        let g = terrain(rows, cols);
        assert_eq!(hillshade_host(&g, &params).shape(), (rows, cols));
        assert_eq!(device_run(&g, &params).shape(), (rows, cols));
        let tiled = TiledExecutor::new().execute_grid(&g, &params).unwrap();
        assert_eq!(tiled.shape(), (rows, cols));
    }
}

#[test]
fn test_border_undefined_all_backends() {
    let g = terrain(19, 23);
    let params = HillshadeParams::new(315.0, 45.0);

    let host = hillshade_host(&g, &params);
    assert!(border_is_nan(host.data(), 19, 23));

    let device: Vec<f64> = device_run(&g, &params).data().iter().map(|&v| v as f64).collect();
    assert!(border_is_nan(&device, 19, 23));

    let chunked = ChunkedGrid::from_grid(&g, 6, 8).unwrap();
    let tiled = TiledExecutor::new().execute_chunked(&chunked, &params).unwrap();
    assert!(border_is_nan(tiled.assemble().unwrap().data(), 19, 23));
}

#[test]
fn test_flat_surface_closed_form() {
    let g = Grid::filled(10, 12, 500.0);
    let expected = (25.0f64.to_radians().sin() + 1.0) / 2.0;
    for az in [0.0, 90.0, 225.0, 359.0] {
        let params = HillshadeParams::new(az, 25.0);
        let host = hillshade_host(&g, &params);
        let device = device_run(&g, &params);
        for r in 1..9 {
            for c in 1..11 {
                assert_abs_diff_eq!(host[(r, c)], expected, epsilon = 1e-12);
                assert_abs_diff_eq!(device[(r, c)] as f64, expected, epsilon = 1e-6);
            }
        }
    }
}

#[test]
fn test_host_device_agree() {
    let g = terrain(48, 37);
    for params in [
        HillshadeParams::default(),
        HillshadeParams::new(45.0, 60.0),
        HillshadeParams::new(-90.0, 5.0),
    ] {
        let host = hillshade_host(&g, &params);
        let device = device_run(&g, &params);
        for r in 1..47 {
            for c in 1..36 {
                assert_abs_diff_eq!(host[(r, c)], device[(r, c)] as f64, epsilon = 1e-3);
            }
        }
    }
}

#[test]
fn test_host_tiled_agree() {
    let g = terrain(53, 41);
    let params = HillshadeParams::default();
    let host = hillshade_host(&g, &params);

    for tile in [(8, 8), (13, 7), (53, 1)] {
        let exec = TiledExecutor::with_config(ExecutorConfig {
            tile_size: Some(tile),
            parallel: true,
        });
        let tiled = exec.execute_grid(&g, &params).unwrap();
        for r in 1..52 {
            for c in 1..40 {
                assert_abs_diff_eq!(host[(r, c)], tiled[(r, c)], epsilon = 1e-9);
            }
        }
    }

    let chunked = ChunkedGrid::from_grid(&g, 10, 9).unwrap();
    let tiled = TiledExecutor::new().execute_chunked(&chunked, &params).unwrap();
    let tiled = tiled.assemble().unwrap();
    for r in 1..52 {
        for c in 1..40 {
            assert_abs_diff_eq!(host[(r, c)], tiled[(r, c)], epsilon = 1e-9);
        }
    }
}

#[test]
fn test_nodata_propagation() {
    let mut g = terrain(12, 12);
    g[(5, 6)] = f64::NAN;
    g[(9, 2)] = f64::NEG_INFINITY;
    let params = HillshadeParams::default();

    let host = hillshade_host(&g, &params);
    let device = device_run(&g, &params);
    let chunked = ChunkedGrid::from_grid(&g, 5, 5).unwrap();
    let tiled = TiledExecutor::new()
        .execute_chunked(&chunked, &params)
        .unwrap()
        .assemble()
        .unwrap();

    for (r, c) in [(4, 6), (6, 6), (5, 5), (5, 7), (8, 2), (10, 2), (9, 1), (9, 3)] {
        assert!(host[(r, c)].is_nan(), "host ({r}, {c})");
        assert!(device[(r, c)].is_nan(), "device ({r}, {c})");
        assert!(tiled[(r, c)].is_nan(), "tiled ({r}, {c})");
    }
    assert!(!host[(2, 9)].is_nan());
}

#[test]
fn test_deterministic() {
    let g = terrain(33, 30);
    let params = HillshadeParams::new(200.0, 30.0);

    let a = hillshade_host(&g, &params);
    let b = hillshade_host(&g, &params);
    assert!(a.data().iter().zip(b.data()).all(|(x, y)| x.to_bits() == y.to_bits()));

    let c = device_run(&g, &params);
    let d = device_run(&g, &params);
    for (x, y) in c.data().iter().zip(d.data()) {
        if x.is_nan() {
            assert!(y.is_nan());
        } else {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-6);
        }
    }
}

#[test]
fn test_output_in_unit_interval() {
    let g = terrain(30, 30);
    let out = hillshade_host(&g, &HillshadeParams::new(123.0, 33.0));
    for v in out.data().iter().filter(|v| !v.is_nan()) {
        assert!((0.0..=1.0).contains(v), "{v}");
    }
}

#[cfg(feature = "cuda")]
#[test]
fn test_cuda_matches_host() {
    if !Backend::Cuda.is_available() {
        eprintln!("no CUDA device, skipping");
        return;
    }
    let g = terrain(70, 90);
    let params = HillshadeParams::default();
    let device = AnyDevice::create(Backend::Cuda).unwrap();
    let buf = device.upload(&g).unwrap();
    let out = device.download(&device.hillshade(&buf, &params).unwrap()).unwrap();
    let host = hillshade_host(&g, &params);

    for r in 0..70 {
        for c in 0..90 {
            if r == 0 || c == 0 || r == 69 || c == 89 {
                assert!(out[(r, c)].is_nan());
            } else {
                assert_abs_diff_eq!(host[(r, c)], out[(r, c)] as f64, epsilon = 1e-3);
            }
        }
    }
}
