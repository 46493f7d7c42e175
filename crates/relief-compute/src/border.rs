//! Border policy.
//!
//! A cell on the outermost row or column of the whole grid has no two-sided
//! neighbourhood, so its illumination is undefined. Every backend ends by
//! writing the undefined sentinel (`NaN`) over that ring. The ring is
//! global: tile edges inside the grid are never treated as border.

/// Returns `true` if `(row, col)` lies on the outer ring of a `rows x cols` grid.
#[inline]
pub fn is_border(row: usize, col: usize, rows: usize, cols: usize) -> bool {
    row == 0 || col == 0 || row + 1 >= rows || col + 1 >= cols
}

/// Returns `true` if `(row, col)` has a full 3x3 neighbourhood.
#[inline]
pub fn is_interior(row: usize, col: usize, rows: usize, cols: usize) -> bool {
    row > 0 && col > 0 && row + 1 < rows && col + 1 < cols
}

/// Overwrites the first/last row and first/last column with `value`.
///
/// `data` is row-major `rows x cols`.
pub fn fill_border<T: Copy>(data: &mut [T], rows: usize, cols: usize, value: T) {
    if rows == 0 || cols == 0 {
        return;
    }
    debug_assert_eq!(data.len(), rows * cols);

    data[..cols].fill(value);
    data[(rows - 1) * cols..].fill(value);
    for row in data.chunks_exact_mut(cols) {
        row[0] = value;
        row[cols - 1] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_border() {
        let mut d = vec![1.0f32; 4 * 5];
        fill_border(&mut d, 4, 5, f32::NAN);
        for r in 0..4 {
            for c in 0..5 {
                let v = d[r * 5 + c];
                assert_eq!(v.is_nan(), is_border(r, c, 4, 5), "cell ({r}, {c})");
            }
        }
    }

    #[test]
    fn test_tiny_grids_are_all_border() {
        for (rows, cols) in [(1, 1), (1, 5), (2, 2), (2, 7), (6, 2)] {
            for r in 0..rows {
                for c in 0..cols {
                    assert!(is_border(r, c, rows, cols));
                    assert!(!is_interior(r, c, rows, cols));
                }
            }
        }
    }

    #[test]
    fn test_fill_border_empty() {
        let mut d: Vec<f64> = Vec::new();
        fill_border(&mut d, 0, 3, f64::NAN);
        assert!(d.is_empty());
    }
}
