//! Continuous resampling of multi-channel float grids.
//!
//! `image::imageops` clamps float samples to [0, 1], which would destroy L*a*b*
//! values, so grids are resampled directly on `ndarray` storage.

use ndarray::{Array3, ArrayView3, Zip};

/// One axis of the sampling lookup: source indices and their weights.
#[derive(Debug, Clone, Copy)]
struct Tap {
    lo: usize,
    hi: usize,
    w_lo: f32,
    w_hi: f32,
}

/// Bilinearly resample a (row, column, channel) grid to `out_h` x `out_w`.
///
/// Sample positions are aligned on pixel centers and clamped at the borders,
/// so resizing to the same size is the identity.
#[must_use]
pub fn resize_bilinear(src: ArrayView3<'_, f32>, out_h: usize, out_w: usize) -> Array3<f32> {
    let (in_h, in_w, channels) = src.dim();
    let mut out = Array3::<f32>::zeros((out_h, out_w, channels));
    if in_h == 0 || in_w == 0 {
        return out;
    }

    let rows = taps(in_h, out_h);
    let cols = taps(in_w, out_w);

    Zip::indexed(out.rows_mut()).for_each(|(oy, ox), mut pixel| {
        let ty = rows[oy];
        let tx = cols[ox];
        let w00 = ty.w_lo * tx.w_lo;
        let w01 = ty.w_lo * tx.w_hi;
        let w10 = ty.w_hi * tx.w_lo;
        let w11 = ty.w_hi * tx.w_hi;

        for (c, value) in pixel.iter_mut().enumerate() {
            *value = src[[ty.lo, tx.lo, c]] * w00
                + src[[ty.lo, tx.hi, c]] * w01
                + src[[ty.hi, tx.lo, c]] * w10
                + src[[ty.hi, tx.hi, c]] * w11;
        }
    });

    out
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn taps(in_len: usize, out_len: usize) -> Vec<Tap> {
    let scale = in_len as f32 / out_len as f32;
    (0..out_len)
        .map(|o| {
            let pos = ((o as f32 + 0.5) * scale - 0.5).clamp(0.0, (in_len - 1) as f32);
            // Safe: pos is clamped to [0, in_len - 1]
            let lo = pos.floor() as usize;
            let hi = (lo + 1).min(in_len - 1);
            let w_hi = pos - lo as f32;
            Tap {
                lo,
                hi,
                w_lo: 1.0 - w_hi,
                w_hi,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::Array3;

    use super::*;

    #[test]
    fn test_same_size_is_identity() {
        let grid = Array3::from_shape_vec((2, 2, 1), vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        let out = resize_bilinear(grid.view(), 2, 2);
        assert_eq!(out, grid);
    }

    #[test]
    fn test_downsample_to_center() {
        // A 1x1 output samples the center of the grid: the mean of all four corners.
        let grid = Array3::from_shape_vec((2, 2, 1), vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        let out = resize_bilinear(grid.view(), 1, 1);
        assert_abs_diff_eq!(out[[0, 0, 0]], 1.5, epsilon = 1e-6);
    }

    #[test]
    fn test_single_pixel_broadcasts() {
        let grid = Array3::from_shape_vec((1, 1, 3), vec![42.0, -3.0, 8.5]).unwrap();
        let out = resize_bilinear(grid.view(), 5, 7);
        assert_eq!(out.dim(), (5, 7, 3));
        for pixel in out.rows() {
            assert_eq!(pixel.to_vec(), vec![42.0, -3.0, 8.5]);
        }
    }

    #[test]
    fn test_values_outside_unit_range_survive() {
        let grid = Array3::from_elem((3, 3, 2), -90.0);
        let out = resize_bilinear(grid.view(), 6, 4);
        assert!(out.iter().all(|&v| (v + 90.0).abs() < 1e-4));
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn test_up_then_down_is_bounded() {
        let size = 224;
        let grid = Array3::from_shape_fn((size, size, 2), |(y, x, c)| {
            let (y, x) = (y as f32, x as f32);
            if c == 0 {
                40.0 * (x / 35.0).sin() + 10.0 * (y / 50.0).cos()
            } else {
                -30.0 * (y / 40.0).sin() + 0.1 * x
            }
        });

        let up = resize_bilinear(grid.view(), 613, 397);
        let back = resize_bilinear(up.view(), size, size);

        let max_err = grid
            .iter()
            .zip(back.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max);
        assert!(max_err < 1.0, "max error {max_err}");
    }

    #[test]
    fn test_empty_source() {
        let grid = Array3::<f32>::zeros((0, 4, 2));
        assert_eq!(resize_bilinear(grid.view(), 3, 3).dim(), (3, 3, 2));
    }
}
