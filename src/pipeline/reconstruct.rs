//! Rebuilding a full-resolution color image from the prediction.

use image::RgbImage;

use crate::error::{Error, Result};
use crate::image::{lab_to_rgb, resize_bilinear, LabImage, LightnessGrid, Quantized};

use super::inference::ChromaPrediction;

/// Combine predicted chrominance with the original lightness.
///
/// The prediction is resized to `width` x `height`, stacked under the
/// full-resolution L* channel, converted back to sRGB, clipped to [0, 1] and
/// quantized to 8 bits.
///
/// # Errors
///
/// Returns an error if `lightness` is not `width` x `height`.
pub fn reconstruct(
    prediction: &ChromaPrediction,
    lightness: &LightnessGrid,
    width: u32,
    height: u32,
) -> Result<RgbImage> {
    reconstruct_quantized(prediction, lightness, width, height).map(|q| q.image)
}

/// Like [`reconstruct`], but also reports how many values were saturated.
///
/// # Errors
///
/// Returns an error if `lightness` is not `width` x `height`.
pub fn reconstruct_quantized(
    prediction: &ChromaPrediction,
    lightness: &LightnessGrid,
    width: u32,
    height: u32,
) -> Result<Quantized> {
    let (w, h) = (width as usize, height as usize);
    if (lightness.width(), lightness.height()) != (w, h) {
        return Err(Error::ShapeMismatch {
            expected: format!("{width}x{height} lightness"),
            actual: format!("{}x{}", lightness.width(), lightness.height()),
        });
    }

    let ab = resize_bilinear(prediction.view(), h, w);
    let lab = LabImage::from_parts(lightness, ab.view())?;
    let quantized = lab_to_rgb(&lab);

    tracing::debug!(
        "Saturated {} of {} channel values ({:.3}%)",
        quantized.saturated,
        quantized.image.as_raw().len(),
        quantized.saturation_rate() * 100.0
    );
    Ok(quantized)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use image::Rgb;
    use ndarray::{Array2, Array3};

    use super::*;
    use crate::image::rgb_to_lab;

    #[test]
    fn test_target_size() {
        let prediction = ChromaPrediction::from_array(Array3::zeros((8, 8, 2))).unwrap();
        let lightness = LightnessGrid::from_array(Array2::from_elem((13, 29), 60.0));

        let img = reconstruct(&prediction, &lightness, 29, 13).unwrap();

        assert_eq!(img.dimensions(), (29, 13));
    }

    #[test]
    fn test_zero_chroma_keeps_gray() {
        let original = RgbImage::from_fn(9, 4, |x, y| {
            let v = u8::try_from(x * 25 + y * 3).unwrap();
            Rgb([v, v, v])
        });
        let lightness = rgb_to_lab(&original).lightness();
        let prediction = ChromaPrediction::from_array(Array3::zeros((3, 3, 2))).unwrap();

        let img = reconstruct(&prediction, &lightness, 9, 4).unwrap();

        for (a, b) in original.as_raw().iter().zip(img.as_raw()) {
            assert!(a.abs_diff(*b) <= 1, "{a} vs {b}");
        }
    }

    #[test]
    fn test_chroma_is_applied() {
        let lightness = LightnessGrid::from_array(Array2::from_elem((2, 2), 55.0));
        // A warm reddish prediction
        let prediction =
            ChromaPrediction::from_array(Array3::from_shape_fn((1, 1, 2), |(_, _, c)| {
                if c == 0 {
                    40.0
                } else {
                    30.0
                }
            }))
            .unwrap();

        let img = reconstruct(&prediction, &lightness, 2, 2).unwrap();

        let px = img.get_pixel(1, 1);
        assert!(px[0] > px[1] && px[0] > px[2], "{px:?}");
    }

    #[test]
    fn test_out_of_range_prediction_saturates() {
        let lightness = LightnessGrid::from_array(Array2::from_elem((3, 3), 100.0));
        let prediction = ChromaPrediction::from_array(Array3::from_shape_fn((2, 2, 2), |(_, _, c)| {
            if c == 0 {
                500.0
            } else {
                -500.0
            }
        }))
        .unwrap();

        let out = reconstruct_quantized(&prediction, &lightness, 3, 3).unwrap();

        // Lab(100, 500, -500) leaves sRGB on all three channels
        assert_eq!(out.saturated, 27);
        assert_abs_diff_eq!(out.saturation_rate(), 1.0);
        assert!(out.image.pixels().all(|p| p == &Rgb([0, 0, 255])));
    }

    #[test]
    fn test_in_gamut_prediction_is_not_saturated() {
        let lightness = LightnessGrid::from_array(Array2::from_elem((4, 4), 60.0));
        let prediction = ChromaPrediction::from_array(Array3::from_shape_fn((2, 2, 2), |(_, _, c)| {
            if c == 0 {
                10.0
            } else {
                -10.0
            }
        }))
        .unwrap();

        let out = reconstruct_quantized(&prediction, &lightness, 4, 4).unwrap();

        assert_eq!(out.saturated, 0);
        assert_abs_diff_eq!(out.saturation_rate(), 0.0);
    }

    #[test]
    fn test_lightness_size_mismatch() {
        let prediction = ChromaPrediction::from_array(Array3::zeros((2, 2, 2))).unwrap();
        let lightness = LightnessGrid::from_array(Array2::zeros((5, 5)));

        assert!(matches!(
            reconstruct(&prediction, &lightness, 6, 5),
            Err(Error::ShapeMismatch { .. })
        ));
    }
}
