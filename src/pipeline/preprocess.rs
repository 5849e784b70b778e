//! Turning a decoded image into the network's input.

use image::{DynamicImage, GenericImageView};
use ndarray::{Array2, Array4, ArrayView2};

use crate::error::{Error, Result};
use crate::image::{rgb_to_lab, LightnessGrid};

/// Mean L* of the training distribution, subtracted from the network input.
pub const LIGHTNESS_MEAN: f32 = 50.0;

/// Mean-centered lightness at the network's input resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkInput(Array2<f32>);

impl NetworkInput {
    /// Wrap an already mean-centered lightness grid.
    #[must_use]
    pub const fn from_array(data: Array2<f32>) -> Self {
        Self(data)
    }

    /// Borrow the grid.
    #[must_use]
    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.0.view()
    }

    /// The grid as a single-image, single-channel NCHW tensor.
    #[must_use]
    pub fn to_tensor(&self) -> Array4<f32> {
        self.0.clone().insert_axis(ndarray::Axis(0)).insert_axis(ndarray::Axis(0))
    }
}

/// Everything the later stages need from the input image.
#[derive(Debug, Clone)]
pub struct Prepared {
    /// Resized, mean-centered lightness fed to the network.
    pub input: NetworkInput,
    /// Lightness at the original resolution, unmodified.
    pub lightness: LightnessGrid,
    /// Original width in pixels.
    pub width: u32,
    /// Original height in pixels.
    pub height: u32,
}

/// Prepare an image for the network.
///
/// The image is:
/// 1. Converted to 8-bit RGB and normalized to [0, 1]
/// 2. Converted to CIE L*a*b*
/// 3. Resized to `input_size` x `input_size` with bilinear resampling
/// 4. Reduced to its L* channel, minus [`LIGHTNESS_MEAN`]
///
/// The L* channel of the full-resolution Lab image is returned alongside,
/// since resizing changes lightness values.
///
/// # Errors
///
/// Returns an error if the image has zero width or height.
pub fn prepare(img: &DynamicImage, input_size: usize) -> Result<Prepared> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(Error::EmptyImage { width, height });
    }

    let lab = rgb_to_lab(&img.to_rgb8());

    let mut resized = lab.resized(input_size, input_size).lightness().into_array();
    resized -= LIGHTNESS_MEAN;

    Ok(Prepared {
        input: NetworkInput(resized),
        lightness: lab.lightness(),
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    use super::*;

    #[test]
    fn test_shapes() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(40, 25));

        let prepared = prepare(&img, 224).unwrap();

        assert_eq!(prepared.input.view().dim(), (224, 224));
        assert_eq!(prepared.input.to_tensor().dim(), (1, 1, 224, 224));
        assert_eq!((prepared.lightness.height(), prepared.lightness.width()), (25, 40));
        assert_eq!((prepared.width, prepared.height), (40, 25));
    }

    #[test]
    fn test_black_is_centered_at_minus_fifty() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(3, 3));
        let prepared = prepare(&img, 8).unwrap();
        for &v in prepared.input.view() {
            assert_abs_diff_eq!(v, -LIGHTNESS_MEAN, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_white_lightness() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([255, 255, 255])));
        let prepared = prepare(&img, 4).unwrap();
        for &v in prepared.input.view() {
            assert_abs_diff_eq!(v, 50.0, epsilon = 0.05);
        }
        for &v in prepared.lightness.view() {
            assert_abs_diff_eq!(v, 100.0, epsilon = 0.05);
        }
    }

    #[test]
    fn test_full_resolution_lightness_is_not_resampled() {
        // A hard edge survives at full resolution but is blurred in the resized grid.
        let img = GrayImage::from_fn(6, 1, |x, _| if x < 3 { Luma([0]) } else { Luma([255]) });
        let prepared = prepare(&DynamicImage::ImageLuma8(img), 5).unwrap();

        let full = prepared.lightness.view();
        assert_abs_diff_eq!(full[[0, 2]], 0.0, epsilon = 1e-3);
        assert_abs_diff_eq!(full[[0, 3]], 100.0, epsilon = 0.05);

        // The middle sample straddles the edge: L* = 50, centered to 0
        let resized = prepared.input.view();
        assert_abs_diff_eq!(resized[[0, 2]], 0.0, epsilon = 0.05);
    }

    #[test]
    fn test_empty_image() {
        let img = DynamicImage::new_rgb8(0, 10);
        assert!(matches!(
            prepare(&img, 224),
            Err(Error::EmptyImage { width: 0, height: 10 })
        ));
    }
}
