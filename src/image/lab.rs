//! Conversion between 8-bit sRGB images and CIE L*a*b* grids.
//!
//! Both directions go through linear sRGB with a D65 white point, matching the
//! color space the colorization network was trained in.

use image::{Rgb, RgbImage};
use ndarray::Array3;
use palette::convert::{FromColorUnclamped, IntoColorUnclamped};
use palette::{Lab, LinSrgb, Srgb};

use super::{LabImage, LAB_CHANNELS};

/// An 8-bit image together with how many channel values had to be saturated.
#[derive(Debug, Clone)]
pub struct Quantized {
    /// The displayable image.
    pub image: RgbImage,
    /// Number of channel values that fell outside [0, 1] before clipping.
    pub saturated: usize,
}

impl Quantized {
    /// Fraction of channel values that were saturated.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn saturation_rate(&self) -> f64 {
        let total = self.image.as_raw().len();
        if total == 0 {
            return 0.0;
        }
        self.saturated as f64 / total as f64
    }
}

/// Convert an 8-bit sRGB image to L*a*b*.
///
/// Pixel values are first normalized from [0, 255] to [0, 1].
#[must_use]
pub fn rgb_to_lab(img: &RgbImage) -> LabImage {
    let (width, height) = (img.width() as usize, img.height() as usize);
    let mut data = Array3::<f32>::zeros((height, width, LAB_CHANNELS));

    for (x, y, pixel) in img.enumerate_pixels() {
        let [l, a, b] = srgb_to_lab([
            f32::from(pixel[0]) / 255.0,
            f32::from(pixel[1]) / 255.0,
            f32::from(pixel[2]) / 255.0,
        ]);
        let (row, col) = (y as usize, x as usize);
        data[[row, col, 0]] = l;
        data[[row, col, 1]] = a;
        data[[row, col, 2]] = b;
    }

    LabImage(data)
}

/// Convert an L*a*b* grid back to an 8-bit sRGB image.
///
/// Out-of-gamut values are clipped to [0, 1] before being scaled to
/// [0, 255] and rounded to the nearest integer.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn lab_to_rgb(lab: &LabImage) -> Quantized {
    let view = lab.view();
    let (height, width, _) = view.dim();

    // Safe: dimensions originate from u32 image sizes
    let mut image = RgbImage::new(width as u32, height as u32);
    let mut saturated = 0;

    for (row, col) in ndarray::indices((height, width)) {
        let rgb = lab_to_srgb([
            view[[row, col, 0]],
            view[[row, col, 1]],
            view[[row, col, 2]],
        ]);
        let mut channels = [0u8; 3];
        for (slot, value) in channels.iter_mut().zip(rgb) {
            let (byte, clipped) = quantize(value);
            *slot = byte;
            saturated += usize::from(clipped);
        }
        image.put_pixel(col as u32, row as u32, Rgb(channels));
    }

    Quantized { image, saturated }
}

/// Convert one normalized sRGB triple to L*a*b*.
///
/// Uses palette's unclamped conversion; components are passed through as is.
#[inline]
pub(crate) fn srgb_to_lab(rgb: [f32; 3]) -> [f32; 3] {
    let linear: LinSrgb<f32> = Srgb::new(rgb[0], rgb[1], rgb[2]).into_linear();
    let lab: Lab = Lab::from_color_unclamped(linear);
    [lab.l, lab.a, lab.b]
}

/// Convert one L*a*b* triple to normalized sRGB.
///
/// Uses palette's unclamped conversion, so out-of-gamut colors come back
/// outside [0, 1]. Clipping is left to [`quantize`].
#[inline]
pub(crate) fn lab_to_srgb(lab: [f32; 3]) -> [f32; 3] {
    let linear: LinSrgb<f32> = Lab::new(lab[0], lab[1], lab[2]).into_color_unclamped();
    let srgb: Srgb<f32> = Srgb::from_linear(linear);
    [srgb.red, srgb.green, srgb.blue]
}

/// Clip a normalized value to [0, 1] and scale it to a byte.
///
/// Returns whether the value had to be saturated. NaN saturates to 0.
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn quantize(value: f32) -> (u8, bool) {
    if value.is_nan() {
        return (0, true);
    }
    let clipped = !(0.0..=1.0).contains(&value);
    // Safe: clamped to [0, 255] before casting
    ((value.clamp(0.0, 1.0) * 255.0).round() as u8, clipped)
}
