//! Side-by-side comparison images.

use image::{imageops, RgbImage};

/// Place `left` and `right` next to each other on one canvas.
///
/// The canvas is as tall as the taller image; a shorter image is top-aligned
/// and the gap below it is left black.
#[must_use]
pub fn side_by_side(left: &RgbImage, right: &RgbImage) -> RgbImage {
    let width = left.width() + right.width();
    let height = left.height().max(right.height());

    let mut canvas = RgbImage::new(width, height);
    imageops::replace(&mut canvas, left, 0, 0);
    imageops::replace(&mut canvas, right, i64::from(left.width()), 0);
    canvas
}
