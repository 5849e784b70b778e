//! Image loading, color conversion, resampling, and saving utilities.

mod compare;
mod lab;
mod load;
mod resize;
mod save;

pub use compare::side_by_side;
pub use lab::{lab_to_rgb, rgb_to_lab, Quantized};
pub use load::load_image;
pub use resize::resize_bilinear;
pub use save::{save_image, stage_image, PendingSave};

use ndarray::{s, Array2, Array3, ArrayView2, ArrayView3, Axis};

use crate::error::{Error, Result};

/// Number of channels in a CIE L*a*b* grid.
pub const LAB_CHANNELS: usize = 3;

/// Number of chrominance channels (a*, b*).
pub const CHROMA_CHANNELS: usize = 2;

/// An image in CIE L*a*b* space, stored as (row, column, channel).
///
/// L* lies in [0, 100]; a* and b* are unbounded but in practice within
/// roughly [-128, 127].
#[derive(Debug, Clone, PartialEq)]
pub struct LabImage(Array3<f32>);

impl LabImage {
    /// Wrap a (height, width, 3) array.
    ///
    /// # Errors
    ///
    /// Returns an error if the last axis is not three channels wide.
    pub fn from_array(data: Array3<f32>) -> Result<Self> {
        let (_, _, channels) = data.dim();
        if channels != LAB_CHANNELS {
            return Err(Error::ShapeMismatch {
                expected: format!("{LAB_CHANNELS} Lab channels"),
                actual: format!("{channels} channels"),
            });
        }
        Ok(Self(data))
    }

    /// Merge a lightness grid with a chrominance grid of the same size.
    ///
    /// # Errors
    ///
    /// Returns an error if the grids disagree on height or width.
    pub fn from_parts(lightness: &LightnessGrid, chroma: ArrayView3<'_, f32>) -> Result<Self> {
        let (height, width, channels) = chroma.dim();
        if lightness.0.dim() != (height, width) || channels != CHROMA_CHANNELS {
            return Err(Error::ShapeMismatch {
                expected: format!(
                    "{}x{}x{CHROMA_CHANNELS} chrominance",
                    lightness.height(),
                    lightness.width()
                ),
                actual: format!("{height}x{width}x{channels}"),
            });
        }

        let mut data = Array3::<f32>::zeros((height, width, LAB_CHANNELS));
        data.slice_mut(s![.., .., 0]).assign(&lightness.0);
        data.slice_mut(s![.., .., 1..]).assign(&chroma);
        Ok(Self(data))
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> usize {
        self.0.dim().0
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> usize {
        self.0.dim().1
    }

    /// Borrow the underlying (row, column, channel) array.
    #[must_use]
    pub fn view(&self) -> ArrayView3<'_, f32> {
        self.0.view()
    }

    /// Copy out the L* channel.
    #[must_use]
    pub fn lightness(&self) -> LightnessGrid {
        LightnessGrid(self.0.index_axis(Axis(2), 0).to_owned())
    }

    /// Resample every channel to the given size.
    #[must_use]
    pub fn resized(&self, width: usize, height: usize) -> Self {
        Self(resize_bilinear(self.0.view(), height, width))
    }
}

/// A single-channel grid of L* values, stored as (row, column).
#[derive(Debug, Clone, PartialEq)]
pub struct LightnessGrid(Array2<f32>);

impl LightnessGrid {
    /// Wrap a (height, width) array of L* values.
    #[must_use]
    pub const fn from_array(data: Array2<f32>) -> Self {
        Self(data)
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> usize {
        self.0.dim().0
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> usize {
        self.0.dim().1
    }

    /// Borrow the underlying array.
    #[must_use]
    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.0.view()
    }

    /// Consume the grid, returning the underlying array.
    #[must_use]
    pub fn into_array(self) -> Array2<f32> {
        self.0
    }
}
