//! One forward pass through the colorization network.

use ndarray::{Array3, ArrayView3};

use crate::error::{Error, Result};
use crate::image::CHROMA_CHANNELS;
use crate::model::Network;

use super::preprocess::NetworkInput;

/// Predicted (a*, b*) at the network's output resolution, indexed
/// (row, column, channel).
#[derive(Debug, Clone, PartialEq)]
pub struct ChromaPrediction(Array3<f32>);

impl ChromaPrediction {
    /// Wrap a (height, width, 2) array.
    ///
    /// # Errors
    ///
    /// Returns an error if the array is empty or does not have two channels.
    pub fn from_array(data: Array3<f32>) -> Result<Self> {
        let (height, width, channels) = data.dim();
        if height == 0 || width == 0 || channels != CHROMA_CHANNELS {
            return Err(Error::ShapeMismatch {
                expected: format!("non-empty HxWx{CHROMA_CHANNELS} chrominance"),
                actual: format!("{height}x{width}x{channels}"),
            });
        }
        Ok(Self(data))
    }

    /// Height of the prediction grid.
    #[must_use]
    pub fn height(&self) -> usize {
        self.0.dim().0
    }

    /// Width of the prediction grid.
    #[must_use]
    pub fn width(&self) -> usize {
        self.0.dim().1
    }

    /// Borrow the (row, column, channel) array.
    #[must_use]
    pub fn view(&self) -> ArrayView3<'_, f32> {
        self.0.view()
    }
}

/// Run the network on a prepared input.
///
/// Deterministic: the same input and network always give the same prediction.
///
/// # Errors
///
/// Returns an error if the forward pass fails, returns an unexpected shape,
/// or produces NaN or infinite values.
pub fn infer(network: &Network, input: &NetworkInput) -> Result<ChromaPrediction> {
    let output = network.forward(input.to_tensor())?;

    let (batch, channels, height, width) = output.dim();
    if batch != 1 || channels != CHROMA_CHANNELS {
        return Err(Error::ShapeMismatch {
            expected: format!("(1, {CHROMA_CHANNELS}, H, W)"),
            actual: format!("{:?}", output.shape()),
        });
    }
    if output.iter().any(|v| !v.is_finite()) {
        return Err(Error::NonFinite {
            stage: "forward pass",
        });
    }

    tracing::debug!("Predicted chrominance at {width}x{height}");

    // (1, C, H, W) -> (H, W, C)
    let ab = output
        .index_axis_move(ndarray::Axis(0), 0)
        .permuted_axes([1, 2, 0])
        .as_standard_layout()
        .into_owned();
    ChromaPrediction::from_array(ab)
}
