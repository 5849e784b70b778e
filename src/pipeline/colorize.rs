//! Main colorization pipeline.

use std::fs;
use std::path::{Path, PathBuf};

use ::image::{DynamicImage, RgbImage};

use crate::error::{Error, Result};
use crate::image;
use crate::model::{load_network, ModelFiles, Network, SessionOptions};

use super::inference::infer;
use super::preprocess::prepare;
use super::reconstruct::reconstruct_quantized;

/// Configuration for the colorization pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    /// Where the topology, weights and cluster points live.
    pub model: ModelFiles,

    /// ONNX Runtime intra-op threads. `None` lets the runtime decide.
    pub intra_threads: Option<usize>,

    /// Output JPEG quality (1-100).
    pub output_quality: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: ModelFiles::default(),
            intra_threads: None,
            output_quality: 95,
        }
    }
}

impl Config {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.output_quality) {
            return Err(Error::InvalidParameter {
                name: "output_quality".to_string(),
                reason: "must be between 1 and 100".to_string(),
            });
        }

        if self.intra_threads == Some(0) {
            return Err(Error::InvalidParameter {
                name: "intra_threads".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Colorize a decoded image with an already loaded network.
///
/// The returned image has the same dimensions as `img`.
///
/// # Errors
///
/// Returns an error if the image is empty or inference fails.
pub fn colorize(network: &Network, img: &DynamicImage) -> Result<RgbImage> {
    let prepared = prepare(img, network.input_size())?;
    let prediction = infer(network, &prepared.input)?;
    let quantized = reconstruct_quantized(
        &prediction,
        &prepared.lightness,
        prepared.width,
        prepared.height,
    )?;
    Ok(quantized.image)
}

/// `photos/cat.jpg` -> `photos/cat_colorized.jpg`
///
/// Inputs without an extension get `.png`.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "image".into(), |s| s.to_string_lossy().into_owned());
    let ext = input
        .extension()
        .map_or_else(|| "png".into(), |e| e.to_string_lossy().into_owned());
    input.with_file_name(format!("{stem}_colorized.{ext}"))
}

/// The colorization pipeline: a loaded network plus output settings.
#[derive(Debug)]
pub struct Pipeline {
    config: Config,
    network: Network,
}

impl Pipeline {
    /// Create a new pipeline, loading the model once.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the model cannot
    /// be loaded.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        tracing::info!("Initializing pipeline with config: {config:?}");

        let options = SessionOptions {
            intra_threads: config.intra_threads,
        };
        let network = load_network(&config.model, &options)?;

        tracing::info!("Pipeline initialized successfully");

        Ok(Self { config, network })
    }

    /// Wrap an already assembled network.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn from_network(network: Network, config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, network })
    }

    /// The loaded network.
    #[must_use]
    pub const fn network(&self) -> &Network {
        &self.network
    }

    /// Colorize a decoded image.
    ///
    /// # Errors
    ///
    /// Returns an error if the image is empty or inference fails.
    pub fn colorize(&self, img: &DynamicImage) -> Result<RgbImage> {
        colorize(&self.network, img)
    }

    /// Colorize the image at `input_path` and write it to `output_path`.
    ///
    /// The output format follows the extension of `output_path`. Nothing is
    /// written if any stage fails.
    ///
    /// # Errors
    ///
    /// Returns an error if loading, colorization or saving fails.
    pub fn process<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_path: P,
        output_path: Q,
    ) -> Result<()> {
        self.run(input_path.as_ref(), output_path.as_ref(), None)
    }

    /// Like [`Pipeline::process`], and also write the original and the
    /// colorized image side by side to `comparison_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if loading, colorization or saving fails.
    pub fn process_with_comparison<P: AsRef<Path>, Q: AsRef<Path>, R: AsRef<Path>>(
        &self,
        input_path: P,
        output_path: Q,
        comparison_path: R,
    ) -> Result<()> {
        self.run(
            input_path.as_ref(),
            output_path.as_ref(),
            Some(comparison_path.as_ref()),
        )
    }

    fn run(&self, input_path: &Path, output_path: &Path, comparison: Option<&Path>) -> Result<()> {
        tracing::info!("Processing image: {}", input_path.display());

        let original = image::load_image(input_path)?;

        tracing::info!("Colorizing...");
        let colorized = self.colorize(&original)?;

        // Encode everything before any file lands at its destination
        let quality = self.config.output_quality;
        let output = image::stage_image(&colorized, output_path, quality)?;
        let comparison = comparison
            .map(|path| {
                let side_by_side = image::side_by_side(&original.to_rgb8(), &colorized);
                image::stage_image(&side_by_side, path, quality)
            })
            .transpose()?;

        tracing::info!("Saving output to: {}", output_path.display());
        output.commit()?;

        if let Some(pending) = comparison {
            tracing::info!("Saving comparison to: {}", pending.path().display());
            if let Err(err) = pending.commit() {
                let _ = fs::remove_file(output_path);
                return Err(err);
            }
        }

        tracing::info!("Processing complete");
        Ok(())
    }
}
