//! # colorizer
//!
//! Colorize grayscale photographs with a pretrained network that predicts
//! CIE L*a*b* chrominance from lightness.
//!
//! The network classifies every pixel into 313 quantized ab bins. Its logits
//! are rebalanced, turned into a distribution, and projected onto the bin
//! centers to give a low-resolution ab prediction, which is upsampled and
//! merged with the original lightness.
//!
//! ## Example
//!
//! ```no_run
//! use colorizer::{Config, Pipeline};
//!
//! # fn main() -> colorizer::Result<()> {
//! let config = Config::default();
//! let pipeline = Pipeline::new(config)?;
//!
//! pipeline.process("grandparents.jpg", "grandparents_colorized.jpg")?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod image;
pub mod model;
pub mod pipeline;

pub use error::{Error, ErrorKind, Result};
pub use model::{load_network, ModelFiles, Network};
pub use pipeline::{colorize, Config, Pipeline};
