//! The single-image colorization pipeline.
//!
//! Preprocessing, inference and reconstruction run strictly in that order,
//! against a network loaded once up front.

mod colorize;
mod inference;
mod preprocess;
mod reconstruct;

pub use colorize::{colorize, default_output_path, Config, Pipeline};
pub use inference::{infer, ChromaPrediction};
pub use preprocess::{prepare, NetworkInput, Prepared, LIGHTNESS_MEAN};
pub use reconstruct::{reconstruct, reconstruct_quantized};
