//! Custom error types for colorizer.

use std::path::PathBuf;
use thiserror::Error;

/// Broad classification of a failure, used by callers to decide what to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Model artifacts are missing or corrupt. Fatal at startup.
    ModelLoad,
    /// The input image is unreadable or empty.
    InvalidImage,
    /// The forward pass or the numeric post-processing failed.
    Inference,
    /// Writing the result failed.
    Output,
    /// A configuration value is out of range.
    Config,
}

/// Main error type for the colorizer library.
#[derive(Error, Debug)]
pub enum Error {
    /// A model artifact does not exist on disk.
    #[error("model file {path} does not exist")]
    ModelFileMissing { path: PathBuf },

    /// A model artifact exists but could not be read.
    #[error("failed to read model file {path}: {source}")]
    ModelRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The topology document is not valid JSON for the expected schema.
    #[error("failed to parse topology {path}: {source}")]
    TopologyParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The topology parsed but describes a graph we cannot run.
    #[error("invalid topology: {reason}")]
    InvalidTopology { reason: String },

    /// A layer referenced by the loader is absent from the graph.
    #[error("layer {name} not found in {graph}")]
    MissingLayer { name: String, graph: String },

    /// The cluster-point table could not be decoded.
    #[error("failed to read cluster points from {path}: {reason}")]
    ClusterPointsRead { path: PathBuf, reason: String },

    /// The cluster-point table has the wrong shape or contains non-finite values.
    #[error("invalid cluster points: {reason}")]
    InvalidClusterPoints { reason: String },

    /// Failed to load an ONNX model.
    #[error("failed to load ONNX model {name}: {source}")]
    ModelLoad {
        name: String,
        #[source]
        source: ort::Error,
    },

    /// Failed to load an image file.
    #[error("failed to load image from {path}: {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The image has no pixels.
    #[error("image has empty dimensions {width}x{height}")]
    EmptyImage { width: u32, height: u32 },

    /// Model inference failed.
    #[error("model inference failed: {source}")]
    Inference {
        #[source]
        source: ort::Error,
    },

    /// Shape mismatch in tensor operations.
    #[error("tensor shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// NaN or infinity appeared in a numeric stage.
    #[error("non-finite value produced by {stage}")]
    NonFinite { stage: &'static str },

    /// A previous forward pass panicked while holding the session.
    #[error("inference session is poisoned by an earlier panic")]
    SessionPoisoned,

    /// Failed to save an image file.
    #[error("failed to save image to {path}: {source}")]
    ImageSave {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Invalid parameter value.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ModelFileMissing { .. }
            | Self::ModelRead { .. }
            | Self::TopologyParse { .. }
            | Self::InvalidTopology { .. }
            | Self::MissingLayer { .. }
            | Self::ClusterPointsRead { .. }
            | Self::InvalidClusterPoints { .. }
            | Self::ModelLoad { .. } => ErrorKind::ModelLoad,
            Self::ImageLoad { .. } | Self::EmptyImage { .. } => ErrorKind::InvalidImage,
            Self::Inference { .. }
            | Self::ShapeMismatch { .. }
            | Self::NonFinite { .. }
            | Self::SessionPoisoned => ErrorKind::Inference,
            Self::ImageSave { .. } | Self::Io(_) => ErrorKind::Output,
            Self::InvalidParameter { .. } => ErrorKind::Config,
        }
    }

    /// Whether retrying with a different input can reasonably succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::InvalidImage)
    }
}

/// Result type alias for colorizer operations.
pub type Result<T> = std::result::Result<T, Error>;
