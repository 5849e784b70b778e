//! Locating and loading the model artifacts.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

use super::network::{Network, OnnxBackbone, SessionOptions};
use super::points::ClusterPoints;
use super::topology::Topology;

/// Default file name of the topology document.
pub const TOPOLOGY_FILENAME: &str = "colorization.json";

/// Default file name of the trained backbone.
pub const WEIGHTS_FILENAME: &str = "colorization.onnx";

/// Default file name of the cluster-point table.
pub const CLUSTER_POINTS_FILENAME: &str = "pts_in_hull.npy";

/// Paths of the three model artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    /// JSON topology document.
    pub topology: PathBuf,
    /// ONNX model holding the trained backbone.
    pub weights: PathBuf,
    /// NumPy table of the 313 ab cluster centers.
    pub cluster_points: PathBuf,
}

impl ModelFiles {
    /// The three artifacts under their default names in `dir`.
    #[must_use]
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            topology: dir.join(TOPOLOGY_FILENAME),
            weights: dir.join(WEIGHTS_FILENAME),
            cluster_points: dir.join(CLUSTER_POINTS_FILENAME),
        }
    }

    /// The platform-appropriate model directory.
    ///
    /// - Windows: `%LOCALAPPDATA%\colorizer\models`
    /// - Linux: `~/.cache/colorizer/models`
    /// - macOS: `~/Library/Caches/colorizer/models`
    #[must_use]
    pub fn default_dir() -> PathBuf {
        let base = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join("colorizer").join("models")
    }
}

impl Default for ModelFiles {
    fn default() -> Self {
        Self::in_dir(Self::default_dir())
    }
}

/// Load the topology, cluster points and weights, and assemble the network.
///
/// Nothing is returned unless every artifact loads, so a failed load never
/// yields a partially initialized network.
///
/// # Errors
///
/// Returns an error if any artifact is missing, unreadable or invalid.
pub fn load_network(files: &ModelFiles, options: &SessionOptions) -> Result<Network> {
    tracing::info!("Loading topology from {}", files.topology.display());
    let topology = Topology::from_file(&files.topology)?;

    tracing::info!("Loading cluster points from {}", files.cluster_points.display());
    let points = ClusterPoints::from_npy(&files.cluster_points)?;

    if !files.weights.is_file() {
        return Err(Error::ModelFileMissing {
            path: files.weights.clone(),
        });
    }
    tracing::info!("Loading weights from {}", files.weights.display());
    let backbone = OnnxBackbone::load(&files.weights, &topology, options)?;

    let network = Network::assemble(topology, Box::new(backbone), &points)?;
    tracing::info!("Model {} ready", network.name());
    Ok(network)
}
