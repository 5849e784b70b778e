//! Network topology documents.
//!
//! The topology names the backbone's input and output tensors and lists the
//! head layers that run after the backbone. It is a small JSON document:
//!
//! ```json
//! {
//!   "name": "colorization_release_v2",
//!   "input": "data_l",
//!   "input_size": 224,
//!   "backbone_output": "conv8_313",
//!   "classes": 313,
//!   "head": [
//!     { "name": "conv8_313_rh",  "kind": "scale",       "bottom": "conv8_313" },
//!     { "name": "class8_313_rh", "kind": "softmax",     "bottom": "conv8_313_rh" },
//!     { "name": "class8_ab",     "kind": "convolution", "bottom": "class8_313_rh", "num_output": 2 }
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::image::CHROMA_CHANNELS;

use super::points::CLUSTER_COUNT;

/// Name of the class rebalancing layer that receives the 2.606 scale vector.
pub const REBALANCE_LAYER: &str = "conv8_313_rh";

/// Name of the ab-channel convolution that receives the cluster points.
pub const AB_LAYER: &str = "class8_ab";

/// Native input resolution of the released model.
pub const DEFAULT_INPUT_SIZE: usize = 224;

/// Operation performed by a head layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    /// Per-channel multiplication.
    Scale,
    /// Softmax across channels at every pixel.
    Softmax,
    /// 1x1 convolution without bias.
    Convolution,
}

/// One head layer as described in the topology.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayerSpec {
    /// Unique layer name.
    pub name: String,
    /// What the layer computes.
    pub kind: LayerKind,
    /// Name of the layer (or backbone output) feeding this one.
    pub bottom: String,
    /// Output channels, for convolutions.
    #[serde(default)]
    pub num_output: Option<usize>,
}

/// A parsed and validated topology.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Topology {
    /// Model name, for logging.
    pub name: String,
    /// Backbone input tensor name.
    pub input: String,
    /// Square input resolution.
    #[serde(default = "default_input_size")]
    pub input_size: usize,
    /// Backbone output tensor carrying the class logits.
    pub backbone_output: String,
    /// Number of classes in the backbone output.
    pub classes: usize,
    /// Head layers in evaluation order.
    pub head: Vec<LayerSpec>,
}

const fn default_input_size() -> usize {
    DEFAULT_INPUT_SIZE
}

impl Default for Topology {
    /// The topology of the released colorization model.
    fn default() -> Self {
        Self {
            name: "colorization_release_v2".to_string(),
            input: "data_l".to_string(),
            input_size: DEFAULT_INPUT_SIZE,
            backbone_output: "conv8_313".to_string(),
            classes: CLUSTER_COUNT,
            head: vec![
                LayerSpec {
                    name: REBALANCE_LAYER.to_string(),
                    kind: LayerKind::Scale,
                    bottom: "conv8_313".to_string(),
                    num_output: None,
                },
                LayerSpec {
                    name: "class8_313_rh".to_string(),
                    kind: LayerKind::Softmax,
                    bottom: REBALANCE_LAYER.to_string(),
                    num_output: None,
                },
                LayerSpec {
                    name: AB_LAYER.to_string(),
                    kind: LayerKind::Convolution,
                    bottom: "class8_313_rh".to_string(),
                    num_output: Some(CHROMA_CHANNELS),
                },
            ],
        }
    }
}

impl Topology {
    /// Read and validate a topology document.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable, not valid JSON
    /// for this schema, or structurally invalid.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ModelFileMissing {
                path: path.to_path_buf(),
            });
        }

        let text = fs::read_to_string(path).map_err(|source| Error::ModelRead {
            path: path.to_path_buf(),
            source,
        })?;

        let topology: Self = serde_json::from_str(&text).map_err(|source| Error::TopologyParse {
            path: path.to_path_buf(),
            source,
        })?;
        topology.validate()?;
        Ok(topology)
    }

    /// Check that the head forms a chain we know how to run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTopology`] for malformed chains and
    /// [`Error::MissingLayer`] when an injection target is absent.
    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0 {
            return Err(invalid("input_size must be positive"));
        }
        if self.classes != CLUSTER_COUNT {
            return Err(invalid(format!(
                "classes must be {CLUSTER_COUNT}, got {}",
                self.classes
            )));
        }
        if self.head.is_empty() {
            return Err(invalid("head has no layers"));
        }

        let mut seen = HashSet::new();
        let mut bottom = self.backbone_output.as_str();
        let mut channels = self.classes;
        for layer in &self.head {
            if !seen.insert(layer.name.as_str()) || layer.name == self.backbone_output {
                return Err(invalid(format!("duplicate layer name {}", layer.name)));
            }
            if layer.bottom != bottom {
                return Err(invalid(format!(
                    "layer {} reads from {}, expected {bottom}",
                    layer.name, layer.bottom
                )));
            }
            match (layer.kind, layer.num_output) {
                (LayerKind::Convolution, Some(out)) if out > 0 => channels = out,
                (LayerKind::Convolution, _) => {
                    return Err(invalid(format!(
                        "convolution {} needs a positive num_output",
                        layer.name
                    )));
                }
                (_, Some(_)) => {
                    return Err(invalid(format!(
                        "{:?} layer {} does not take num_output",
                        layer.kind, layer.name
                    )));
                }
                (_, None) => {}
            }
            bottom = layer.name.as_str();
        }

        if channels != CHROMA_CHANNELS {
            return Err(invalid(format!(
                "head produces {channels} channels, expected {CHROMA_CHANNELS}"
            )));
        }

        self.require_layer(REBALANCE_LAYER, LayerKind::Scale)?;
        self.require_layer(AB_LAYER, LayerKind::Convolution)?;
        Ok(())
    }

    fn require_layer(&self, name: &str, kind: LayerKind) -> Result<()> {
        let layer = self
            .head
            .iter()
            .find(|layer| layer.name == name)
            .ok_or_else(|| Error::MissingLayer {
                name: name.to_string(),
                graph: format!("topology {}", self.name),
            })?;
        if layer.kind != kind {
            return Err(invalid(format!(
                "layer {name} must be {kind:?}, found {:?}",
                layer.kind
            )));
        }
        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> Error {
    Error::InvalidTopology {
        reason: reason.into(),
    }
}
