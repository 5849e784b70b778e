//! Model artifacts and the assembled colorization network.

mod loader;
mod network;
mod points;
mod topology;

pub use loader::{
    load_network, ModelFiles, CLUSTER_POINTS_FILENAME, TOPOLOGY_FILENAME, WEIGHTS_FILENAME,
};
pub use network::{Backbone, Network, OnnxBackbone, SessionOptions};
pub use points::{ClusterPoints, CLUSTER_COUNT, REBALANCE_FACTOR};
pub use topology::{LayerKind, LayerSpec, Topology, AB_LAYER, DEFAULT_INPUT_SIZE, REBALANCE_LAYER};

#[cfg(test)]
pub(crate) mod testing {
    pub use super::network::testing::*;
    pub use super::points::testing::*;
}
