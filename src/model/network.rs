//! The colorization network: an ONNX backbone followed by the color head.

use std::path::Path;
use std::sync::Mutex;

use ndarray::{Array1, Array2, Array4, Axis};
use ort::session::Session;
use ort::value::Tensor;

use crate::error::{Error, Result};

use super::points::ClusterPoints;
use super::topology::{LayerKind, Topology, AB_LAYER, REBALANCE_LAYER};

/// The part of the network that maps lightness to per-class logits.
///
/// Implementations must not keep state between calls.
pub trait Backbone: Send + Sync {
    /// Map an NCHW `(1, 1, H, W)` lightness tensor to `(1, classes, H', W')` logits.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is rejected or the forward pass fails.
    fn forward(&self, input: Array4<f32>) -> Result<Array4<f32>>;
}

/// Options for creating the ONNX Runtime session.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Intra-op thread count. `None` lets ONNX Runtime decide.
    pub intra_threads: Option<usize>,
}

/// A backbone evaluated by ONNX Runtime.
///
/// `Session::run` needs exclusive access, so concurrent forward passes on one
/// backbone are serialized.
pub struct OnnxBackbone {
    session: Mutex<Session>,
    input: String,
    output: String,
}

impl OnnxBackbone {
    /// Load the trained backbone and check it exposes the tensors the
    /// topology names.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded or a named tensor is
    /// absent.
    pub fn load(path: &Path, topology: &Topology, options: &SessionOptions) -> Result<Self> {
        let name = path.display().to_string();
        let load_err = |source| Error::ModelLoad {
            name: name.clone(),
            source,
        };

        let mut builder = Session::builder().map_err(load_err)?;
        if let Some(threads) = options.intra_threads {
            builder = builder.with_intra_threads(threads).map_err(load_err)?;
        }
        let session = builder.commit_from_file(path).map_err(load_err)?;

        if !session.inputs.iter().any(|input| input.name == topology.input) {
            return Err(Error::MissingLayer {
                name: topology.input.clone(),
                graph: name,
            });
        }
        if !session
            .outputs
            .iter()
            .any(|output| output.name == topology.backbone_output)
        {
            return Err(Error::MissingLayer {
                name: topology.backbone_output.clone(),
                graph: name,
            });
        }

        Ok(Self {
            session: Mutex::new(session),
            input: topology.input.clone(),
            output: topology.backbone_output.clone(),
        })
    }
}

impl Backbone for OnnxBackbone {
    fn forward(&self, input: Array4<f32>) -> Result<Array4<f32>> {
        let input_value = Tensor::from_array(input).map_err(|source| Error::Inference { source })?;

        let mut session = self.session.lock().map_err(|_| Error::SessionPoisoned)?;
        let outputs = session
            .run(ort::inputs![self.input.as_str() => input_value])
            .map_err(|source| Error::Inference { source })?;

        let output = outputs
            .iter()
            .find(|(name, _)| *name == self.output)
            .map(|(_, value)| value)
            .ok_or_else(|| Error::ShapeMismatch {
                expected: format!("{} output", self.output),
                actual: "no such output".to_string(),
            })?;

        extract_array4(&output)
    }
}

/// Extract a 4D array from an ONNX value.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn extract_array4(value: &ort::value::ValueRef<'_>) -> Result<Array4<f32>> {
    let (shape_info, data) = value
        .try_extract_tensor::<f32>()
        .map_err(|source| Error::Inference { source })?;

    // Safe: tensor dimensions are always non-negative and within bounds
    let dims: Vec<usize> = shape_info.iter().map(|&x| x as usize).collect();

    if dims.len() != 4 {
        return Err(Error::ShapeMismatch {
            expected: "4D tensor".to_string(),
            actual: format!("{}D tensor", dims.len()),
        });
    }

    Array4::from_shape_vec((dims[0], dims[1], dims[2], dims[3]), data.to_vec()).map_err(|_| {
        Error::ShapeMismatch {
            expected: format!("{dims:?}"),
            actual: "reshape failed".to_string(),
        }
    })
}

/// A head layer with its parameters bound.
#[derive(Debug, Clone)]
enum HeadLayer {
    Scale(Array1<f32>),
    Softmax,
    Convolution(Array2<f32>),
}

/// The fully initialized colorization network.
///
/// Built once by [`Network::assemble`]; nothing can modify it afterwards, so a
/// single instance can be shared across threads.
pub struct Network {
    name: String,
    input_size: usize,
    classes: usize,
    backbone: Box<dyn Backbone>,
    head: Vec<HeadLayer>,
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("name", &self.name)
            .field("input_size", &self.input_size)
            .field("classes", &self.classes)
            .field("head_layers", &self.head.len())
            .finish_non_exhaustive()
    }
}

impl Network {
    /// Bind the cluster points into the head and take ownership of the backbone.
    ///
    /// The transposed points become the kernel of the ab-channel convolution
    /// and a constant 2.606 vector becomes the class rebalancing scale. This
    /// is the only place head parameters are set.
    ///
    /// # Errors
    ///
    /// Returns an error if the topology is invalid or names a parameterized
    /// layer we have no parameters for.
    pub fn assemble(
        topology: Topology,
        backbone: Box<dyn Backbone>,
        points: &ClusterPoints,
    ) -> Result<Self> {
        topology.validate()?;

        let mut channels = topology.classes;
        let mut head = Vec::with_capacity(topology.head.len());
        for layer in &topology.head {
            let bound = match layer.kind {
                LayerKind::Softmax => HeadLayer::Softmax,
                LayerKind::Scale if layer.name == REBALANCE_LAYER => {
                    HeadLayer::Scale(ClusterPoints::rebalance_factors())
                }
                LayerKind::Convolution if layer.name == AB_LAYER => {
                    HeadLayer::Convolution(points.ab_kernel())
                }
                LayerKind::Scale | LayerKind::Convolution => {
                    return Err(Error::InvalidTopology {
                        reason: format!("no parameters available for layer {}", layer.name),
                    });
                }
            };

            match &bound {
                HeadLayer::Scale(factors) if factors.len() != channels => {
                    return Err(param_mismatch(&layer.name, channels, factors.len()));
                }
                HeadLayer::Convolution(kernel) => {
                    if kernel.ncols() != channels {
                        return Err(param_mismatch(&layer.name, channels, kernel.ncols()));
                    }
                    channels = kernel.nrows();
                }
                _ => {}
            }
            head.push(bound);
        }

        tracing::debug!(
            "Assembled {} with {} head layers, input {}x{}",
            topology.name,
            head.len(),
            topology.input_size,
            topology.input_size
        );

        Ok(Self {
            name: topology.name,
            input_size: topology.input_size,
            classes: topology.classes,
            backbone,
            head,
        })
    }

    /// Model name from the topology.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Square input resolution the network expects.
    #[must_use]
    pub const fn input_size(&self) -> usize {
        self.input_size
    }

    /// Run the backbone and the head on a `(1, 1, H, W)` tensor.
    ///
    /// Returns the `(1, 2, H', W')` ab prediction.
    ///
    /// # Errors
    ///
    /// Returns an error if the backbone fails or returns an unexpected shape.
    pub fn forward(&self, input: Array4<f32>) -> Result<Array4<f32>> {
        let logits = self.backbone.forward(input)?;
        let (batch, classes, height, width) = logits.dim();
        if batch != 1 || classes != self.classes {
            return Err(Error::ShapeMismatch {
                expected: format!("(1, {}, H, W) logits", self.classes),
                actual: format!("{:?}", logits.shape()),
            });
        }

        // (classes, pixels) so every head layer is a column-wise operation
        let mut x = Array2::from_shape_vec((classes, height * width), logits.iter().copied().collect())
            .map_err(|_| Error::ShapeMismatch {
                expected: format!("{classes}x{} matrix", height * width),
                actual: format!("{:?}", logits.shape()),
            })?;

        for layer in &self.head {
            x = match layer {
                HeadLayer::Scale(factors) => x * &factors.view().insert_axis(Axis(1)),
                HeadLayer::Softmax => softmax_columns(x),
                HeadLayer::Convolution(kernel) => kernel.dot(&x),
            };
        }

        let channels = x.nrows();
        Array4::from_shape_vec((1, channels, height, width), x.iter().copied().collect()).map_err(
            |_| Error::ShapeMismatch {
                expected: format!("(1, {channels}, {height}, {width})"),
                actual: format!("{:?}", x.shape()),
            },
        )
    }
}

fn param_mismatch(layer: &str, expected: usize, actual: usize) -> Error {
    Error::InvalidTopology {
        reason: format!("layer {layer} expects {expected} input channels, parameters cover {actual}"),
    }
}

/// Numerically stable softmax down each column.
fn softmax_columns(mut x: Array2<f32>) -> Array2<f32> {
    for mut column in x.columns_mut() {
        let max = column.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        column.mapv_inplace(|v| (v - max).exp());
        let sum = column.sum();
        column /= sum;
    }
    x
}


#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::testing::{flat_logits, network, StubBackbone};
    use super::*;
    use crate::model::points::testing::spiral_points;
    use crate::model::points::CLUSTER_COUNT;

    fn peak_at_40(class: usize, _mean: f32) -> f32 {
        if class == 40 {
            30.0
        } else {
            0.0
        }
    }

    fn input(size: usize) -> Array4<f32> {
        Array4::zeros((1, 1, size, size))
    }

    #[test]
    fn test_uniform_logits_give_mean_point() {
        let points = spiral_points();
        let net = network(StubBackbone { out_size: 3, logit: flat_logits }, &points);

        let ab = net.forward(input(8)).unwrap();

        assert_eq!(ab.dim(), (1, 2, 3, 3));
        let mean = points.view().mean_axis(Axis(0)).unwrap();
        for &a in ab.index_axis(Axis(1), 0) {
            assert_abs_diff_eq!(a, mean[0], epsilon = 1e-3);
        }
        for &b in ab.index_axis(Axis(1), 1) {
            assert_abs_diff_eq!(b, mean[1], epsilon = 1e-3);
        }
    }

    #[test]
    fn test_peaked_logits_select_point() {
        let points = spiral_points();
        let net = network(StubBackbone { out_size: 2, logit: peak_at_40 }, &points);

        let ab = net.forward(input(4)).unwrap();

        // exp(30 * 2.606) dwarfs the other 312 classes
        assert_abs_diff_eq!(ab[[0, 0, 1, 1]], points.view()[[40, 0]], epsilon = 1e-3);
        assert_abs_diff_eq!(ab[[0, 1, 1, 1]], points.view()[[40, 1]], epsilon = 1e-3);
    }

    #[test]
    fn test_rebalance_sharpens_distribution() {
        // Two competing classes: the 2.606 scale must be applied before the softmax.
        fn two_way(class: usize, _mean: f32) -> f32 {
            match class {
                0 => 1.0,
                1 => 0.0,
                _ => -1000.0,
            }
        }
        let mut table = Array2::zeros((CLUSTER_COUNT, 2));
        table[[0, 0]] = 1.0;
        let points = ClusterPoints::new(table).unwrap();
        let net = network(StubBackbone { out_size: 1, logit: two_way }, &points);

        let ab = net.forward(input(1)).unwrap();

        let expected = 1.0 / (1.0 + (-2.606_f32).exp());
        assert_abs_diff_eq!(ab[[0, 0, 0, 0]], expected, epsilon = 1e-5);
    }

    #[test]
    fn test_softmax_columns_sum_to_one() {
        let x = Array2::from_shape_vec((3, 2), vec![1.0, 500.0, 2.0, -500.0, 3.0, 0.0]).unwrap();
        let p = softmax_columns(x);
        for column in p.columns() {
            assert_abs_diff_eq!(column.sum(), 1.0, epsilon = 1e-6);
            assert!(column.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_wrong_class_count_rejected() {
        struct Narrow;
        impl Backbone for Narrow {
            fn forward(&self, _input: Array4<f32>) -> Result<Array4<f32>> {
                Ok(Array4::zeros((1, 10, 2, 2)))
            }
        }
        let net = network(Narrow, &spiral_points());

        assert!(matches!(
            net.forward(input(2)),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_extra_parameterized_layer_rejected() {
        let mut topology = Topology::default();
        topology.head.insert(
            0,
            crate::model::topology::LayerSpec {
                name: "pre_scale".to_string(),
                kind: LayerKind::Scale,
                bottom: "conv8_313".to_string(),
                num_output: None,
            },
        );
        topology.head[1].bottom = "pre_scale".to_string();

        let result = Network::assemble(
            topology,
            Box::new(StubBackbone { out_size: 1, logit: flat_logits }),
            &spiral_points(),
        );
        assert!(matches!(result, Err(Error::InvalidTopology { .. })));
    }

    #[test]
    fn test_network_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Network>();
    }
}
