//! The quantized ab-space cluster centers that parameterize the color head.

use std::fs;
use std::path::Path;

use ndarray::{Array1, Array2, ArrayD, ArrayView2, Ix2};
use ndarray_npy::{ReadNpyError, ReadNpyExt, ReadableElement};

use crate::error::{Error, Result};

/// Number of quantized ab bins the network classifies into.
pub const CLUSTER_COUNT: usize = 313;

/// Per-class logit scale applied before the softmax.
///
/// Empirical calibration from the released model; output parity depends on
/// this exact value.
pub const REBALANCE_FACTOR: f32 = 2.606;

/// The 313 x 2 table of (a*, b*) cluster centers.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterPoints(Array2<f32>);

impl ClusterPoints {
    /// Wrap a (313, 2) table.
    ///
    /// # Errors
    ///
    /// Returns an error if the table has the wrong shape or contains
    /// non-finite values.
    pub fn new(points: Array2<f32>) -> Result<Self> {
        if points.dim() != (CLUSTER_COUNT, 2) {
            let (rows, cols) = points.dim();
            return Err(Error::InvalidClusterPoints {
                reason: format!("expected {CLUSTER_COUNT}x2 points, got {rows}x{cols}"),
            });
        }
        if let Some(bad) = points.iter().position(|v| !v.is_finite()) {
            return Err(Error::InvalidClusterPoints {
                reason: format!("non-finite value at point {}", bad / 2),
            });
        }
        Ok(Self(points))
    }

    /// Read the table from a NumPy `.npy` file.
    ///
    /// `f64`, `f32`, `i64` and `i32` element types are accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, cannot be decoded, or does
    /// not hold exactly 313 two-dimensional points.
    pub fn from_npy<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ModelFileMissing {
                path: path.to_path_buf(),
            });
        }

        let bytes = fs::read(path).map_err(|source| Error::ModelRead {
            path: path.to_path_buf(),
            source,
        })?;

        let table = decode_table(&bytes)
            .ok_or_else(|| Error::ClusterPointsRead {
                path: path.to_path_buf(),
                reason: "unsupported element type, expected f64, f32, i64 or i32".to_string(),
            })?
            .map_err(|err| Error::ClusterPointsRead {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;

        let shape = table.shape().to_vec();
        let table = table
            .into_dimensionality::<Ix2>()
            .map_err(|_| Error::InvalidClusterPoints {
                reason: format!("expected a 2D table, got shape {shape:?}"),
            })?;

        tracing::debug!("Read {} cluster points from {}", table.nrows(), path.display());
        Self::new(table)
    }

    /// Borrow the (313, 2) table.
    #[must_use]
    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.0.view()
    }

    /// The 2 x 313 projection kernel for the ab-channel convolution.
    #[must_use]
    pub fn ab_kernel(&self) -> Array2<f32> {
        self.0.t().to_owned()
    }

    /// The constant 313-entry scale vector for the class rebalancing layer.
    #[must_use]
    pub fn rebalance_factors() -> Array1<f32> {
        Array1::from_elem(CLUSTER_COUNT, REBALANCE_FACTOR)
    }
}

type Decoded = std::result::Result<ArrayD<f32>, ReadNpyError>;

/// Decode the first element type that matches the header, or `None`.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn decode_table(bytes: &[u8]) -> Option<Decoded> {
    read_as::<f64>(bytes, |v| v as f32)
        .or_else(|| read_as::<f32>(bytes, |v| v))
        .or_else(|| read_as::<i64>(bytes, |v| v as f32))
        .or_else(|| read_as::<i32>(bytes, |v| v as f32))
}

fn read_as<T: ReadableElement + Copy>(bytes: &[u8], widen: fn(T) -> f32) -> Option<Decoded> {
    match ArrayD::<T>::read_npy(bytes) {
        Ok(table) => Some(Ok(table.mapv(widen))),
        Err(ReadNpyError::WrongDescriptor(_)) => None,
        Err(err) => Some(Err(err)),
    }
}


#[cfg(test)]
mod tests {
    use ndarray::Array2;
    use ndarray_npy::write_npy;

    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_kernel_is_transposed() {
        let points = testing::spiral_points();
        let kernel = points.ab_kernel();

        assert_eq!(kernel.dim(), (2, CLUSTER_COUNT));
        assert_eq!(kernel[[0, 17]], points.view()[[17, 0]]);
        assert_eq!(kernel[[1, 17]], points.view()[[17, 1]]);
    }

    #[test]
    fn test_rebalance_factors() {
        let factors = ClusterPoints::rebalance_factors();
        assert_eq!(factors.len(), CLUSTER_COUNT);
        assert!(factors.iter().all(|&f| f == 2.606_f32));
    }

    #[test]
    fn test_rejects_wrong_shape() {
        let err = ClusterPoints::new(Array2::zeros((312, 2))).unwrap_err();
        assert!(matches!(err, Error::InvalidClusterPoints { .. }));
        assert_eq!(err.kind(), ErrorKind::ModelLoad);

        assert!(ClusterPoints::new(Array2::zeros((CLUSTER_COUNT, 3))).is_err());
    }

    #[test]
    fn test_rejects_non_finite() {
        let mut table = Array2::zeros((CLUSTER_COUNT, 2));
        table[[40, 1]] = f32::NAN;
        assert!(ClusterPoints::new(table).is_err());
    }

    #[test]
    #[allow(clippy::cast_possible_wrap)]
    fn test_reads_int64_npy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pts_in_hull.npy");
        let table = Array2::<i64>::from_shape_fn((CLUSTER_COUNT, 2), |(i, c)| {
            (i as i64 % 23) * 10 - 110 + c as i64
        });
        write_npy(&path, &table).unwrap();

        let points = ClusterPoints::from_npy(&path).unwrap();

        assert_eq!(points.view()[[5, 0]], -60.0);
        assert_eq!(points.view()[[5, 1]], -59.0);
    }

    #[test]
    fn test_reads_f64_npy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pts.npy");
        write_npy(&path, &Array2::<f64>::from_elem((CLUSTER_COUNT, 2), 12.5)).unwrap();

        let points = ClusterPoints::from_npy(&path).unwrap();
        assert!(points.view().iter().all(|&v| v == 12.5));
    }

    #[test]
    fn test_npy_wrong_rank() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flat.npy");
        write_npy(&path, &ndarray::Array1::<f32>::zeros(CLUSTER_COUNT * 2)).unwrap();

        assert!(matches!(
            ClusterPoints::from_npy(&path),
            Err(Error::InvalidClusterPoints { .. })
        ));
    }

    #[test]
    fn test_npy_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.npy");
        std::fs::write(&path, b"\x93NUMPY garbage").unwrap();

        assert!(matches!(
            ClusterPoints::from_npy(&path),
            Err(Error::ClusterPointsRead { .. })
        ));
    }

    #[test]
    fn test_npy_missing() {
        assert!(matches!(
            ClusterPoints::from_npy("nowhere/pts.npy"),
            Err(Error::ModelFileMissing { .. })
        ));
    }
}
