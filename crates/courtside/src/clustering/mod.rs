// Feature extraction, K-Means, elbow curve, PCA and cluster interpretation.

pub mod elbow;
pub mod features;
pub mod interpret;
pub mod kmeans;
pub mod pca;

use ndarray::{ArrayView1, ArrayView2};
use thiserror::Error;

/// Smallest number of players or features a clustering run accepts.
pub const MIN_CLUSTER_INPUT: usize = 2;

#[derive(Debug, Error)]
pub enum ClusteringError {
    #[error("insufficient cohort: {0}")]
    InsufficientCohort(String),

    #[error("k must be between 1 and {max}, got {k}")]
    InvalidK { k: usize, max: usize },

    #[error("feature vector has {got} dimensions, model expects {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("feature matrix is empty")]
    EmptyMatrix,
}

/// Check that a matrix has at least one row and one column, returning its
/// width.
pub(crate) fn matrix_width(rows: ArrayView2<'_, f64>) -> Result<usize, ClusteringError> {
    if rows.nrows() == 0 || rows.ncols() == 0 {
        return Err(ClusteringError::EmptyMatrix);
    }
    Ok(rows.ncols())
}

/// Squared Euclidean distance between two equal-length vectors.
pub(crate) fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}
