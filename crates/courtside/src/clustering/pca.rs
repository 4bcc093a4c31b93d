// Two-component PCA used to place clustered players on a plane.

use crate::clustering::{matrix_width, ClusteringError};
use nalgebra::DMatrix;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, Axis};

/// A fitted two-component projection.
#[derive(Debug, Clone, PartialEq)]
pub struct Pca {
    pub mean: Array1<f64>,
    /// 2 x d unit loading vectors, strongest component first. A component
    /// the data cannot support (one column, or a single row) is all zeros.
    pub components: Array2<f64>,
    /// Variance captured by each component.
    pub explained_variance: [f64; 2],
}

impl Pca {
    /// Center the columns, eigendecompose the sample covariance and keep the
    /// two largest eigenvectors.
    pub fn fit(rows: ArrayView2<'_, f64>) -> Result<Pca, ClusteringError> {
        let d = matrix_width(rows)?;
        let n = rows.nrows();
        let mean = rows.mean_axis(Axis(0)).ok_or(ClusteringError::EmptyMatrix)?;
        let mut components = Array2::zeros((2, d));
        let mut explained_variance = [0.0; 2];

        if n < 2 {
            return Ok(Pca {
                mean,
                components,
                explained_variance,
            });
        }

        let centered = &rows - &mean;
        let cov = centered.t().dot(&centered) / (n - 1) as f64;
        let eigen = DMatrix::from_fn(d, d, |i, j| cov[[i, j]]).symmetric_eigen();

        let mut order: Vec<usize> = (0..d).collect();
        order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

        for (rank, &col) in order.iter().take(2).enumerate() {
            let mut loading = components.row_mut(rank);
            for (dst, src) in loading.iter_mut().zip(eigen.eigenvectors.column(col).iter()) {
                *dst = *src;
            }
            fix_sign(loading);
            explained_variance[rank] = eigen.eigenvalues[col].max(0.0);
        }

        Ok(Pca {
            mean,
            components,
            explained_variance,
        })
    }

    /// Coordinates of one row on the two components.
    pub fn transform(&self, row: ArrayView1<'_, f64>) -> Result<[f64; 2], ClusteringError> {
        if row.len() != self.mean.len() {
            return Err(ClusteringError::DimensionMismatch {
                expected: self.mean.len(),
                got: row.len(),
            });
        }
        let xy = self.components.dot(&(&row - &self.mean));
        Ok([xy[0], xy[1]])
    }
}

/// Fit a PCA on `rows` and project every row onto it: an n x 2 matrix.
pub fn project(rows: ArrayView2<'_, f64>) -> Result<Array2<f64>, ClusteringError> {
    let pca = Pca::fit(rows)?;
    Ok((&rows - &pca.mean).dot(&pca.components.t()))
}

/// Make the largest-magnitude loading positive so projections are stable.
fn fix_sign(mut v: ArrayViewMut1<'_, f64>) {
    let pivot = v
        .iter()
        .copied()
        .fold(0.0_f64, |best, x| if x.abs() > best.abs() { x } else { best });
    if pivot < 0.0 {
        v.mapv_inplace(|x| -x);
    }
}
