// K-Means clustering: k-means++ seeding, Lloyd iterations, seeded restarts.

use crate::clustering::{matrix_width, squared_distance, ClusteringError};
use crate::config::KMeansConfig;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// A fitted K-Means model.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansModel {
    /// k x d, columns in the order of the fitting matrix.
    pub centroids: Array2<f64>,
    /// Cluster index of each training row.
    pub labels: Vec<usize>,
    /// Sum of squared distances of rows to their centroid.
    pub inertia: f64,
    /// Lloyd iterations used by the winning restart.
    pub iterations: usize,
}

impl KMeansModel {
    pub fn k(&self) -> usize {
        self.centroids.nrows()
    }

    pub fn dimensions(&self) -> usize {
        self.centroids.ncols()
    }

    /// Number of training rows per cluster.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.k()];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }
}

/// Fits and applies K-Means models with a fixed seed.
///
/// Identical input and configuration always produce the identical model.
#[derive(Debug, Clone)]
pub struct ClusteringEngine {
    config: KMeansConfig,
}

impl ClusteringEngine {
    pub fn new(config: KMeansConfig) -> Self {
        ClusteringEngine { config }
    }

    pub fn config(&self) -> &KMeansConfig {
        &self.config
    }

    /// Fit `k` clusters to `rows`, keeping the lowest-inertia restart.
    pub fn fit(&self, rows: ArrayView2<'_, f64>, k: usize) -> Result<KMeansModel, ClusteringError> {
        matrix_width(rows)?;
        if k == 0 || k > rows.nrows() {
            return Err(ClusteringError::InvalidK { k, max: rows.nrows() });
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut best: Option<KMeansModel> = None;
        for restart in 0..self.config.n_init.max(1) {
            let model = self.fit_once(rows, k, &mut rng);
            debug!(
                "k={} restart {}: inertia {:.4} after {} iterations",
                k, restart, model.inertia, model.iterations
            );
            if best.as_ref().map_or(true, |b| model.inertia < b.inertia) {
                best = Some(model);
            }
        }
        best.ok_or(ClusteringError::EmptyMatrix)
    }

    /// Nearest centroid of `vector`. No retraining.
    pub fn predict(&self, model: &KMeansModel, vector: ArrayView1<'_, f64>) -> Result<usize, ClusteringError> {
        let expected = model.dimensions();
        if vector.len() != expected {
            return Err(ClusteringError::DimensionMismatch {
                expected,
                got: vector.len(),
            });
        }
        Ok(nearest(model.centroids.view(), vector).0)
    }

    fn fit_once<R: Rng + ?Sized>(&self, rows: ArrayView2<'_, f64>, k: usize, rng: &mut R) -> KMeansModel {
        let mut centroids = plus_plus_init(rows, k, rng);
        let mut labels = assign(rows, centroids.view());
        let mut iterations = 0;

        while iterations < self.config.max_iter {
            iterations += 1;
            let updated = recompute_centroids(rows, &labels, &centroids);
            let max_shift = centroids
                .outer_iter()
                .zip(updated.outer_iter())
                .map(|(old, new)| squared_distance(old, new).sqrt())
                .fold(0.0, f64::max);
            centroids = updated;
            labels = assign(rows, centroids.view());
            if max_shift <= self.config.tolerance {
                break;
            }
        }

        let inertia = rows
            .outer_iter()
            .zip(&labels)
            .map(|(row, &c)| squared_distance(row, centroids.row(c)))
            .sum();
        KMeansModel {
            centroids,
            labels,
            inertia,
            iterations,
        }
    }
}

/// Index and squared distance of the closest centroid; lowest index on ties.
fn nearest(centroids: ArrayView2<'_, f64>, row: ArrayView1<'_, f64>) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (i, c) in centroids.outer_iter().enumerate() {
        let d = squared_distance(row, c);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

fn assign(rows: ArrayView2<'_, f64>, centroids: ArrayView2<'_, f64>) -> Vec<usize> {
    rows.outer_iter().map(|r| nearest(centroids, r).0).collect()
}

/// Mean of each cluster's rows. A cluster with no rows keeps its centroid.
fn recompute_centroids(rows: ArrayView2<'_, f64>, labels: &[usize], previous: &Array2<f64>) -> Array2<f64> {
    let mut sums = Array2::<f64>::zeros(previous.raw_dim());
    let mut counts = vec![0usize; previous.nrows()];
    for (row, &label) in rows.outer_iter().zip(labels) {
        counts[label] += 1;
        let mut sum = sums.row_mut(label);
        sum += &row;
    }
    for (i, (mut sum, &count)) in sums.outer_iter_mut().zip(&counts).enumerate() {
        if count == 0 {
            sum.assign(&previous.row(i));
        } else {
            sum /= count as f64;
        }
    }
    sums
}

/// k-means++ seeding: each further centroid is drawn with probability
/// proportional to its squared distance from the nearest chosen centroid.
fn plus_plus_init<R: Rng + ?Sized>(rows: ArrayView2<'_, f64>, k: usize, rng: &mut R) -> Array2<f64> {
    let n = rows.nrows();
    let mut chosen = Vec::with_capacity(k);
    chosen.push(rng.random_range(0..n));

    while chosen.len() < k {
        let seeds = rows.select(Axis(0), &chosen);
        let weights: Vec<f64> = rows.outer_iter().map(|r| nearest(seeds.view(), r).1).collect();
        let total: f64 = weights.iter().sum();
        let index = if total > 0.0 {
            let target = rng.random::<f64>() * total;
            let mut acc = 0.0;
            weights
                .iter()
                .position(|w| {
                    acc += w;
                    acc > target
                })
                .unwrap_or(n - 1)
        } else {
            // All rows coincide with chosen centroids.
            rng.random_range(0..n)
        };
        chosen.push(index);
    }
    rows.select(Axis(0), &chosen)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
