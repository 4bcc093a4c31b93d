// Elbow-curve inertia computation for choosing the number of clusters.

use crate::clustering::kmeans::ClusteringEngine;
use crate::clustering::{matrix_width, ClusteringError};
use ndarray::ArrayView2;
use std::ops::RangeInclusive;
use tracing::debug;

/// One point of the elbow curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InertiaPoint {
    pub k: usize,
    pub inertia: f64,
}

/// Computes inertia per k. The choice of k itself is left to the caller.
#[derive(Debug, Clone)]
pub struct ClusterCountSelector<'a> {
    engine: &'a ClusteringEngine,
}

impl<'a> ClusterCountSelector<'a> {
    pub fn new(engine: &'a ClusteringEngine) -> Self {
        ClusterCountSelector { engine }
    }

    /// Default range: 1 to the configured `elbow_max_k`.
    pub fn default_range(&self) -> RangeInclusive<usize> {
        1..=self.engine.config().elbow_max_k.max(1)
    }

    /// Fit once per k in `range`; k = 0 and k larger than the number of rows
    /// are skipped.
    pub fn inertia_curve(
        &self,
        rows: ArrayView2<'_, f64>,
        range: RangeInclusive<usize>,
    ) -> Result<Vec<InertiaPoint>, ClusteringError> {
        matrix_width(rows)?;
        let mut curve = Vec::new();
        for k in range.filter(|k| (1..=rows.nrows()).contains(k)) {
            let model = self.engine.fit(rows, k)?;
            debug!("elbow k={}: inertia {:.4}", k, model.inertia);
            curve.push(InertiaPoint {
                k,
                inertia: model.inertia,
            });
        }
        Ok(curve)
    }
}

/// Check a user-chosen k against the number of clustered players.
pub fn validate_k(k: usize, players: usize) -> Result<usize, ClusteringError> {
    if k == 0 || k > players {
        return Err(ClusteringError::InvalidK { k, max: players });
    }
    Ok(k)
}
