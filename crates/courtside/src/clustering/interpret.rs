// Clustering results, labeled centroids and classification of new players.

use crate::clustering::elbow::validate_k;
use crate::clustering::features::{FeatureMatrix, FeatureSet};
use crate::clustering::kmeans::{ClusteringEngine, KMeansModel};
use crate::clustering::{pca, ClusteringError};
use crate::player::record::PlayerRecord;
use ndarray::aview1;
use serde::Serialize;
use tracing::info;

// ---------------------------------------------------------------------------
// Result tables
// ---------------------------------------------------------------------------

/// One clustered player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterAssignment {
    pub player_id: String,
    pub player: String,
    pub cluster: usize,
    pub pca1: f64,
    pub pca2: f64,
}

/// k x d centroid values with one label per column, in feature order.
#[derive(Debug, Clone, PartialEq)]
pub struct CentroidTable {
    pub labels: Vec<&'static str>,
    pub rows: Vec<Vec<f64>>,
}

impl CentroidTable {
    /// Row label of cluster `i`.
    pub fn row_label(i: usize) -> String {
        format!("Cluster {i}")
    }
}

/// Everything a clustering run hands to the results sink.
#[derive(Debug, Clone)]
pub struct ClusteringResult {
    pub k: usize,
    pub inertia: f64,
    pub feature_names: Vec<&'static str>,
    pub assignments: Vec<ClusterAssignment>,
    pub centroids: CentroidTable,
}

impl ClusteringResult {
    pub fn cluster_of(&self, full_name: &str) -> Option<usize> {
        self.assignments
            .iter()
            .find(|a| a.player == full_name)
            .map(|a| a.cluster)
    }

    pub fn members(&self, cluster: usize) -> impl Iterator<Item = &ClusterAssignment> {
        self.assignments.iter().filter(move |a| a.cluster == cluster)
    }
}

/// Human-readable centroid column labels for a feature set.
pub fn centroid_labels(features: &FeatureSet) -> Vec<&'static str> {
    features.labels()
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Cluster of a player classified against a fitted run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prediction {
    /// The player was part of the clustered cohort.
    AlreadyClustered(usize),
    /// The player was assigned to the nearest centroid.
    Predicted(usize),
}

impl Prediction {
    pub fn cluster(&self) -> usize {
        match self {
            Prediction::AlreadyClustered(c) | Prediction::Predicted(c) => *c,
        }
    }
}

/// A fitted model together with its feature layout and result tables.
#[derive(Debug, Clone)]
pub struct ClusteringRun {
    pub features: FeatureSet,
    pub model: KMeansModel,
    pub result: ClusteringResult,
    engine: ClusteringEngine,
}

impl ClusteringRun {
    /// Fit `k` clusters on the matrix and project it to two dimensions.
    pub fn fit(
        engine: &ClusteringEngine,
        matrix: &FeatureMatrix,
        k: usize,
    ) -> Result<ClusteringRun, ClusteringError> {
        validate_k(k, matrix.len())?;
        let model = engine.fit(matrix.rows.view(), k)?;
        let projection = pca::project(matrix.rows.view())?;

        let assignments = matrix
            .player_ids
            .iter()
            .zip(&matrix.player_names)
            .zip(model.labels.iter().zip(projection.outer_iter()))
            .map(|((id, name), (&cluster, xy))| ClusterAssignment {
                player_id: id.clone(),
                player: name.clone(),
                cluster,
                pca1: xy[0],
                pca2: xy[1],
            })
            .collect();

        let result = ClusteringResult {
            k,
            inertia: model.inertia,
            feature_names: matrix.features.names(),
            assignments,
            centroids: CentroidTable {
                labels: centroid_labels(&matrix.features),
                rows: model.centroids.outer_iter().map(|c| c.to_vec()).collect(),
            },
        };
        info!(
            "Clustered {} players into {} clusters (inertia {:.2})",
            matrix.len(),
            k,
            model.inertia
        );

        Ok(ClusteringRun {
            features: matrix.features.clone(),
            model,
            result,
            engine: engine.clone(),
        })
    }

    /// Classify a player. A player already in the cohort, matched on
    /// "first last", keeps their assigned cluster.
    pub fn predict_new(&self, record: &PlayerRecord) -> Result<Prediction, ClusteringError> {
        if let Some(cluster) = self.result.cluster_of(&record.full_name()) {
            return Ok(Prediction::AlreadyClustered(cluster));
        }
        let vector = self.features.extract(record);
        let cluster = self.engine.predict(&self.model, aview1(vector.as_slice()))?;
        Ok(Prediction::Predicted(cluster))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
