// Results sink: assignment and centroid tables plus a JSON run summary.

use crate::clustering::interpret::{CentroidTable, ClusteringResult};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const ASSIGNMENTS_FILE: &str = "assignments.csv";
pub const CENTROIDS_FILE: &str = "centroids.csv";
pub const SUMMARY_FILE: &str = "summary.json";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error writing {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("JSON error writing {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Receives the tables of each finished clustering run.
pub trait ResultsSink {
    fn write_run(&mut self, result: &ClusteringResult) -> Result<(), ExportError>;
}

/// Collects results in memory.
impl ResultsSink for Vec<ClusteringResult> {
    fn write_run(&mut self, result: &ClusteringResult) -> Result<(), ExportError> {
        self.push(result.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Table writers
// ---------------------------------------------------------------------------

/// `player_id,player,cluster,pca1,pca2`, one row per clustered player.
pub fn write_assignments<W: Write>(w: W, result: &ClusteringResult) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(w);
    for a in &result.assignments {
        wtr.serialize(a)?;
    }
    wtr.flush()?;
    Ok(())
}

/// `cluster,<label>...`, one row per centroid.
pub fn write_centroids<W: Write>(w: W, table: &CentroidTable) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(w);
    let header: Vec<&str> = std::iter::once("cluster").chain(table.labels.iter().copied()).collect();
    wtr.write_record(&header)?;
    for (i, row) in table.rows.iter().enumerate() {
        let mut record = vec![CentroidTable::row_label(i)];
        record.extend(row.iter().map(|v| format!("{v:.4}")));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    created_at: String,
    k: usize,
    inertia: f64,
    players: usize,
    features: &'a [&'static str],
    cluster_sizes: Vec<usize>,
}

fn summary(result: &ClusteringResult, now: DateTime<Local>) -> RunSummary<'_> {
    let mut cluster_sizes = vec![0; result.k];
    for a in &result.assignments {
        if let Some(n) = cluster_sizes.get_mut(a.cluster) {
            *n += 1;
        }
    }
    RunSummary {
        created_at: now.to_rfc3339(),
        k: result.k,
        inertia: result.inertia,
        players: result.assignments.len(),
        features: &result.feature_names,
        cluster_sizes,
    }
}

// ---------------------------------------------------------------------------
// CsvResultsWriter
// ---------------------------------------------------------------------------

/// Writes each run into a fresh `clustering_YYYYMMDD_HHMM` directory under
/// the output root.
#[derive(Debug, Clone)]
pub struct CsvResultsWriter {
    root: PathBuf,
    written: Vec<PathBuf>,
}

impl CsvResultsWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        CsvResultsWriter {
            root: root.into(),
            written: Vec::new(),
        }
    }

    /// Directories written so far, oldest first.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Write the run's files into a new directory stamped with `now`.
    pub fn write_at(
        &mut self,
        result: &ClusteringResult,
        now: DateTime<Local>,
    ) -> Result<PathBuf, ExportError> {
        let dir = self.run_dir(now);
        std::fs::create_dir_all(&dir).map_err(|e| ExportError::Io {
            path: dir.clone(),
            source: e,
        })?;

        let path = dir.join(ASSIGNMENTS_FILE);
        write_assignments(create_file(&path)?, result)
            .map_err(|e| ExportError::Csv { path, source: e })?;

        let path = dir.join(CENTROIDS_FILE);
        write_centroids(create_file(&path)?, &result.centroids)
            .map_err(|e| ExportError::Csv { path, source: e })?;

        let path = dir.join(SUMMARY_FILE);
        serde_json::to_writer_pretty(create_file(&path)?, &summary(result, now))
            .map_err(|e| ExportError::Json { path, source: e })?;

        info!("Wrote clustering results to {}", dir.display());
        self.written.push(dir.clone());
        Ok(dir)
    }

    /// First free directory name for `now`; a second run within the same
    /// minute gets a numeric suffix.
    fn run_dir(&self, now: DateTime<Local>) -> PathBuf {
        let base = format!("clustering_{}", now.format("%Y%m%d_%H%M"));
        let mut dir = self.root.join(&base);
        let mut n = 2;
        while dir.exists() {
            dir = self.root.join(format!("{base}_{n}"));
            n += 1;
        }
        dir
    }
}

impl ResultsSink for CsvResultsWriter {
    fn write_run(&mut self, result: &ClusteringResult) -> Result<(), ExportError> {
        self.write_at(result, Local::now()).map(|_| ())
    }
}

fn create_file(path: &Path) -> Result<std::fs::File, ExportError> {
    std::fs::File::create(path).map_err(|e| ExportError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::interpret::ClusterAssignment;
    use chrono::TimeZone;

    fn result() -> ClusteringResult {
        let assignment = |id: &str, name: &str, cluster: usize, x: f64| ClusterAssignment {
            player_id: id.into(),
            player: name.into(),
            cluster,
            pca1: x,
            pca2: -x,
        };
        ClusteringResult {
            k: 2,
            inertia: 12.5,
            feature_names: vec!["match_win_pct", "dominant_hand"],
            assignments: vec![
                assignment("1", "Rafael Nadal", 0, 1.5),
                assignment("2", "Roger Federer", 1, -2.0),
                assignment("3", "Andy Murray", 1, 0.25),
            ],
            centroids: CentroidTable {
                labels: vec!["Match win %", "Right hand", "Left hand"],
                rows: vec![vec![80.0, 0.0, 100.0], vec![75.5, 100.0, 0.0]],
            },
        }
    }

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 14, 9, 5, 0).unwrap()
    }

    #[test]
    fn assignments_csv_has_header_and_rows() {
        let mut buf = Vec::new();
        write_assignments(&mut buf, &result()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "player_id,player,cluster,pca1,pca2");
        assert_eq!(lines[1], "1,Rafael Nadal,0,1.5,-1.5");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn centroids_csv_is_labeled() {
        let mut buf = Vec::new();
        write_centroids(&mut buf, &result().centroids).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "cluster,Match win %,Right hand,Left hand");
        assert_eq!(lines[1], "Cluster 0,80.0000,0.0000,100.0000");
        assert_eq!(lines[2], "Cluster 1,75.5000,100.0000,0.0000");
    }

    #[test]
    fn writer_creates_timestamped_directory() {
        let root = std::env::temp_dir().join("courtside_export_test");
        let _ = std::fs::remove_dir_all(&root);

        let mut writer = CsvResultsWriter::new(&root);
        let dir = writer.write_at(&result(), now()).unwrap();
        assert_eq!(dir, root.join("clustering_20250314_0905"));
        assert!(dir.join(ASSIGNMENTS_FILE).exists());
        assert!(dir.join(CENTROIDS_FILE).exists());

        let summary: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join(SUMMARY_FILE)).unwrap()).unwrap();
        assert_eq!(summary["k"], 2);
        assert_eq!(summary["players"], 3);
        assert_eq!(summary["cluster_sizes"], serde_json::json!([1, 2]));
        assert_eq!(summary["features"][1], "dominant_hand");

        let second = writer.write_at(&result(), now()).unwrap();
        assert_eq!(second, root.join("clustering_20250314_0905_2"));
        assert_eq!(writer.written().len(), 2);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn vec_sink_collects_runs() {
        let mut sink: Vec<ClusteringResult> = Vec::new();
        sink.write_run(&result()).unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].k, 2);
    }
}
