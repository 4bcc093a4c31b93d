// Configuration loading and parsing (config/courtside.toml).

use crate::clustering::features::{Feature, FeatureSet};
use crate::cohort::{Cohort, DEFAULT_RANK_CUTOFF};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// File name of the configuration, inside `config/` (and `defaults/`).
pub const CONFIG_FILE: &str = "courtside.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

impl ConfigError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::ValidationError {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub data_paths: DataPaths,
    pub sampling: SamplingConfig,
    pub kmeans: KMeansConfig,
    pub session: SessionConfig,
    pub output_dir: String,
}

// ---------------------------------------------------------------------------
// courtside.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire courtside.toml file.
#[derive(Debug, Clone, Deserialize)]
struct CourtsideFile {
    data: DataPaths,
    sampling: SamplingConfig,
    kmeans: KMeansConfig,
    session: SessionConfig,
    output: OutputSection,
}

#[derive(Debug, Clone, Deserialize)]
struct OutputSection {
    dir: String,
}

/// Locations of the player, match and ranking tables, per tour.
#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    pub players_male: String,
    pub players_female: String,
    pub matches_male: Vec<String>,
    pub matches_female: Vec<String>,
    pub rankings_male: String,
    pub rankings_female: String,
}

/// Candidate pool and rejection-sampling parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct SamplingConfig {
    /// Maximum number of identifiers resolved per sampling batch.
    pub batch_size: usize,
    /// Rank cutoff used for ranked pools when none is given.
    #[serde(default = "default_rank_cutoff")]
    pub default_rank_cutoff: u32,
    /// Season whose match tables define the "active" pool.
    pub season: i32,
    /// Smallest cohort a session may request.
    pub min_sample_size: usize,
}

fn default_rank_cutoff() -> u32 {
    DEFAULT_RANK_CUTOFF
}

impl Default for SamplingConfig {
    fn default() -> Self {
        SamplingConfig {
            batch_size: 50,
            default_rank_cutoff: DEFAULT_RANK_CUTOFF,
            season: 2024,
            min_sample_size: 11,
        }
    }
}

/// K-Means fitting parameters shared by the elbow curve and the final fit.
#[derive(Debug, Clone, Deserialize)]
pub struct KMeansConfig {
    pub seed: u64,
    /// Number of k-means++ restarts; the lowest-inertia run is kept.
    pub n_init: usize,
    pub max_iter: usize,
    /// Convergence threshold on the largest centroid shift.
    pub tolerance: f64,
    /// Largest k evaluated by the elbow curve.
    pub elbow_max_k: usize,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        KMeansConfig {
            seed: 42,
            n_init: 10,
            max_iter: 300,
            tolerance: 1e-4,
            elbow_max_k: 10,
        }
    }
}

/// How the candidate pool of a session is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Players with at least one match in the configured season.
    Active,
    /// Players on the most recent ranking snapshot.
    Ranked,
}

/// A player to classify against the fitted model, by name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlayerName {
    pub first: String,
    pub last: String,
}

/// The clustering session run by the `courtside` binary.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub cohort: Cohort,
    pub mode: SessionMode,
    #[serde(default)]
    pub rank_cutoff: Option<u32>,
    pub sample_size: usize,
    pub k: usize,
    /// Feature names; an empty list selects every feature of the cohort.
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub classify: Vec<PlayerName>,
}

impl SessionConfig {
    /// Resolve the configured feature names into a feature set.
    ///
    /// Names are parsed strictly: a typo is an error here, unlike
    /// [`FeatureSet::from_names`] which skips unknown names.
    pub fn feature_set(&self) -> Result<FeatureSet, ConfigError> {
        if self.features.is_empty() {
            return Ok(FeatureSet::all_for(self.cohort));
        }
        let mut features = Vec::with_capacity(self.features.len());
        for name in &self.features {
            let feature = Feature::from_str(name)
                .map_err(|e| ConfigError::invalid("session.features", e.to_string()))?;
            features.push(feature);
        }
        Ok(FeatureSet::new(features))
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/courtside.toml` relative to
/// `base_dir`. Does not copy defaults; see [`load_config`].
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = read_file(&path)?;
    let config = parse_config(&text).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        source: e,
    })?;
    validate(&config)?;
    Ok(config)
}

fn parse_config(text: &str) -> Result<Config, toml::de::Error> {
    let file: CourtsideFile = toml::from_str(text)?;
    Ok(Config {
        data_paths: file.data,
        sampling: file.sampling,
        kmeans: file.kmeans,
        session: file.session,
        output_dir: file.output.dir,
    })
}

/// Copy files from `defaults/` into `config/` when they are missing there.
/// Returns the files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    let mut copied = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| ConfigError::DefaultsCopyError {
                message: format!("failed to read defaults entry: {e}"),
            })?
            .path();
        let Some(file_name) = path.file_name().filter(|_| path.is_file()) else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }
        let target = config_dir.join(file_name);
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            // A user's edited config is never replaced.
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Convenience wrapper: loads config relative to the current working directory.
/// Ensures default config files are copied before loading.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let sampling = &config.sampling;
    if sampling.batch_size == 0 {
        return Err(ConfigError::invalid("sampling.batch_size", "must be > 0"));
    }
    if sampling.default_rank_cutoff == 0 {
        return Err(ConfigError::invalid("sampling.default_rank_cutoff", "must be > 0"));
    }
    if sampling.min_sample_size < 2 {
        return Err(ConfigError::invalid(
            "sampling.min_sample_size",
            format!("must be at least 2, got {}", sampling.min_sample_size),
        ));
    }

    let km = &config.kmeans;
    if km.n_init < 10 {
        return Err(ConfigError::invalid(
            "kmeans.n_init",
            format!("must be at least 10, got {}", km.n_init),
        ));
    }
    if km.max_iter == 0 {
        return Err(ConfigError::invalid("kmeans.max_iter", "must be > 0"));
    }
    if !km.tolerance.is_finite() || km.tolerance < 0.0 {
        return Err(ConfigError::invalid(
            "kmeans.tolerance",
            format!("must be a finite value >= 0, got {}", km.tolerance),
        ));
    }
    if km.elbow_max_k == 0 {
        return Err(ConfigError::invalid("kmeans.elbow_max_k", "must be > 0"));
    }

    let session = &config.session;
    if let Some(cutoff) = session.rank_cutoff {
        if cutoff <= 20 {
            return Err(ConfigError::invalid(
                "session.rank_cutoff",
                format!("must be greater than 20, got {cutoff}"),
            ));
        }
    }
    if session.sample_size < sampling.min_sample_size {
        return Err(ConfigError::invalid(
            "session.sample_size",
            format!(
                "must be at least {}, got {}",
                sampling.min_sample_size, session.sample_size
            ),
        ));
    }
    if session.k == 0 || session.k > session.sample_size {
        return Err(ConfigError::invalid(
            "session.k",
            format!("must be between 1 and {}, got {}", session.sample_size, session.k),
        ));
    }

    let features = session.feature_set()?;
    if features.len() < 2 {
        return Err(ConfigError::invalid(
            "session.features",
            "at least 2 features are required",
        ));
    }
    if let Some(f) = features.iter().find(|f| !f.available_for(session.cohort)) {
        return Err(ConfigError::invalid(
            "session.features",
            format!("`{}` is not available for the {} cohort", f.name(), session.cohort),
        ));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
