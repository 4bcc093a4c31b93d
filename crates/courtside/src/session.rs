// Classification session: pool, sample, feature matrix, elbow curve, clustering.

use crate::clustering::elbow::{ClusterCountSelector, InertiaPoint};
use crate::clustering::features::{FeatureMatrix, FeatureSet};
use crate::clustering::interpret::{ClusteringRun, Prediction};
use crate::clustering::kmeans::ClusteringEngine;
use crate::clustering::{ClusteringError, MIN_CLUSTER_INPUT};
use crate::cohort::pool::{CandidatePoolBuilder, PoolError, PoolMode};
use crate::cohort::sampling::{Sample, SamplingEngine};
use crate::cohort::Cohort;
use crate::config::{Config, ConfigError, KMeansConfig, SamplingConfig, SessionMode};
use crate::dataset::TennisDataset;
use crate::player::record::PlayerRecord;
use crate::player::repository::{PlayerLookup, PlayerRepository};
use rand::Rng;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("sample size {requested} is below the minimum of {min}")]
    SampleTooSmall { requested: usize, min: usize },

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Clustering(#[from] ClusteringError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Request / prepared cohort
// ---------------------------------------------------------------------------

/// What to cluster: which players, how many, on which features.
#[derive(Debug, Clone)]
pub struct CohortRequest {
    pub cohort: Cohort,
    pub mode: PoolMode,
    pub sample_size: usize,
    pub features: FeatureSet,
}

impl CohortRequest {
    /// Build the request described by the `[session]` section. Ranked pools
    /// without a configured cutoff use `sampling.default_rank_cutoff`.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let session = &config.session;
        let mode = match session.mode {
            SessionMode::Active => PoolMode::Active {
                season: config.sampling.season,
            },
            SessionMode::Ranked => PoolMode::Ranked {
                cutoff: Some(session.rank_cutoff.unwrap_or(config.sampling.default_rank_cutoff)),
            },
        };
        Ok(CohortRequest {
            cohort: session.cohort,
            mode,
            sample_size: session.sample_size,
            features: session.feature_set()?,
        })
    }
}

/// A sampled cohort ready for clustering.
#[derive(Debug, Clone)]
pub struct PreparedCohort {
    pub cohort: Cohort,
    pub sample: Sample,
    pub matrix: FeatureMatrix,
    /// Inertia for k = 1 up to the configured maximum (capped at the number
    /// of players).
    pub elbow: Vec<InertiaPoint>,
}

impl PreparedCohort {
    pub fn players(&self) -> &[PlayerRecord] {
        &self.sample.players
    }
}

/// Outcome of classifying a named player against a run.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    NotFound,
    /// The player exists but lacks statistics required for extraction.
    Incomplete(Vec<&'static str>),
    Classified {
        record: PlayerRecord,
        prediction: Prediction,
    },
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Runs clustering sessions over one loaded dataset.
pub struct ClassificationSession<'a> {
    repository: PlayerRepository<'a>,
    pools: CandidatePoolBuilder<'a>,
    sampling: SamplingConfig,
    engine: ClusteringEngine,
}

impl<'a> ClassificationSession<'a> {
    pub fn new(dataset: &'a TennisDataset, sampling: SamplingConfig, kmeans: KMeansConfig) -> Self {
        ClassificationSession {
            repository: PlayerRepository::from_dataset(dataset),
            pools: CandidatePoolBuilder::from_dataset(dataset),
            sampling,
            engine: ClusteringEngine::new(kmeans),
        }
    }

    pub fn repository(&self) -> &PlayerRepository<'a> {
        &self.repository
    }

    /// Build the pool, sample valid players and compute the elbow curve.
    ///
    /// An exhausted pool still yields a cohort as long as at least two valid
    /// players were found.
    pub fn prepare<R: Rng + ?Sized>(
        &self,
        request: &CohortRequest,
        rng: &mut R,
    ) -> Result<PreparedCohort, SessionError> {
        if request.sample_size < self.sampling.min_sample_size {
            return Err(SessionError::SampleTooSmall {
                requested: request.sample_size,
                min: self.sampling.min_sample_size,
            });
        }
        if request.features.len() < MIN_CLUSTER_INPUT {
            return Err(ClusteringError::InsufficientCohort(format!(
                "{} feature(s) selected, at least {} required",
                request.features.len(),
                MIN_CLUSTER_INPUT
            ))
            .into());
        }

        let pool = self.pools.build(request.cohort, request.mode)?;
        let sampler = SamplingEngine::new(&self.repository, self.sampling.batch_size);
        let sample = sampler.sample(&pool, request.cohort, request.sample_size, rng);

        if sample.rejections.total() > 0 {
            info!(
                "Skipped {} candidates ({} not found, {} with missing statistics)",
                sample.rejections.total(),
                sample.rejections.not_found,
                sample.rejections.invalid
            );
        }
        if !sample.is_complete() {
            warn!(
                "Candidate pool exhausted: {} of {} requested {} players found",
                sample.players.len(),
                sample.requested,
                request.cohort
            );
        }

        let matrix = FeatureMatrix::build(&sample.players, &request.features)?;
        let selector = ClusterCountSelector::new(&self.engine);
        let elbow = selector.inertia_curve(matrix.rows.view(), selector.default_range())?;
        info!(
            "Prepared {} cohort: {} players, {} dimensions",
            request.cohort,
            matrix.len(),
            matrix.dimensions()
        );

        Ok(PreparedCohort {
            cohort: request.cohort,
            sample,
            matrix,
            elbow,
        })
    }

    /// Fit the final model with the chosen `k`.
    pub fn cluster(&self, prepared: &PreparedCohort, k: usize) -> Result<ClusteringRun, SessionError> {
        Ok(ClusteringRun::fit(&self.engine, &prepared.matrix, k)?)
    }

    /// Look a player up by name and classify them against `run`.
    pub fn classify(
        &self,
        run: &ClusteringRun,
        first: &str,
        last: &str,
    ) -> Result<Classification, SessionError> {
        let Some(record) = self.repository.find_by_name(first, last) else {
            return Ok(Classification::NotFound);
        };
        let clustered = run.result.cluster_of(&record.full_name()).is_some();
        if !clustered && !record.is_valid_for_clustering() {
            return Ok(Classification::Incomplete(record.missing_statistics()));
        }
        let prediction = run.predict_new(&record)?;
        Ok(Classification::Classified { record, prediction })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::features::Feature;
    use crate::dataset::RankingRow;
    use crate::player::record::tests::sample_record;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn dataset(valid: usize) -> TennisDataset {
        let date = NaiveDate::from_ymd_opt(2024, 12, 30).unwrap();
        let mut players: Vec<PlayerRecord> = (0..valid)
            .map(|i| {
                let mut r = sample_record(&format!("{i}"), "Player", &format!("P{i}"));
                r.matches_won = Some(100.0 + 10.0 * i as f64);
                r
            })
            .collect();
        let mut broken = sample_record("broken", "Broken", "Stats");
        broken.set1_comeback_pct = None;
        players.push(broken);

        let rankings = players
            .iter()
            .enumerate()
            .map(|(i, p)| RankingRow {
                ranking_date: date,
                rank: i as u32 + 1,
                player_id: p.id.clone(),
            })
            .collect();
        TennisDataset {
            male_players: players,
            male_rankings: rankings,
            ..TennisDataset::default()
        }
    }

    fn request(sample_size: usize) -> CohortRequest {
        CohortRequest {
            cohort: Cohort::Male,
            mode: PoolMode::Ranked { cutoff: Some(100) },
            sample_size,
            features: FeatureSet::new([Feature::MatchWinPct, Feature::BreakPointSavePct]),
        }
    }

    #[test]
    fn prepare_samples_requested_cohort() {
        let data = dataset(40);
        let session = ClassificationSession::new(&data, SamplingConfig::default(), KMeansConfig::default());
        let prepared = session
            .prepare(&request(20), &mut StdRng::seed_from_u64(1))
            .unwrap();
        assert_eq!(prepared.players().len(), 20);
        assert!(prepared.sample.is_complete());
        assert_eq!(prepared.matrix.len(), 20);
        assert_eq!(prepared.elbow.len(), 10);
    }

    #[test]
    fn exhausted_pool_still_prepares_smaller_cohort() {
        let data = dataset(12);
        let session = ClassificationSession::new(&data, SamplingConfig::default(), KMeansConfig::default());
        let prepared = session
            .prepare(&request(20), &mut StdRng::seed_from_u64(2))
            .unwrap();
        assert!(!prepared.sample.is_complete());
        assert_eq!(prepared.players().len(), 12);
        assert_eq!(prepared.sample.rejections.invalid, 1);
    }

    #[test]
    fn too_few_valid_players_is_insufficient_cohort() {
        let data = dataset(1);
        let session = ClassificationSession::new(&data, SamplingConfig::default(), KMeansConfig::default());
        let err = session
            .prepare(&request(11), &mut StdRng::seed_from_u64(3))
            .unwrap_err();
        assert!(matches!(err, SessionError::Clustering(ClusteringError::InsufficientCohort(_))));
    }

    #[test]
    fn single_feature_is_insufficient_cohort() {
        let data = dataset(30);
        let session = ClassificationSession::new(&data, SamplingConfig::default(), KMeansConfig::default());
        let mut req = request(20);
        req.features = FeatureSet::new([Feature::MatchWinPct]);
        let err = session.prepare(&req, &mut StdRng::seed_from_u64(4)).unwrap_err();
        assert!(matches!(err, SessionError::Clustering(ClusteringError::InsufficientCohort(_))));
    }

    #[test]
    fn sample_below_minimum_is_rejected() {
        let data = dataset(30);
        let session = ClassificationSession::new(&data, SamplingConfig::default(), KMeansConfig::default());
        let err = session.prepare(&request(5), &mut StdRng::seed_from_u64(5)).unwrap_err();
        assert!(matches!(err, SessionError::SampleTooSmall { requested: 5, min: 11 }));
    }

    #[test]
    fn empty_pool_is_reported() {
        let data = TennisDataset::default();
        let session = ClassificationSession::new(&data, SamplingConfig::default(), KMeansConfig::default());
        let err = session.prepare(&request(11), &mut StdRng::seed_from_u64(6)).unwrap_err();
        assert!(matches!(err, SessionError::Pool(PoolError::Empty { .. })));
    }

    #[test]
    fn classify_handles_known_unknown_and_incomplete_players() {
        let data = dataset(30);
        let session = ClassificationSession::new(&data, SamplingConfig::default(), KMeansConfig::default());
        let prepared = session
            .prepare(&request(30), &mut StdRng::seed_from_u64(7))
            .unwrap();
        let run = session.cluster(&prepared, 3).unwrap();

        assert_eq!(session.classify(&run, "Nobody", "Here").unwrap(), Classification::NotFound);
        assert_eq!(
            session.classify(&run, "Broken", "Stats").unwrap(),
            Classification::Incomplete(vec!["set1_comeback_pct"])
        );
        match session.classify(&run, "Player", "P4").unwrap() {
            Classification::Classified { prediction, .. } => {
                let expected = run.result.cluster_of("Player P4").unwrap();
                assert_eq!(prediction, Prediction::AlreadyClustered(expected));
            }
            other => panic!("expected a classification, got {other:?}"),
        }
    }

    #[test]
    fn cluster_rejects_k_above_cohort_size() {
        let data = dataset(15);
        let session = ClassificationSession::new(&data, SamplingConfig::default(), KMeansConfig::default());
        let prepared = session
            .prepare(&request(11), &mut StdRng::seed_from_u64(8))
            .unwrap();
        assert!(matches!(
            session.cluster(&prepared, 12),
            Err(SessionError::Clustering(ClusteringError::InvalidK { k: 12, max: 11 }))
        ));
    }

    #[test]
    fn request_from_config_uses_default_cutoff() {
        let mut config = crate::config::tests::default_config();
        config.session.mode = SessionMode::Ranked;
        config.session.rank_cutoff = None;
        let req = CohortRequest::from_config(&config).unwrap();
        assert_eq!(req.mode, PoolMode::Ranked { cutoff: Some(2500) });

        config.session.mode = SessionMode::Active;
        let req = CohortRequest::from_config(&config).unwrap();
        assert_eq!(req.mode, PoolMode::Active { season: 2024 });
    }
}
