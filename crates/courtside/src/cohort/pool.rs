// Candidate pool construction from match results and ranking snapshots.

use crate::cohort::Cohort;
use crate::dataset::{MatchRow, RankingRow, TennisDataset};
use crate::player::record::Sex;
use std::collections::BTreeSet;
use std::fmt;
use tracing::info;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Which players are eligible for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolMode {
    /// Every player appearing as winner or loser in the season's matches.
    Active { season: i32 },
    /// Every player ranked strictly better than `cutoff` on the latest
    /// ranking date. `None` means no cutoff.
    Ranked { cutoff: Option<u32> },
}

impl fmt::Display for PoolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolMode::Active { season } => write!(f, "active in {season}"),
            PoolMode::Ranked { cutoff: Some(c) } => write!(f, "ranked below {c}"),
            PoolMode::Ranked { cutoff: None } => write!(f, "ranked"),
        }
    }
}

/// Deduplicated identifiers eligible for sampling.
///
/// Ordered so that sampling with a seeded RNG is reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidatePool {
    ids: BTreeSet<String>,
}

impl CandidatePool {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.ids.iter()
    }
}

impl FromIterator<String> for CandidatePool {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        CandidatePool {
            ids: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("no {cohort} players found ({mode})")]
    Empty { cohort: Cohort, mode: PoolMode },
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Computes candidate pools over borrowed match and ranking tables.
#[derive(Debug, Clone, Copy)]
pub struct CandidatePoolBuilder<'a> {
    male_matches: &'a [MatchRow],
    female_matches: &'a [MatchRow],
    male_rankings: &'a [RankingRow],
    female_rankings: &'a [RankingRow],
}

impl<'a> CandidatePoolBuilder<'a> {
    pub fn new(
        male_matches: &'a [MatchRow],
        female_matches: &'a [MatchRow],
        male_rankings: &'a [RankingRow],
        female_rankings: &'a [RankingRow],
    ) -> Self {
        CandidatePoolBuilder {
            male_matches,
            female_matches,
            male_rankings,
            female_rankings,
        }
    }

    pub fn from_dataset(dataset: &'a TennisDataset) -> Self {
        Self::new(
            &dataset.male_matches,
            &dataset.female_matches,
            &dataset.male_rankings,
            &dataset.female_rankings,
        )
    }

    /// Build the pool for a cohort. An empty pool is an error: the session
    /// cannot continue for that cohort.
    pub fn build(&self, cohort: Cohort, mode: PoolMode) -> Result<CandidatePool, PoolError> {
        let pool = match mode {
            PoolMode::Active { season } => self.active_pool(cohort, season),
            PoolMode::Ranked { cutoff } => self.ranked_pool(cohort, cutoff),
        };
        if pool.is_empty() {
            return Err(PoolError::Empty { cohort, mode });
        }
        info!("Built {} candidate pool ({}): {} players", cohort, mode, pool.len());
        Ok(pool)
    }

    fn matches_for(&self, sex: Sex) -> &'a [MatchRow] {
        match sex {
            Sex::Male => self.male_matches,
            Sex::Female => self.female_matches,
        }
    }

    fn rankings_for(&self, sex: Sex) -> &'a [RankingRow] {
        match sex {
            Sex::Male => self.male_rankings,
            Sex::Female => self.female_rankings,
        }
    }

    fn active_pool(&self, cohort: Cohort, season: i32) -> CandidatePool {
        cohort
            .sexes()
            .iter()
            .flat_map(|sex| self.matches_for(*sex))
            .filter(|m| m.year == Some(season))
            .flat_map(|m| [m.winner_id.clone(), m.loser_id.clone()])
            .collect()
    }

    /// Mixed cohorts concatenate both ranking tables before the latest date
    /// is taken, so only the tour(s) published on that date contribute.
    fn ranked_pool(&self, cohort: Cohort, cutoff: Option<u32>) -> CandidatePool {
        let rows: Vec<&RankingRow> = cohort
            .sexes()
            .iter()
            .flat_map(|sex| self.rankings_for(*sex))
            .collect();
        let Some(latest) = rows.iter().map(|r| r.ranking_date).max() else {
            return CandidatePool::default();
        };
        rows.into_iter()
            .filter(|r| r.ranking_date == latest)
            .filter(|r| cutoff.map_or(true, |c| r.rank < c))
            .map(|r| r.player_id.clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
