// Cohorts: candidate pool construction and rejection sampling of players.

pub mod pool;
pub mod sampling;

use crate::player::record::Sex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rank cutoff applied to ranked pools when the caller supplies none.
pub const DEFAULT_RANK_CUTOFF: u32 = 2500;

/// The sex-based grouping a clustering run is performed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cohort {
    Male,
    Female,
    Mixed,
}

impl Cohort {
    /// Tour tables searched for this cohort, in lookup order.
    pub fn sexes(&self) -> &'static [Sex] {
        match self {
            Cohort::Male => &[Sex::Male],
            Cohort::Female => &[Sex::Female],
            Cohort::Mixed => &[Sex::Male, Sex::Female],
        }
    }

    pub fn includes(&self, sex: Sex) -> bool {
        self.sexes().contains(&sex)
    }
}

impl fmt::Display for Cohort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cohort::Male => write!(f, "male"),
            Cohort::Female => write!(f, "female"),
            Cohort::Mixed => write!(f, "mixed"),
        }
    }
}
