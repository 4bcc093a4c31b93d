// Player record: identity, career aggregates and clustering validity.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which tour table a player comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sex::Male => write!(f, "male"),
            Sex::Female => write!(f, "female"),
        }
    }
}

/// Dominant playing hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hand {
    Right,
    Left,
    Unknown,
}

impl Hand {
    /// Parse the single-letter hand code used by the player tables.
    ///
    /// `R` and `L` map to their hands; anything else (including `U`, `A` for
    /// ambidextrous, or an empty cell) is `Unknown`.
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "R" => Hand::Right,
            "L" => Hand::Left,
            _ => Hand::Unknown,
        }
    }
}

// ---------------------------------------------------------------------------
// PlayerRecord
// ---------------------------------------------------------------------------

/// A single player's identity and precomputed career statistics.
///
/// Every numeric statistic is either a finite value or `None` (missing).
/// Missing values never prevent display, but a record lacking any of the
/// statistics listed in [`REQUIRED_STATISTICS`] cannot be clustered.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub sex: Sex,
    pub hand: Hand,
    pub birth_date: Option<NaiveDate>,
    pub tournaments_played: Option<f64>,
    pub tournaments_won: Option<f64>,
    pub matches_played: Option<f64>,
    pub matches_won: Option<f64>,
    /// Percentage (0-100) of matches won after losing the first set.
    pub set1_comeback_pct: Option<f64>,
    /// Percentage (0-100) of break points saved.
    pub break_points_saved_pct: Option<f64>,
    pub weeks_ranked: Option<f64>,
    pub weeks_top10: Option<f64>,
    pub weeks_top11_50: Option<f64>,
    pub weeks_top51_100: Option<f64>,
    pub first_match: Option<NaiveDate>,
    pub last_match: Option<NaiveDate>,
}

/// Statistics that must all be present for a record to enter a clustering run.
pub const REQUIRED_STATISTICS: [&str; 5] = [
    "matches_played",
    "tournaments_played",
    "set1_comeback_pct",
    "break_points_saved_pct",
    "weeks_ranked",
];

impl PlayerRecord {
    /// "First Last", the key used to match players across a clustering run.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Names of required statistics that are missing or non-finite.
    pub fn missing_statistics(&self) -> Vec<&'static str> {
        let values = [
            self.matches_played,
            self.tournaments_played,
            self.set1_comeback_pct,
            self.break_points_saved_pct,
            self.weeks_ranked,
        ];
        REQUIRED_STATISTICS
            .iter()
            .zip(values)
            .filter(|(_, v)| !v.is_some_and(f64::is_finite))
            .map(|(name, _)| *name)
            .collect()
    }

    /// Whether the record can be used for feature extraction.
    pub fn is_valid_for_clustering(&self) -> bool {
        self.missing_statistics().is_empty()
    }

    /// Match win percentage, or `None` when matches played is unknown.
    /// Zero matches played gives 0.0.
    pub fn match_win_rate(&self) -> Option<f64> {
        let played = self.matches_played?;
        Some(percentage(self.matches_won.unwrap_or(0.0), played))
    }

    /// Tournament win percentage, or `None` when tournaments played is unknown.
    pub fn tournament_win_rate(&self) -> Option<f64> {
        let played = self.tournaments_played?;
        Some(percentage(self.tournaments_won.unwrap_or(0.0), played))
    }

    /// Share of ranked weeks spent in a band, as a percentage.
    pub fn ranked_weeks_share(&self, weeks_in_band: Option<f64>) -> Option<f64> {
        let total = self.weeks_ranked?;
        Some(percentage(weeks_in_band.unwrap_or(0.0), total))
    }

    /// Side-by-side derived ratios for two players.
    pub fn compare<'a>(&'a self, other: &'a PlayerRecord) -> PlayerComparison<'a> {
        PlayerComparison {
            left: self,
            right: other,
            match_win_rate: (self.match_win_rate(), other.match_win_rate()),
            tournament_win_rate: (self.tournament_win_rate(), other.tournament_win_rate()),
            set1_comeback_pct: (self.set1_comeback_pct, other.set1_comeback_pct),
            break_points_saved_pct: (self.break_points_saved_pct, other.break_points_saved_pct),
            weeks_top10_share: (
                self.ranked_weeks_share(self.weeks_top10),
                other.ranked_weeks_share(other.weeks_top10),
            ),
        }
    }
}

/// `part / whole * 100`, with a zero (or negative) whole yielding 0.0.
pub(crate) fn percentage(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 {
        return 0.0;
    }
    part / whole * 100.0
}

/// Derived ratios of two players, paired as (left, right).
#[derive(Debug, Clone)]
pub struct PlayerComparison<'a> {
    pub left: &'a PlayerRecord,
    pub right: &'a PlayerRecord,
    pub match_win_rate: (Option<f64>, Option<f64>),
    pub tournament_win_rate: (Option<f64>, Option<f64>),
    pub set1_comeback_pct: (Option<f64>, Option<f64>),
    pub break_points_saved_pct: (Option<f64>, Option<f64>),
    pub weeks_top10_share: (Option<f64>, Option<f64>),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
