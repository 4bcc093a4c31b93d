// Closed feature enumeration and per-player feature extraction.

use crate::clustering::{ClusteringError, MIN_CLUSTER_INPUT};
use crate::cohort::Cohort;
use crate::player::record::{percentage, Hand, PlayerRecord, Sex};
use ndarray::{aview1, Array2};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Value of the "hot" slot of a one-hot pair.
const ONE_HOT: f64 = 100.0;

// ---------------------------------------------------------------------------
// Feature
// ---------------------------------------------------------------------------

/// A numeric characteristic of a player used as clustering input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    MatchWinPct,
    TournamentWinPct,
    Set1ComebackPct,
    BreakPointSavePct,
    WeeksTop10Pct,
    WeeksTop11To50Pct,
    WeeksTop51To100Pct,
    /// One-hot pair: right, left.
    DominantHand,
    /// One-hot pair: male, female. Mixed cohorts only.
    Sex,
}

impl Feature {
    pub const ALL: [Feature; 9] = [
        Feature::MatchWinPct,
        Feature::TournamentWinPct,
        Feature::Set1ComebackPct,
        Feature::BreakPointSavePct,
        Feature::WeeksTop10Pct,
        Feature::WeeksTop11To50Pct,
        Feature::WeeksTop51To100Pct,
        Feature::DominantHand,
        Feature::Sex,
    ];

    /// Configuration name.
    pub fn name(&self) -> &'static str {
        match self {
            Feature::MatchWinPct => "match_win_pct",
            Feature::TournamentWinPct => "tournament_win_pct",
            Feature::Set1ComebackPct => "set1_comeback_pct",
            Feature::BreakPointSavePct => "break_point_save_pct",
            Feature::WeeksTop10Pct => "weeks_top10_pct",
            Feature::WeeksTop11To50Pct => "weeks_top11_50_pct",
            Feature::WeeksTop51To100Pct => "weeks_top51_100_pct",
            Feature::DominantHand => "dominant_hand",
            Feature::Sex => "sex",
        }
    }

    /// Human-readable column labels, one per dimension.
    pub fn labels(&self) -> &'static [&'static str] {
        match self {
            Feature::MatchWinPct => &["Match win %"],
            Feature::TournamentWinPct => &["Tournament win %"],
            Feature::Set1ComebackPct => &["Comeback after losing set 1 %"],
            Feature::BreakPointSavePct => &["Break points saved %"],
            Feature::WeeksTop10Pct => &["Weeks top 10 %"],
            Feature::WeeksTop11To50Pct => &["Weeks top 11-50 %"],
            Feature::WeeksTop51To100Pct => &["Weeks top 51-100 %"],
            Feature::DominantHand => &["Right hand", "Left hand"],
            Feature::Sex => &["Male", "Female"],
        }
    }

    pub fn dimensions(&self) -> usize {
        self.labels().len()
    }

    /// Whether the feature makes sense for a cohort. Sex is constant inside
    /// a single-sex cohort.
    pub fn available_for(&self, cohort: Cohort) -> bool {
        match self {
            Feature::Sex => cohort == Cohort::Mixed,
            _ => true,
        }
    }

    /// Whether the feature is a single percentage column.
    pub fn is_ratio(&self) -> bool {
        !matches!(self, Feature::DominantHand | Feature::Sex)
    }

    /// Append this feature's value(s) for `record` to `out`.
    ///
    /// A missing statistic contributes 0.
    fn extract_into(&self, record: &PlayerRecord, out: &mut Vec<f64>) {
        match self {
            Feature::DominantHand => out.extend_from_slice(match record.hand {
                Hand::Right => &[ONE_HOT, 0.0],
                Hand::Left => &[0.0, ONE_HOT],
                Hand::Unknown => &[0.0, 0.0],
            }),
            Feature::Sex => out.extend_from_slice(match record.sex {
                Sex::Male => &[ONE_HOT, 0.0],
                Sex::Female => &[0.0, ONE_HOT],
            }),
            ratio => out.push(ratio.percentage_value(record)),
        }
    }

    fn ratio_value(&self, r: &PlayerRecord) -> Option<f64> {
        let count = |v: Option<f64>| v.unwrap_or(0.0);
        match self {
            Feature::MatchWinPct => r.match_win_rate(),
            Feature::TournamentWinPct => r.tournament_win_rate(),
            Feature::Set1ComebackPct => r.set1_comeback_pct,
            Feature::BreakPointSavePct => r.break_points_saved_pct,
            Feature::WeeksTop10Pct => Some(percentage(count(r.weeks_top10), count(r.weeks_ranked))),
            Feature::WeeksTop11To50Pct => {
                Some(percentage(count(r.weeks_top11_50), count(r.weeks_ranked)))
            }
            Feature::WeeksTop51To100Pct => {
                Some(percentage(count(r.weeks_top51_100), count(r.weeks_ranked)))
            }
            Feature::DominantHand | Feature::Sex => None,
        }
    }

    /// Ratios derived from counts are clamped to [0, 100]. Percentages read
    /// from the table are used as recorded and only flagged when out of range.
    fn percentage_value(&self, record: &PlayerRecord) -> f64 {
        let value = match self.ratio_value(record) {
            Some(v) if v.is_finite() => v,
            _ => return 0.0,
        };
        match self {
            Feature::Set1ComebackPct | Feature::BreakPointSavePct => {
                if !(0.0..=100.0).contains(&value) {
                    warn!(
                        "{} of player {} is {} (outside 0-100), using it as recorded",
                        self, record.id, value
                    );
                }
                value
            }
            _ => value.clamp(0.0, 100.0),
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A feature name that matches no [`Feature`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown feature '{0}'")]
pub struct UnknownFeature(pub String);

impl FromStr for Feature {
    type Err = UnknownFeature;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Feature::ALL
            .into_iter()
            .find(|f| f.name() == name)
            .ok_or_else(|| UnknownFeature(name.to_string()))
    }
}

// ---------------------------------------------------------------------------
// FeatureSet
// ---------------------------------------------------------------------------

/// Ordered, duplicate-free list of features fixing the layout of every
/// vector in a clustering run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSet {
    features: Vec<Feature>,
}

impl FeatureSet {
    /// Keeps the first occurrence of each feature.
    pub fn new(features: impl IntoIterator<Item = Feature>) -> Self {
        let mut out: Vec<Feature> = Vec::new();
        for f in features {
            if !out.contains(&f) {
                out.push(f);
            }
        }
        FeatureSet { features: out }
    }

    /// Every feature available for the cohort, in canonical order.
    pub fn all_for(cohort: Cohort) -> Self {
        Self::new(Feature::ALL.into_iter().filter(|f| f.available_for(cohort)))
    }

    /// Build from names for `cohort`, ignoring names that are not recognized
    /// and features the cohort cannot use.
    pub fn from_names<S: AsRef<str>>(names: &[S], cohort: Cohort) -> Self {
        Self::new(names.iter().filter_map(|n| match n.as_ref().parse::<Feature>() {
            Ok(f) if f.available_for(cohort) => Some(f),
            Ok(f) => {
                warn!("Ignoring feature '{}' for the {} cohort", f, cohort);
                None
            }
            Err(e) => {
                warn!("Ignoring {}", e);
                None
            }
        }))
    }

    /// Number of features (not dimensions).
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    /// Vector length produced by [`FeatureSet::extract`].
    pub fn dimensions(&self) -> usize {
        self.features.iter().map(Feature::dimensions).sum()
    }

    /// Column labels in vector order.
    pub fn labels(&self) -> Vec<&'static str> {
        self.features.iter().flat_map(|f| f.labels().iter().copied()).collect()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.features.iter().map(Feature::name).collect()
    }

    /// Extract a record's feature vector in this set's order.
    pub fn extract(&self, record: &PlayerRecord) -> FeatureVector {
        let mut values = Vec::with_capacity(self.dimensions());
        for f in &self.features {
            f.extract_into(record, &mut values);
        }
        FeatureVector(values)
    }
}

/// One player's numeric feature values.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(pub Vec<f64>);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ---------------------------------------------------------------------------
// FeatureMatrix
// ---------------------------------------------------------------------------

/// Feature rows of a sampled cohort, aligned with player ids and names.
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    pub player_ids: Vec<String>,
    pub player_names: Vec<String>,
    /// One row per player, one column per dimension.
    pub rows: Array2<f64>,
    pub features: FeatureSet,
}

impl FeatureMatrix {
    /// Fails with `InsufficientCohort` for fewer than two players or fewer
    /// than two features.
    pub fn build(records: &[PlayerRecord], features: &FeatureSet) -> Result<Self, ClusteringError> {
        if features.len() < MIN_CLUSTER_INPUT {
            return Err(ClusteringError::InsufficientCohort(format!(
                "{} feature(s) selected, at least {} required",
                features.len(),
                MIN_CLUSTER_INPUT
            )));
        }
        if records.len() < MIN_CLUSTER_INPUT {
            return Err(ClusteringError::InsufficientCohort(format!(
                "{} valid player(s), at least {} required",
                records.len(),
                MIN_CLUSTER_INPUT
            )));
        }
        let mut rows = Array2::zeros((records.len(), features.dimensions()));
        for (mut row, record) in rows.outer_iter_mut().zip(records) {
            row.assign(&aview1(features.extract(record).as_slice()));
        }
        Ok(FeatureMatrix {
            player_ids: records.iter().map(|r| r.id.clone()).collect(),
            player_names: records.iter().map(PlayerRecord::full_name).collect(),
            rows,
            features: features.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.rows.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.nrows() == 0
    }

    pub fn dimensions(&self) -> usize {
        self.features.dimensions()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::record::tests::sample_record;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    // -- Feature parsing --

    #[test]
    fn feature_names_round_trip() {
        for f in Feature::ALL {
            assert_eq!(f.name().parse::<Feature>().unwrap(), f);
        }
    }

    #[test]
    fn unknown_feature_name_is_an_error() {
        let err = "serve_speed".parse::<Feature>().unwrap_err();
        assert_eq!(err, UnknownFeature("serve_speed".into()));
        assert!(err.to_string().contains("serve_speed"));
    }

    #[test]
    fn sex_only_available_for_mixed() {
        assert!(!Feature::Sex.available_for(Cohort::Male));
        assert!(!Feature::Sex.available_for(Cohort::Female));
        assert!(Feature::Sex.available_for(Cohort::Mixed));
        assert!(Feature::DominantHand.available_for(Cohort::Female));
    }

    // -- FeatureSet --

    #[test]
    fn from_names_ignores_unknown_and_keeps_order() {
        let set = FeatureSet::from_names(&["weeks_top10_pct", "bogus", "match_win_pct"], Cohort::Male);
        assert_eq!(set.names(), vec!["weeks_top10_pct", "match_win_pct"]);
    }

    #[test]
    fn from_names_drops_sex_outside_mixed_cohorts() {
        let names = ["match_win_pct", "sex", "dominant_hand"];
        for cohort in [Cohort::Male, Cohort::Female] {
            let set = FeatureSet::from_names(&names, cohort);
            assert_eq!(set.names(), vec!["match_win_pct", "dominant_hand"]);
            assert_eq!(set.dimensions(), 3);
        }
        let mixed = FeatureSet::from_names(&names, Cohort::Mixed);
        assert_eq!(mixed.names(), vec!["match_win_pct", "sex", "dominant_hand"]);
    }

    #[test]
    fn duplicate_features_are_dropped() {
        let set = FeatureSet::new([Feature::MatchWinPct, Feature::DominantHand, Feature::MatchWinPct]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.dimensions(), 3);
    }

    #[test]
    fn all_for_cohort() {
        assert_eq!(FeatureSet::all_for(Cohort::Male).len(), 8);
        assert_eq!(FeatureSet::all_for(Cohort::Mixed).len(), 9);
        assert_eq!(FeatureSet::all_for(Cohort::Mixed).dimensions(), 11);
    }

    #[test]
    fn labels_expand_one_hot_features() {
        let set = FeatureSet::new([Feature::MatchWinPct, Feature::DominantHand, Feature::Sex]);
        assert_eq!(
            set.labels(),
            vec!["Match win %", "Right hand", "Left hand", "Male", "Female"]
        );
    }

    // -- Extraction --

    #[test]
    fn extracts_in_requested_order() {
        let r = sample_record("1", "A", "B");
        let set = FeatureSet::new([
            Feature::BreakPointSavePct,
            Feature::MatchWinPct,
            Feature::TournamentWinPct,
            Feature::WeeksTop10Pct,
            Feature::WeeksTop11To50Pct,
            Feature::WeeksTop51To100Pct,
            Feature::Set1ComebackPct,
        ]);
        let v = set.extract(&r);
        let expected = [61.0, 65.0, 10.0, 10.0, 40.0, 30.0, 32.5];
        assert_eq!(v.len(), expected.len());
        for (got, want) in v.as_slice().iter().zip(expected) {
            assert!(approx(*got, want), "got {got}, want {want}");
        }
    }

    #[test]
    fn one_hot_encodings() {
        let set = FeatureSet::new([Feature::DominantHand, Feature::Sex]);
        let mut r = sample_record("1", "A", "B");
        assert_eq!(set.extract(&r).0, vec![100.0, 0.0, 100.0, 0.0]);
        r.hand = Hand::Left;
        r.sex = Sex::Female;
        assert_eq!(set.extract(&r).0, vec![0.0, 100.0, 0.0, 100.0]);
        r.hand = Hand::Unknown;
        assert_eq!(set.extract(&r).0, vec![0.0, 0.0, 0.0, 100.0]);
    }

    #[test]
    fn zero_denominators_give_zero() {
        let mut r = sample_record("1", "A", "B");
        r.matches_played = Some(0.0);
        r.matches_won = Some(0.0);
        r.tournaments_played = Some(0.0);
        r.weeks_ranked = Some(0.0);
        let v = FeatureSet::all_for(Cohort::Male).extract(&r);
        assert!(v.as_slice().iter().all(|x| x.is_finite()));
        assert_eq!(v.0[0], 0.0);
        assert_eq!(v.0[1], 0.0);
        assert_eq!(v.0[4], 0.0);
    }

    #[test]
    fn derived_ratios_stay_within_percentage_bounds() {
        let mut r = sample_record("1", "A", "B");
        r.weeks_top10 = Some(900.0);
        r.matches_won = Some(450.0);
        let set = FeatureSet::all_for(Cohort::Male);
        let v = set.extract(&r);
        assert_eq!(v.len(), set.dimensions());
        assert!(v.as_slice().iter().all(|x| (0.0..=100.0).contains(x)));
        assert_eq!(v.0[0], 100.0);
        assert_eq!(v.0[4], 100.0);
    }

    #[test]
    fn recorded_percentages_are_used_as_is() {
        let mut r = sample_record("1", "A", "B");
        r.set1_comeback_pct = Some(-3.0);
        r.break_points_saved_pct = Some(104.5);
        let set = FeatureSet::new([Feature::Set1ComebackPct, Feature::BreakPointSavePct]);
        assert_eq!(set.extract(&r).0, vec![-3.0, 104.5]);

        r.set1_comeback_pct = Some(f64::NAN);
        assert_eq!(set.extract(&r).0, vec![0.0, 104.5]);
    }

    #[test]
    fn extraction_is_idempotent() {
        let r = sample_record("1", "A", "B");
        let set = FeatureSet::all_for(Cohort::Mixed);
        assert_eq!(set.extract(&r), set.extract(&r));
    }

    // -- Matrix --

    #[test]
    fn matrix_aligns_ids_names_and_rows() {
        let records = vec![sample_record("1", "A", "B"), sample_record("2", "C", "D")];
        let set = FeatureSet::new([Feature::MatchWinPct, Feature::DominantHand]);
        let m = FeatureMatrix::build(&records, &set).unwrap();
        assert_eq!(m.player_ids, vec!["1", "2"]);
        assert_eq!(m.player_names, vec!["A B", "C D"]);
        assert_eq!(m.rows.dim(), (2, m.dimensions()));
        assert_eq!(m.rows.row(1).to_vec(), set.extract(&records[1]).0);
    }

    #[test]
    fn matrix_requires_two_players_and_two_features() {
        let one = vec![sample_record("1", "A", "B")];
        let two = vec![sample_record("1", "A", "B"), sample_record("2", "C", "D")];
        let set = FeatureSet::new([Feature::MatchWinPct, Feature::DominantHand]);
        assert!(matches!(
            FeatureMatrix::build(&one, &set),
            Err(ClusteringError::InsufficientCohort(_))
        ));
        let single = FeatureSet::new([Feature::DominantHand]);
        assert!(matches!(
            FeatureMatrix::build(&two, &single),
            Err(ClusteringError::InsufficientCohort(_))
        ));
    }
}
