// Tabular data loading: player aggregates, match results and ranking snapshots.
//
// Each source is read with the `csv` crate into private serde row structs and
// normalized into the public row types. Malformed rows are skipped with a
// warning; numeric cells that are empty, unparseable or non-finite become
// missing values rather than errors.

use crate::config::DataPaths;
use crate::player::record::{Hand, PlayerRecord, Sex};
use chrono::NaiveDate;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// One match result: who won, who lost, the season it belongs to and the
/// tournament it was played in. Tournament columns are empty when the source
/// table does not carry them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchRow {
    pub winner_id: String,
    pub loser_id: String,
    pub year: Option<i32>,
    pub tourney_id: String,
    pub tourney_name: String,
    pub tourney_date: Option<NaiveDate>,
    /// Upstream level code: G (Grand Slam), M (Masters), A, F (tour finals)...
    pub tourney_level: String,
    pub surface: String,
    /// Round code as recorded: "F", "SF", "QF", "R16", "R32", "RR"...
    pub round: String,
    pub score: String,
}

impl MatchRow {
    pub fn involves(&self, player_id: &str) -> bool {
        self.winner_id == player_id || self.loser_id == player_id
    }

    pub fn is_final(&self) -> bool {
        self.round == "F"
    }
}

/// One entry of a weekly ranking snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingRow {
    pub ranking_date: NaiveDate,
    pub rank: u32,
    pub player_id: String,
}

/// Every table a classification session needs, loaded once.
#[derive(Debug, Clone, Default)]
pub struct TennisDataset {
    pub male_players: Vec<PlayerRecord>,
    pub female_players: Vec<PlayerRecord>,
    pub male_matches: Vec<MatchRow>,
    pub female_matches: Vec<MatchRow>,
    pub male_rankings: Vec<RankingRow>,
    pub female_rankings: Vec<RankingRow>,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("validation error: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Raw CSV serde structs (private)
// ---------------------------------------------------------------------------

/// Aggregated player row. Column aliases accept the headers produced by the
/// upstream aggregation scripts. Unknown columns are ignored.
#[derive(Debug, Deserialize)]
struct RawPlayer {
    #[serde(alias = "id")]
    player_id: String,
    #[serde(default)]
    name_first: String,
    #[serde(default)]
    name_last: String,
    #[serde(default)]
    hand: String,
    #[serde(default)]
    dob: String,
    #[serde(default, alias = "nb_tournois_joue", deserialize_with = "csv::invalid_option")]
    tournaments_played: Option<f64>,
    #[serde(default, alias = "nb_tournois_gagne", deserialize_with = "csv::invalid_option")]
    tournaments_won: Option<f64>,
    #[serde(default, alias = "nb_matchs_joue", deserialize_with = "csv::invalid_option")]
    matches_played: Option<f64>,
    #[serde(default, alias = "nb_matchs_gagne", deserialize_with = "csv::invalid_option")]
    matches_won: Option<f64>,
    #[serde(default, alias = "prop_vic_set_1_perdu", deserialize_with = "csv::invalid_option")]
    set1_comeback_pct: Option<f64>,
    #[serde(default, alias = "prop_balle_break_sauvee", deserialize_with = "csv::invalid_option")]
    break_points_saved_pct: Option<f64>,
    #[serde(default, alias = "nb_sem_classe", deserialize_with = "csv::invalid_option")]
    weeks_ranked: Option<f64>,
    #[serde(default, alias = "nb_sem_1_10", deserialize_with = "csv::invalid_option")]
    weeks_top10: Option<f64>,
    #[serde(default, alias = "nb_sem_11_50", deserialize_with = "csv::invalid_option")]
    weeks_top11_50: Option<f64>,
    #[serde(default, alias = "nb_sem_51_100", deserialize_with = "csv::invalid_option")]
    weeks_top51_100: Option<f64>,
    #[serde(default, alias = "first_match_date")]
    first_match: String,
    #[serde(default, alias = "last_match_date")]
    last_match: String,
}

#[derive(Debug, Deserialize)]
struct RawMatch {
    winner_id: String,
    loser_id: String,
    #[serde(default, alias = "annee", deserialize_with = "csv::invalid_option")]
    year: Option<f64>,
    #[serde(default)]
    tourney_date: String,
    #[serde(default)]
    tourney_id: String,
    #[serde(default)]
    tourney_name: String,
    #[serde(default)]
    tourney_level: String,
    #[serde(default)]
    surface: String,
    #[serde(default)]
    round: String,
    #[serde(default)]
    score: String,
}

#[derive(Debug, Deserialize)]
struct RawRanking {
    ranking_date: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    rank: Option<f64>,
    #[serde(alias = "player_id")]
    player: String,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Keep only finite values; NaN and infinities count as missing.
fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Normalize an identifier cell. Float-formatted integers ("104925.0") are
/// written by some exporters and must match their integer spelling.
pub fn normalize_id(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed.strip_suffix(".0").unwrap_or(trimmed).to_string()
}

/// Parse `YYYYMMDD` or `YYYY-MM-DD`, tolerating a trailing ".0".
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix(".0").unwrap_or(trimmed);
    if trimmed.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d"))
        .ok()
}

fn year_from_tourney_date(raw: &str) -> Option<i32> {
    parse_date(raw).map(|d| chrono::Datelike::year(&d))
}

// ---------------------------------------------------------------------------
// Reader-based loaders
// ---------------------------------------------------------------------------

/// Read player aggregate rows, tagging every record with the table's sex.
pub fn load_players_from_reader<R: Read>(rdr: R, sex: Sex) -> Result<Vec<PlayerRecord>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut players = Vec::new();
    for result in reader.deserialize::<RawPlayer>() {
        match result {
            Ok(raw) => {
                let id = normalize_id(&raw.player_id);
                if id.is_empty() {
                    warn!("skipping {} player row with empty id", sex);
                    continue;
                }
                players.push(PlayerRecord {
                    id,
                    first_name: raw.name_first.trim().to_string(),
                    last_name: raw.name_last.trim().to_string(),
                    sex,
                    hand: Hand::from_code(&raw.hand),
                    birth_date: parse_date(&raw.dob),
                    tournaments_played: finite(raw.tournaments_played),
                    tournaments_won: finite(raw.tournaments_won),
                    matches_played: finite(raw.matches_played),
                    matches_won: finite(raw.matches_won),
                    set1_comeback_pct: finite(raw.set1_comeback_pct),
                    break_points_saved_pct: finite(raw.break_points_saved_pct),
                    weeks_ranked: finite(raw.weeks_ranked),
                    weeks_top10: finite(raw.weeks_top10),
                    weeks_top11_50: finite(raw.weeks_top11_50),
                    weeks_top51_100: finite(raw.weeks_top51_100),
                    first_match: parse_date(&raw.first_match),
                    last_match: parse_date(&raw.last_match),
                });
            }
            Err(e) => {
                warn!("skipping malformed {} player row: {}", sex, e);
            }
        }
    }
    Ok(players)
}

/// Read match rows. The season comes from `year` when present, otherwise
/// from the first four digits of `tourney_date`.
pub fn load_matches_from_reader<R: Read>(rdr: R) -> Result<Vec<MatchRow>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut matches = Vec::new();
    for result in reader.deserialize::<RawMatch>() {
        match result {
            Ok(raw) => {
                let winner_id = normalize_id(&raw.winner_id);
                let loser_id = normalize_id(&raw.loser_id);
                if winner_id.is_empty() || loser_id.is_empty() {
                    warn!("skipping match row with missing player id");
                    continue;
                }
                let year = finite(raw.year)
                    .map(|y| y.round() as i32)
                    .or_else(|| year_from_tourney_date(&raw.tourney_date));
                matches.push(MatchRow {
                    winner_id,
                    loser_id,
                    year,
                    tourney_id: raw.tourney_id.trim().to_string(),
                    tourney_name: raw.tourney_name.trim().to_string(),
                    tourney_date: parse_date(&raw.tourney_date),
                    tourney_level: raw.tourney_level.trim().to_string(),
                    surface: raw.surface.trim().to_string(),
                    round: raw.round.trim().to_string(),
                    score: raw.score.trim().to_string(),
                });
            }
            Err(e) => {
                warn!("skipping malformed match row: {}", e);
            }
        }
    }
    Ok(matches)
}

/// Read ranking snapshot rows. Rows without a usable date or rank are skipped.
pub fn load_rankings_from_reader<R: Read>(rdr: R) -> Result<Vec<RankingRow>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut rankings = Vec::new();
    for result in reader.deserialize::<RawRanking>() {
        match result {
            Ok(raw) => {
                let Some(ranking_date) = parse_date(&raw.ranking_date) else {
                    warn!("skipping ranking row with bad date '{}'", raw.ranking_date);
                    continue;
                };
                let Some(rank) = finite(raw.rank).filter(|r| *r >= 1.0) else {
                    warn!("skipping ranking row for '{}': missing rank", raw.player.trim());
                    continue;
                };
                rankings.push(RankingRow {
                    ranking_date,
                    rank: rank.round() as u32,
                    player_id: normalize_id(&raw.player),
                });
            }
            Err(e) => {
                warn!("skipping malformed ranking row: {}", e);
            }
        }
    }
    Ok(rankings)
}

// ---------------------------------------------------------------------------
// Public path-based loaders
// ---------------------------------------------------------------------------

fn open(path: &Path) -> Result<std::fs::File, DataError> {
    std::fs::File::open(path).map_err(|e| DataError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

fn csv_error(path: &Path) -> impl FnOnce(csv::Error) -> DataError + '_ {
    move |e| DataError::Csv {
        path: path.display().to_string(),
        source: e,
    }
}

/// Load one player table from a CSV file.
pub fn load_players(path: &Path, sex: Sex) -> Result<Vec<PlayerRecord>, DataError> {
    load_players_from_reader(open(path)?, sex).map_err(csv_error(path))
}

/// Load and concatenate several match tables.
pub fn load_matches(paths: &[String]) -> Result<Vec<MatchRow>, DataError> {
    let mut all = Vec::new();
    for p in paths {
        let path = Path::new(p);
        all.extend(load_matches_from_reader(open(path)?).map_err(csv_error(path))?);
    }
    Ok(all)
}

/// Load one ranking table from a CSV file.
pub fn load_rankings(path: &Path) -> Result<Vec<RankingRow>, DataError> {
    load_rankings_from_reader(open(path)?).map_err(csv_error(path))
}

/// Load every table named in the data config.
pub fn load_all(paths: &DataPaths) -> Result<TennisDataset, DataError> {
    let male_players = load_players(Path::new(&paths.players_male), Sex::Male)?;
    let female_players = load_players(Path::new(&paths.players_female), Sex::Female)?;

    if male_players.is_empty() && female_players.is_empty() {
        return Err(DataError::Validation(
            "player CSVs produced zero valid rows".into(),
        ));
    }

    let dataset = TennisDataset {
        male_players,
        female_players,
        male_matches: load_matches(&paths.matches_male)?,
        female_matches: load_matches(&paths.matches_female)?,
        male_rankings: load_rankings(Path::new(&paths.rankings_male))?,
        female_rankings: load_rankings(Path::new(&paths.rankings_female))?,
    };

    info!(
        "Loaded {} male / {} female players, {} matches, {} ranking rows",
        dataset.male_players.len(),
        dataset.female_players.len(),
        dataset.male_matches.len() + dataset.female_matches.len(),
        dataset.male_rankings.len() + dataset.female_rankings.len()
    );

    Ok(dataset)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const PLAYER_HEADER: &str = "player_id,name_first,name_last,hand,dob,tournaments_played,tournaments_won,matches_played,matches_won,set1_comeback_pct,break_points_saved_pct,weeks_ranked,weeks_top10,weeks_top11_50,weeks_top51_100,first_match,last_match";

    // -- Player rows --

    #[test]
    fn player_csv_roundtrip() {
        let csv_data = format!(
            "{PLAYER_HEADER}\n\
104745,Rafael,Nadal,L,19860603,450,92,1300,1080,35.2,66.5,1000,900,80,20,20010414,20241119"
        );
        let players = load_players_from_reader(csv_data.as_bytes(), Sex::Male).unwrap();
        assert_eq!(players.len(), 1);
        let p = &players[0];
        assert_eq!(p.id, "104745");
        assert_eq!(p.full_name(), "Rafael Nadal");
        assert_eq!(p.sex, Sex::Male);
        assert_eq!(p.hand, Hand::Left);
        assert_eq!(p.birth_date, NaiveDate::from_ymd_opt(1986, 6, 3));
        assert_eq!(p.matches_played, Some(1300.0));
        assert_eq!(p.weeks_top10, Some(900.0));
        assert_eq!(p.last_match, NaiveDate::from_ymd_opt(2024, 11, 19));
        assert!(p.is_valid_for_clustering());
    }

    #[test]
    fn upstream_column_aliases_accepted() {
        let csv_data = "\
player_id,name_first,name_last,hand,dob,nb_tournois_joue,nb_tournois_gagne,nb_matchs_joue,nb_matchs_gagne,prop_vic_set_1_perdu,prop_balle_break_sauvee,nb_sem_classe,nb_sem_1_10,nb_sem_11_50,nb_sem_51_100,first_match_date,last_match_date
200001,Serena,Williams,R,1981-09-26,300,73,1000,850,40.0,62.0,1100,700,300,50,1995-10-28,2022-08-30";
        let players = load_players_from_reader(csv_data.as_bytes(), Sex::Female).unwrap();
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].sex, Sex::Female);
        assert_eq!(players[0].tournaments_won, Some(73.0));
        assert_eq!(players[0].set1_comeback_pct, Some(40.0));
        assert_eq!(players[0].first_match, NaiveDate::from_ymd_opt(1995, 10, 28));
    }

    #[test]
    fn empty_and_nan_cells_become_missing() {
        let csv_data = format!(
            "{PLAYER_HEADER}\n\
1,Empty,Cells,R,,,,400,200,,60,500,0,0,0,,\n\
2,Nan,Cells,R,,100,1,400,200,nan,60,inf,0,0,0,,"
        );
        let players = load_players_from_reader(csv_data.as_bytes(), Sex::Male).unwrap();
        assert_eq!(players.len(), 2);
        assert_eq!(players[0].tournaments_played, None);
        assert_eq!(players[0].set1_comeback_pct, None);
        assert_eq!(players[0].birth_date, None);
        assert_eq!(players[1].set1_comeback_pct, None);
        assert_eq!(players[1].weeks_ranked, None);
        assert!(!players[0].is_valid_for_clustering());
        assert!(!players[1].is_valid_for_clustering());
    }

    #[test]
    fn unparseable_numeric_cell_is_missing_not_fatal() {
        let csv_data = format!(
            "{PLAYER_HEADER}\n\
1,Bad,Number,R,,not_a_number,1,400,200,30,60,500,0,0,0,,"
        );
        let players = load_players_from_reader(csv_data.as_bytes(), Sex::Male).unwrap();
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].tournaments_played, None);
    }

    #[test]
    fn float_formatted_ids_normalized() {
        let csv_data = format!(
            "{PLAYER_HEADER}\n\
104925.0,Novak,Djokovic,R,19870522.0,400,99,1350,1150,38,65,1050,900,100,20,,"
        );
        let players = load_players_from_reader(csv_data.as_bytes(), Sex::Male).unwrap();
        assert_eq!(players[0].id, "104925");
        assert_eq!(players[0].birth_date, NaiveDate::from_ymd_opt(1987, 5, 22));
    }

    #[test]
    fn names_trimmed_and_extra_columns_ignored() {
        let csv_data = "\
player_id,name_first,name_last,hand,ioc,height
7,  Roger  , Federer ,R,SUI,185";
        let players = load_players_from_reader(csv_data.as_bytes(), Sex::Male).unwrap();
        assert_eq!(players[0].first_name, "Roger");
        assert_eq!(players[0].last_name, "Federer");
        assert_eq!(players[0].matches_played, None);
    }

    // -- Match rows --

    #[test]
    fn match_year_from_column_or_tourney_date() {
        let csv_data = "\
winner_id,loser_id,year,tourney_date
1,2,2024,20240115
3,4,,20230301
5,6,,";
        let matches = load_matches_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0].year, Some(2024));
        assert_eq!(matches[1].year, Some(2023));
        assert_eq!(matches[2].year, None);
    }

    #[test]
    fn match_tournament_columns_kept() {
        let csv_data = "\
tourney_id,tourney_name,surface,draw_size,tourney_level,tourney_date,match_num,winner_id,loser_id,score,best_of,round
2023-0520,Roland Garros,Clay,128,G,20230528,300,104745,100001,6-3 6-4 7-6(5),5,F";
        let matches = load_matches_from_reader(csv_data.as_bytes()).unwrap();
        let m = &matches[0];
        assert_eq!(m.tourney_id, "2023-0520");
        assert_eq!(m.tourney_name, "Roland Garros");
        assert_eq!(m.tourney_date, NaiveDate::from_ymd_opt(2023, 5, 28));
        assert_eq!(m.tourney_level, "G");
        assert_eq!(m.surface, "Clay");
        assert_eq!(m.score, "6-3 6-4 7-6(5)");
        assert!(m.is_final());
        assert!(m.involves("100001") && m.involves("104745") && !m.involves("1"));
        assert_eq!(m.year, Some(2023));
    }

    #[test]
    fn match_rows_without_tournament_columns_load() {
        let csv_data = "\
year,winner_id,loser_id
2024,200001,200005";
        let matches = load_matches_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(matches[0].tourney_name, "");
        assert_eq!(matches[0].tourney_date, None);
        assert!(!matches[0].is_final());
    }

    #[test]
    fn match_rows_without_ids_skipped() {
        let csv_data = "\
winner_id,loser_id,year
1,,2024
1,2,2024";
        let matches = load_matches_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].loser_id, "2");
    }

    // -- Ranking rows --

    #[test]
    fn ranking_rows_parsed_and_bad_rows_skipped() {
        let csv_data = "\
ranking_date,rank,player,points
20241230,1,206173,11830
20241230,,104925,3900
bad,3,100644,7000
20241223,2.0,100644,7635";
        let rankings = load_rankings_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(rankings.len(), 2);
        assert_eq!(rankings[0].rank, 1);
        assert_eq!(rankings[0].ranking_date, NaiveDate::from_ymd_opt(2024, 12, 30).unwrap());
        assert_eq!(rankings[1].rank, 2);
        assert_eq!(rankings[1].player_id, "100644");
    }

    // -- Path loaders --

    #[test]
    fn missing_file_is_io_error() {
        let err = load_players(Path::new("does/not/exist.csv"), Sex::Male).unwrap_err();
        assert!(matches!(err, DataError::Io { .. }));
        assert!(err.to_string().contains("does/not/exist.csv"));
    }

    #[test]
    fn parse_date_formats() {
        assert_eq!(parse_date("20240115"), NaiveDate::from_ymd_opt(2024, 1, 15));
        assert_eq!(parse_date("2024-01-15"), NaiveDate::from_ymd_opt(2024, 1, 15));
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("15/01/2024"), None);
    }
}
