// Match history queries: head-to-head records, tournament results and titles.

use crate::dataset::{MatchRow, TennisDataset};
use crate::player::record::Sex;
use chrono::NaiveDate;

/// Meetings between two players, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadToHead<'a> {
    /// Wins of the first player passed to [`MatchHistory::head_to_head`].
    pub wins: usize,
    pub losses: usize,
    pub matches: Vec<&'a MatchRow>,
}

impl HeadToHead<'_> {
    pub fn total(&self) -> usize {
        self.matches.len()
    }
}

/// One tournament a player entered, summarized from their matches in it.
#[derive(Debug, Clone, PartialEq)]
pub struct TournamentEntry<'a> {
    pub tourney_id: &'a str,
    pub tourney_name: &'a str,
    pub tourney_date: Option<NaiveDate>,
    pub tourney_level: &'a str,
    pub surface: &'a str,
    pub wins: usize,
    pub losses: usize,
    /// Round of the player's last match in the table.
    pub last_round: &'a str,
    /// The player won the final.
    pub won: bool,
}

/// Restricts tournament queries. Empty lists accept everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TournamentFilter {
    pub years: Vec<i32>,
    pub levels: Vec<String>,
    /// Matched case-insensitively.
    pub surfaces: Vec<String>,
}

impl TournamentFilter {
    pub fn accepts(&self, m: &MatchRow) -> bool {
        let year_ok = self.years.is_empty() || m.year.is_some_and(|y| self.years.contains(&y));
        let level_ok = self.levels.is_empty() || self.levels.iter().any(|l| *l == m.tourney_level);
        let surface_ok = self.surfaces.is_empty()
            || self.surfaces.iter().any(|s| s.eq_ignore_ascii_case(&m.surface));
        year_ok && level_ok && surface_ok
    }
}

/// Read-only queries over one tour's match table.
#[derive(Debug, Clone, Copy)]
pub struct MatchHistory<'a> {
    matches: &'a [MatchRow],
}

impl<'a> MatchHistory<'a> {
    pub fn new(matches: &'a [MatchRow]) -> Self {
        MatchHistory { matches }
    }

    pub fn from_dataset(dataset: &'a TennisDataset, sex: Sex) -> Self {
        match sex {
            Sex::Male => Self::new(&dataset.male_matches),
            Sex::Female => Self::new(&dataset.female_matches),
        }
    }

    /// Every match between `a` and `b`, counted from `a`'s side.
    pub fn head_to_head(&self, a: &str, b: &str) -> HeadToHead<'a> {
        let mut matches: Vec<&'a MatchRow> = self
            .matches
            .iter()
            .filter(|m| {
                (m.winner_id == a && m.loser_id == b) || (m.winner_id == b && m.loser_id == a)
            })
            .collect();
        matches.sort_by_key(|m| m.tourney_date);
        let wins = matches.iter().filter(|m| m.winner_id == a).count();
        HeadToHead {
            wins,
            losses: matches.len() - wins,
            matches,
        }
    }

    /// Tournaments `player` took part in, ordered by start date.
    pub fn tournaments(&self, player: &str, filter: &TournamentFilter) -> Vec<TournamentEntry<'a>> {
        let mut entries: Vec<TournamentEntry<'a>> = Vec::new();
        for m in self.matches.iter().filter(|m| m.involves(player) && filter.accepts(m)) {
            let won_match = m.winner_id == player;
            let idx = match entries.iter().position(|e| {
                e.tourney_id == m.tourney_id
                    && e.tourney_name == m.tourney_name
                    && e.tourney_date == m.tourney_date
            }) {
                Some(idx) => idx,
                None => {
                    entries.push(TournamentEntry {
                        tourney_id: &m.tourney_id,
                        tourney_name: &m.tourney_name,
                        tourney_date: m.tourney_date,
                        tourney_level: &m.tourney_level,
                        surface: &m.surface,
                        wins: 0,
                        losses: 0,
                        last_round: &m.round,
                        won: false,
                    });
                    entries.len() - 1
                }
            };
            let entry = &mut entries[idx];
            if won_match {
                entry.wins += 1;
            } else {
                entry.losses += 1;
            }
            entry.last_round = &m.round;
            entry.won |= won_match && m.is_final();
        }
        entries.sort_by(|a, b| {
            a.tourney_date
                .cmp(&b.tourney_date)
                .then_with(|| a.tourney_name.cmp(b.tourney_name))
        });
        entries
    }

    /// Tournaments `player` won.
    pub fn titles(&self, player: &str, filter: &TournamentFilter) -> Vec<TournamentEntry<'a>> {
        self.tournaments(player, filter).into_iter().filter(|e| e.won).collect()
    }

    /// The player's matches in one tournament, in table order.
    pub fn tournament_run(&self, player: &str, tourney_id: &str) -> Vec<&'a MatchRow> {
        self.matches
            .iter()
            .filter(|m| m.tourney_id == tourney_id && m.involves(player))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
