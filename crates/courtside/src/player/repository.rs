// In-memory player lookup, partitioned by tour.

use crate::cohort::Cohort;
use crate::dataset::TennisDataset;
use crate::player::record::{PlayerRecord, Sex};
use std::collections::HashMap;
use tracing::warn;

/// Typed player lookup consumed by sampling and classification.
///
/// Every method returns an owned record, or `None` when nothing matches.
pub trait PlayerLookup {
    /// Find by identifier in the tour tables of `cohort`, in lookup order.
    fn find_in(&self, cohort: Cohort, id: &str) -> Option<PlayerRecord>;

    /// Find by identifier in any table, men's first.
    fn find(&self, id: &str) -> Option<PlayerRecord> {
        self.find_in(Cohort::Mixed, id)
    }

    /// Exact, case-sensitive (first, last) match; men's table first.
    fn find_by_name(&self, first: &str, last: &str) -> Option<PlayerRecord>;
}

// ---------------------------------------------------------------------------
// PlayerTable
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct PlayerTable<'a> {
    records: &'a [PlayerRecord],
    by_id: HashMap<&'a str, usize>,
}

impl<'a> PlayerTable<'a> {
    fn new(records: &'a [PlayerRecord]) -> Self {
        let mut by_id = HashMap::with_capacity(records.len());
        for (idx, record) in records.iter().enumerate() {
            if by_id.contains_key(record.id.as_str()) {
                warn!("duplicate player id '{}', keeping first row", record.id);
                continue;
            }
            by_id.insert(record.id.as_str(), idx);
        }
        PlayerTable { records, by_id }
    }

    fn get(&self, id: &str) -> Option<&'a PlayerRecord> {
        self.by_id.get(id).map(|&idx| &self.records[idx])
    }

    fn by_name(&self, first: &str, last: &str) -> Option<&'a PlayerRecord> {
        self.records
            .iter()
            .find(|r| r.last_name == last && r.first_name == first)
    }
}

// ---------------------------------------------------------------------------
// PlayerRepository
// ---------------------------------------------------------------------------

/// Both tour tables, borrowed from the loaded dataset and never mutated.
#[derive(Debug, Clone, Default)]
pub struct PlayerRepository<'a> {
    male: PlayerTable<'a>,
    female: PlayerTable<'a>,
}

impl<'a> PlayerRepository<'a> {
    pub fn new(male: &'a [PlayerRecord], female: &'a [PlayerRecord]) -> Self {
        PlayerRepository {
            male: PlayerTable::new(male),
            female: PlayerTable::new(female),
        }
    }

    pub fn from_dataset(dataset: &'a TennisDataset) -> Self {
        Self::new(&dataset.male_players, &dataset.female_players)
    }

    fn table(&self, sex: Sex) -> &PlayerTable<'a> {
        match sex {
            Sex::Male => &self.male,
            Sex::Female => &self.female,
        }
    }

    /// All rows of one tour table, in file order.
    pub fn players(&self, sex: Sex) -> &'a [PlayerRecord] {
        self.table(sex).records
    }

    pub fn len(&self) -> usize {
        self.male.records.len() + self.female.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PlayerLookup for PlayerRepository<'_> {
    fn find_in(&self, cohort: Cohort, id: &str) -> Option<PlayerRecord> {
        cohort
            .sexes()
            .iter()
            .find_map(|sex| self.table(*sex).get(id))
            .cloned()
    }

    // Identical names across tours resolve to the men's row.
    fn find_by_name(&self, first: &str, last: &str) -> Option<PlayerRecord> {
        self.male
            .by_name(first, last)
            .or_else(|| self.female.by_name(first, last))
            .cloned()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::record::tests::sample_record;

    fn female(id: &str, first: &str, last: &str) -> PlayerRecord {
        PlayerRecord {
            sex: Sex::Female,
            ..sample_record(id, first, last)
        }
    }

    fn tables() -> (Vec<PlayerRecord>, Vec<PlayerRecord>) {
        (
            vec![
                sample_record("1", "Rafael", "Nadal"),
                sample_record("2", "Alex", "Smith"),
            ],
            vec![
                female("201", "Iga", "Swiatek"),
                female("202", "Alex", "Smith"),
                female("2", "Shadowed", "Id"),
            ],
        )
    }

    #[test]
    fn find_by_id_tries_male_then_female() {
        let (male, female) = tables();
        let repo = PlayerRepository::new(&male, &female);
        assert_eq!(repo.find("1").unwrap().last_name, "Nadal");
        assert_eq!(repo.find("201").unwrap().sex, Sex::Female);
        // Same id in both tables: men's row wins.
        assert_eq!(repo.find("2").unwrap().first_name, "Alex");
        assert!(repo.find("999").is_none());
    }

    #[test]
    fn cohort_restricts_partitions() {
        let (male, female) = tables();
        let repo = PlayerRepository::new(&male, &female);
        assert!(repo.find_in(Cohort::Male, "201").is_none());
        assert_eq!(repo.find_in(Cohort::Female, "2").unwrap().first_name, "Shadowed");
        assert!(repo.find_in(Cohort::Female, "1").is_none());
    }

    #[test]
    fn find_by_name_is_exact_and_male_first() {
        let (male, female) = tables();
        let repo = PlayerRepository::new(&male, &female);
        let smith = repo.find_by_name("Alex", "Smith").unwrap();
        assert_eq!(smith.sex, Sex::Male);
        assert_eq!(smith.id, "2");

        let iga = repo.find_by_name("Iga", "Swiatek").unwrap();
        assert_eq!(iga.id, "201");

        assert!(repo.find_by_name("iga", "swiatek").is_none());
        assert!(repo.find_by_name("Swiatek", "Iga").is_none());
    }

    #[test]
    fn duplicate_ids_keep_first_row() {
        let male = vec![sample_record("7", "First", "Row"), sample_record("7", "Second", "Row")];
        let repo = PlayerRepository::new(&male, &[]);
        assert_eq!(repo.find("7").unwrap().first_name, "First");
        assert_eq!(repo.len(), 2);
        assert_eq!(repo.players(Sex::Female).len(), 0);
    }

    #[test]
    fn repository_borrows_dataset_tables() {
        let data = TennisDataset {
            male_players: vec![sample_record("1", "Rafael", "Nadal")],
            female_players: vec![female("201", "Iga", "Swiatek")],
            ..TennisDataset::default()
        };
        let repo = PlayerRepository::from_dataset(&data);
        assert!(std::ptr::eq(repo.players(Sex::Male), data.male_players.as_slice()));
        assert!(std::ptr::eq(repo.players(Sex::Female), data.female_players.as_slice()));
        assert_eq!(repo.find("201").unwrap().last_name, "Swiatek");
    }
}
