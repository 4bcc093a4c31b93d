// Player records, match history and the in-memory lookup over the tour tables.

pub mod history;
pub mod record;
pub mod repository;
