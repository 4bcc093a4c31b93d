// Library root: re-exports all modules so integration tests and the batch
// runner can access the crate's public API.

pub mod clustering;
pub mod cohort;
pub mod config;
pub mod dataset;
pub mod export;
pub mod player;
pub mod session;
