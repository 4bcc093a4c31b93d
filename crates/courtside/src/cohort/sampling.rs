// Randomized batched rejection sampling of valid players from a candidate pool.
//
// The sampler never retries an identifier: every attempt either yields a
// valid record or is discarded for good. Each step consumes at least one
// un-attempted identifier, so the loop ends after at most `pool.len()`
// attempts with either the full quota or an exhausted pool.

use crate::cohort::pool::CandidatePool;
use crate::cohort::Cohort;
use crate::player::record::PlayerRecord;
use crate::player::repository::PlayerLookup;
use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::HashSet;
use tracing::debug;

/// Identifiers resolved per batch when no other size is configured.
pub const DEFAULT_BATCH_SIZE: usize = 50;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// How a sampling run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleStatus {
    /// The requested number of valid players was collected.
    Complete,
    /// Every identifier was attempted before the quota was met.
    PoolExhausted,
}

/// Identifiers discarded during sampling, by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rejections {
    /// No row for the identifier in the cohort's tables.
    pub not_found: usize,
    /// A row exists but lacks required statistics.
    pub invalid: usize,
}

impl Rejections {
    pub fn total(&self) -> usize {
        self.not_found + self.invalid
    }
}

/// The outcome of one sampling run.
#[derive(Debug, Clone)]
pub struct Sample {
    pub players: Vec<PlayerRecord>,
    pub requested: usize,
    pub attempted: usize,
    pub rejections: Rejections,
    pub status: SampleStatus,
}

impl Sample {
    pub fn is_complete(&self) -> bool {
        self.status == SampleStatus::Complete
    }

    /// How many players short of the request the sample is.
    pub fn shortfall(&self) -> usize {
        self.requested.saturating_sub(self.players.len())
    }
}

// ---------------------------------------------------------------------------
// Accumulator
// ---------------------------------------------------------------------------

/// Everything a sampling run has seen so far. Threaded by value through
/// [`SamplingEngine::step`].
#[derive(Debug, Clone, Default)]
pub struct SamplingState {
    attempted: HashSet<String>,
    accepted: Vec<PlayerRecord>,
    rejections: Rejections,
}

impl SamplingState {
    pub fn accepted(&self) -> &[PlayerRecord] {
        &self.accepted
    }

    pub fn attempted(&self) -> usize {
        self.attempted.len()
    }

    pub fn was_attempted(&self, id: &str) -> bool {
        self.attempted.contains(id)
    }

    fn finish(self, requested: usize, status: SampleStatus) -> Sample {
        Sample {
            attempted: self.attempted.len(),
            players: self.accepted,
            requested,
            rejections: self.rejections,
            status,
        }
    }
}

/// Result of a single sampling step.
#[derive(Debug)]
pub enum Step {
    Continue(SamplingState),
    Done(Sample),
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Draws valid players from a pool through a [`PlayerLookup`].
pub struct SamplingEngine<'a, L: PlayerLookup + ?Sized> {
    lookup: &'a L,
    batch_size: usize,
}

impl<'a, L: PlayerLookup + ?Sized> SamplingEngine<'a, L> {
    /// A batch size of zero is treated as one.
    pub fn new(lookup: &'a L, batch_size: usize) -> Self {
        SamplingEngine {
            lookup,
            batch_size: batch_size.max(1),
        }
    }

    /// Sample up to `target` valid players of `cohort` from `pool`.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        pool: &CandidatePool,
        cohort: Cohort,
        target: usize,
        rng: &mut R,
    ) -> Sample {
        let mut state = SamplingState::default();
        loop {
            match self.step(state, pool, cohort, target, rng) {
                Step::Continue(next) => state = next,
                Step::Done(sample) => return sample,
            }
        }
    }

    /// Resolve one batch of un-attempted identifiers.
    ///
    /// Batch size is `min(batch_size, un-attempted ids, remaining quota)`.
    pub fn step<R: Rng + ?Sized>(
        &self,
        mut state: SamplingState,
        pool: &CandidatePool,
        cohort: Cohort,
        target: usize,
        rng: &mut R,
    ) -> Step {
        if state.accepted.len() >= target {
            return Step::Done(state.finish(target, SampleStatus::Complete));
        }

        let remaining: Vec<&String> = pool.iter().filter(|id| !state.was_attempted(id)).collect();
        if remaining.is_empty() {
            return Step::Done(state.finish(target, SampleStatus::PoolExhausted));
        }

        let quota = target - state.accepted.len();
        let batch_len = self.batch_size.min(remaining.len()).min(quota);
        let batch: Vec<String> = remaining
            .choose_multiple(rng, batch_len)
            .map(|id| (*id).clone())
            .collect();

        let before = state.accepted.len();
        for id in batch {
            let resolved = self.lookup.find_in(cohort, &id);
            state.attempted.insert(id);
            match resolved {
                None => state.rejections.not_found += 1,
                Some(record) if !record.is_valid_for_clustering() => state.rejections.invalid += 1,
                Some(record) => state.accepted.push(record),
            }
        }

        debug!(
            "sampling batch of {}: {} accepted, {}/{} collected, {} ids left",
            batch_len,
            state.accepted.len() - before,
            state.accepted.len(),
            target,
            remaining.len() - batch_len
        );

        Step::Continue(state)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
