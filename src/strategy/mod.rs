//! Candidate strategies: which cell pairs get scored.
//!
//! | Strategy | Candidates | Score |
//! |---|---|---|
//! | [`Exhaustive`] | all pairs | exact |
//! | [`LshExhaustive`] | all pairs | signature |
//! | [`Banded`] | shared signature-slice buckets | exact or signature |
//! | [`Charikar`] | neighbors in permuted-signature order | exact or signature |
//!
//! All strategies fill the store through owner blocks: each worker owns a
//! contiguous range of cells and only writes their lists, offering every
//! candidate partner at most once per owner. The result after sorting does not
//! depend on the number of threads.

mod banded;
mod charikar;
mod exhaustive;
mod lsh;

pub use banded::{Banded, BandedParams};
pub use charikar::{Charikar, CharikarParams};
pub use exhaustive::Exhaustive;
pub use lsh::LshExhaustive;

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cancel::Cancellation;
use crate::error::{Error, Result};
use crate::hash::{SignatureParams, Signatures};
use crate::ids::CellId;
use crate::pairs::{OwnerBlock, PairsView, SimilarPairs};
use crate::similarity::CellProfiles;

/// Owner cells per parallel work unit.
pub const DEFAULT_BLOCK_SIZE: usize = 16;

/// Everything a strategy reads during a run.
#[derive(Clone, Copy)]
pub struct RunContext<'a> {
    pub profiles: &'a CellProfiles,
    /// Present when the strategy asked for signatures.
    pub signatures: Option<&'a Signatures>,
    /// Pairs scoring below this are never stored.
    pub threshold: f64,
    pub cancellation: &'a Cancellation,
    pub block_size: usize,
}

impl<'a> RunContext<'a> {
    pub fn new(profiles: &'a CellProfiles, cancellation: &'a Cancellation) -> Self {
        Self {
            profiles,
            signatures: None,
            threshold: f64::NEG_INFINITY,
            cancellation,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }

    pub fn with_signatures(mut self, signatures: &'a Signatures) -> Self {
        self.signatures = Some(signatures);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    pub fn cell_count(&self) -> usize {
        self.profiles.cell_count()
    }

    /// Signatures, or an error naming the strategy that needed them.
    pub fn require_signatures(&self, strategy: &str) -> Result<&'a Signatures> {
        let signatures = self.signatures.ok_or_else(|| {
            Error::InvalidParameter(format!("strategy {strategy} requires LSH signatures"))
        })?;
        if signatures.cell_count() != self.cell_count() {
            return Err(Error::InvalidParameter(format!(
                "signatures cover {} cells, profiles cover {}",
                signatures.cell_count(),
                self.cell_count()
            )));
        }
        Ok(signatures)
    }
}

/// How a candidate pair is scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    /// Pearson correlation of the profiles.
    #[default]
    Exact,
    /// Similarity estimated from signature bit agreement.
    Signature,
}

/// Scores pairs under a [`Scoring`] with everything resolved up front.
#[derive(Clone, Copy)]
pub(crate) enum Scorer<'a> {
    Exact(&'a CellProfiles),
    Signature(&'a Signatures),
}

impl<'a> Scorer<'a> {
    pub(crate) fn new(scoring: Scoring, ctx: &RunContext<'a>, signatures: &'a Signatures) -> Self {
        match scoring {
            Scoring::Exact => Scorer::Exact(ctx.profiles),
            Scoring::Signature => Scorer::Signature(signatures),
        }
    }

    #[inline]
    pub(crate) fn score(&self, cell0: CellId, cell1: CellId) -> f64 {
        match self {
            Scorer::Exact(profiles) => profiles.similarity(cell0, cell1),
            Scorer::Signature(signatures) => signatures.similarity(cell0, cell1),
        }
    }
}

/// A way of choosing and scoring candidate pairs.
///
/// Implementations write into `store` through [`SimilarPairs`] owner blocks
/// (see [`for_each_owner`]) and must never store a pair scoring below
/// `ctx.threshold`; [`OwnerBlock::offer`] makes that check on the stored
/// value. The caller sorts the store afterwards.
pub trait CandidateStrategy: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Signatures this strategy needs, if any.
    fn signature_params(&self) -> Option<SignatureParams>;

    /// Check parameters before any work is done.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn populate(&self, ctx: &RunContext<'_>, store: &mut SimilarPairs) -> Result<()>;
}

/// Run `visit` for every owner cell, in parallel over owner blocks, with one
/// `init()` scratch value per worker.
///
/// Cancellation is polled before each owner cell. If it fires before all cells
/// were visited the store is marked incomplete and [`Error::Incomplete`] is
/// returned.
pub fn for_each_owner<S, I, F>(ctx: &RunContext<'_>, store: &mut SimilarPairs, init: I, visit: F) -> Result<()>
where
    I: Fn() -> S + Send + Sync,
    F: Fn(&mut S, &mut OwnerBlock<'_>, CellId) + Send + Sync,
{
    let total = store.cell_set().len();
    let processed = AtomicUsize::new(0);
    let cancellation = ctx.cancellation;

    store
        .par_owner_blocks(ctx.block_size)
        .for_each_init(init, |scratch, mut block| {
            let mut done = 0;
            for cell in block.cells() {
                if cancellation.is_cancelled() {
                    break;
                }
                visit(scratch, &mut block, cell);
                done += 1;
            }
            processed.fetch_add(done, Ordering::Relaxed);
        });

    let processed = processed.into_inner();
    if processed < total {
        warn!(processed, total, "run cancelled before all cells were processed");
        store.mark_incomplete();
        return Err(Error::Incomplete { processed, total });
    }
    Ok(())
}

/// Per-worker "already offered to this owner" marks.
///
/// Stamping with a per-owner generation avoids clearing between owners.
#[derive(Debug, Clone)]
pub(crate) struct VisitMarks {
    stamps: Vec<u32>,
    generation: u32,
}

impl VisitMarks {
    pub(crate) fn new(cell_count: usize) -> Self {
        Self {
            stamps: vec![0; cell_count],
            generation: 0,
        }
    }

    /// Forget all marks.
    pub(crate) fn reset(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if self.generation == 0 {
            self.stamps.fill(0);
            self.generation = 1;
        }
    }

    /// Mark `cell`; true if it was not marked yet.
    #[inline]
    pub(crate) fn insert(&mut self, cell: CellId) -> bool {
        let stamp = &mut self.stamps[cell as usize];
        if *stamp == self.generation {
            false
        } else {
            *stamp = self.generation;
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visit_marks_reset_between_owners() {
        let mut marks = VisitMarks::new(4);
        marks.reset();
        assert!(marks.insert(2));
        assert!(!marks.insert(2));
        marks.reset();
        assert!(marks.insert(2));
    }

    #[test]
    fn visit_marks_survive_generation_wraparound() {
        let mut marks = VisitMarks::new(2);
        marks.generation = u32::MAX;
        marks.stamps[1] = 1;
        marks.reset();
        assert_eq!(marks.generation, 1);
        assert!(marks.insert(1));
    }
}
