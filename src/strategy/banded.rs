//! Banded-bucket LSH: only compare cells that share a signature slice.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{for_each_owner, CandidateStrategy, RunContext, Scorer, Scoring, VisitMarks};
use crate::error::{Error, Result};
use crate::hash::bucket::MAX_LOG2_BUCKET_COUNT;
use crate::hash::{BandTable, SignatureParams};
use crate::ids::CellId;
use crate::pairs::SimilarPairs;

/// Banded search parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandedParams {
    pub signature: SignatureParams,
    /// Slice lengths in bits, strictly decreasing, each 1..=64. Empty picks a
    /// single length of `ceil(log2(cell_count))` bits.
    pub slice_lengths: Vec<usize>,
    /// Buckets with more cells than this are skipped.
    pub bucket_overflow: Option<usize>,
    /// Stop gathering candidates for a cell once this many are collected.
    pub max_check: Option<usize>,
    /// Hash slice values into `2^b` buckets per slice instead of keying on
    /// the raw value.
    pub log2_bucket_count: Option<u32>,
    pub scoring: Scoring,
}

impl Default for BandedParams {
    fn default() -> Self {
        Self {
            signature: SignatureParams::default(),
            slice_lengths: vec![32, 24, 16],
            bucket_overflow: None,
            max_check: Some(1000),
            log2_bucket_count: None,
            scoring: Scoring::Exact,
        }
    }
}

impl BandedParams {
    /// One slice length, no candidate cap, optional overflow cutoff
    /// (`0` = none). A `length` of `0` selects the length automatically.
    pub fn fixed(length: usize, bucket_overflow: usize) -> Self {
        Self {
            slice_lengths: if length == 0 { Vec::new() } else { vec![length] },
            bucket_overflow: (bucket_overflow != 0).then_some(bucket_overflow),
            max_check: None,
            ..Self::default()
        }
    }

    pub fn with_signature(mut self, signature: SignatureParams) -> Self {
        self.signature = signature;
        self
    }

    pub fn with_slice_lengths(mut self, lengths: Vec<usize>) -> Self {
        self.slice_lengths = lengths;
        self
    }

    pub fn with_bucket_overflow(mut self, bucket_overflow: usize) -> Self {
        self.bucket_overflow = Some(bucket_overflow);
        self
    }

    pub fn with_max_check(mut self, max_check: usize) -> Self {
        self.max_check = Some(max_check);
        self
    }

    pub fn with_log2_bucket_count(mut self, log2_bucket_count: u32) -> Self {
        self.log2_bucket_count = Some(log2_bucket_count);
        self
    }

    pub fn with_scoring(mut self, scoring: Scoring) -> Self {
        self.scoring = scoring;
        self
    }

    /// Slice lengths to use for `cell_count` cells.
    pub fn resolved_lengths(&self, cell_count: usize) -> Vec<usize> {
        if !self.slice_lengths.is_empty() {
            return self.slice_lengths.clone();
        }
        let bits = usize::BITS - cell_count.max(2).saturating_sub(1).leading_zeros();
        vec![(bits as usize).clamp(1, 64).min(self.signature.lsh_count.max(1))]
    }
}

/// Banded-bucket LSH candidate generation.
///
/// For every slice length (longest first) and every slice, a cell's
/// candidates are the other cells in its bucket. Gathering stops at
/// `max_check` candidates; oversized buckets are skipped entirely.
#[derive(Debug, Clone, Default)]
pub struct Banded {
    params: BandedParams,
}

impl Banded {
    pub fn new(params: BandedParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &BandedParams {
        &self.params
    }
}

impl CandidateStrategy for Banded {
    fn name(&self) -> &'static str {
        "banded"
    }

    fn signature_params(&self) -> Option<SignatureParams> {
        Some(self.params.signature)
    }

    fn validate(&self) -> Result<()> {
        let p = &self.params;
        p.signature.validate()?;
        if !p.slice_lengths.is_empty() {
            BandTable::validate(&p.slice_lengths, p.signature.lsh_count, p.log2_bucket_count)?;
        } else if p.log2_bucket_count.is_some_and(|b| b > MAX_LOG2_BUCKET_COUNT) {
            return Err(Error::InvalidParameter(format!(
                "log2_bucket_count must be <= {MAX_LOG2_BUCKET_COUNT}"
            )));
        }
        if p.max_check == Some(0) {
            return Err(Error::InvalidParameter("max_check must be >= 1".to_string()));
        }
        if p.bucket_overflow == Some(0) {
            return Err(Error::InvalidParameter("bucket_overflow must be >= 1".to_string()));
        }
        Ok(())
    }

    fn populate(&self, ctx: &RunContext<'_>, store: &mut SimilarPairs) -> Result<()> {
        let signatures = ctx.require_signatures(self.name())?;
        let n = ctx.cell_count();
        let lengths = self.params.resolved_lengths(n);
        let table = BandTable::build(signatures, &lengths, self.params.log2_bucket_count)?;
        debug!(
            lengths = ?table.lengths(),
            slices = table.slice_count(),
            "built LSH band tables"
        );

        let scorer = Scorer::new(self.params.scoring, ctx, signatures);
        let threshold = ctx.threshold;
        let overflow = self.params.bucket_overflow.unwrap_or(usize::MAX);
        let max_check = self.params.max_check.unwrap_or(usize::MAX);
        let skipped = AtomicUsize::new(0);

        let result = for_each_owner(
            ctx,
            store,
            || (VisitMarks::new(n), Vec::<CellId>::new()),
            |(marks, candidates), block, cell0| {
                marks.reset();
                marks.insert(cell0);
                candidates.clear();

                'gather: for (_, slices) in table.groups() {
                    for slice in slices {
                        let bucket = slice.bucket_of(signatures, cell0);
                        if bucket.len() > overflow {
                            skipped.fetch_add(1, Ordering::Relaxed);
                            continue;
                        }
                        for &cell1 in bucket {
                            if marks.insert(cell1) {
                                candidates.push(cell1);
                                if candidates.len() >= max_check {
                                    break 'gather;
                                }
                            }
                        }
                    }
                }

                for &cell1 in candidates.iter() {
                    block.offer(cell0, cell1, scorer.score(cell0, cell1), threshold);
                }
            },
        );

        let skipped = skipped.into_inner();
        if skipped > 0 {
            warn!(skipped, bucket_overflow = overflow, "skipped oversized LSH buckets");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_maps_zero_to_none() {
        let p = BandedParams::fixed(0, 0);
        assert!(p.slice_lengths.is_empty());
        assert_eq!(p.bucket_overflow, None);
        assert_eq!(p.max_check, None);
        let p = BandedParams::fixed(20, 50);
        assert_eq!(p.slice_lengths, vec![20]);
        assert_eq!(p.bucket_overflow, Some(50));
    }

    #[test]
    fn automatic_length_grows_with_cell_count() {
        let p = BandedParams::fixed(0, 0);
        assert_eq!(p.resolved_lengths(2), vec![1]);
        assert_eq!(p.resolved_lengths(1000), vec![10]);
        assert_eq!(p.resolved_lengths(1024), vec![10]);
        assert_eq!(p.resolved_lengths(1025), vec![11]);
    }

    #[test]
    fn validation() {
        assert!(Banded::default().validate().is_ok());
        let bad = BandedParams::default().with_slice_lengths(vec![16, 32]);
        assert!(Banded::new(bad).validate().is_err());
        let bad = BandedParams::default().with_max_check(0);
        assert!(Banded::new(bad).validate().is_err());
    }
}
