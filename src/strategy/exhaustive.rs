//! Exact all-pairs search.

use super::{for_each_owner, CandidateStrategy, RunContext};
use crate::error::Result;
use crate::hash::SignatureParams;
use crate::ids::CellId;
use crate::pairs::SimilarPairs;

/// Score every pair of distinct cells with the exact correlation.
///
/// O(n² · nnz). The baseline every approximate strategy is measured against.
///
/// Every unordered pair is scored twice, once from each owner. That doubles
/// the scoring work but lets each worker write only the lists it owns, with
/// no locks and no second pass for mirror insertions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Exhaustive;

impl CandidateStrategy for Exhaustive {
    fn name(&self) -> &'static str {
        "exhaustive"
    }

    fn signature_params(&self) -> Option<SignatureParams> {
        None
    }

    fn populate(&self, ctx: &RunContext<'_>, store: &mut SimilarPairs) -> Result<()> {
        let profiles = ctx.profiles;
        let n = ctx.cell_count() as CellId;
        let threshold = ctx.threshold;
        for_each_owner(
            ctx,
            store,
            || (),
            |_, block, cell0| {
                for cell1 in (0..n).filter(|&c| c != cell0) {
                    block.offer(cell0, cell1, profiles.similarity(cell0, cell1), threshold);
                }
            },
        )
    }
}
