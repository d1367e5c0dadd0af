//! All pairs, scored from signatures.

use super::{for_each_owner, CandidateStrategy, RunContext};
use crate::error::Result;
use crate::hash::SignatureParams;
use crate::ids::CellId;
use crate::pairs::SimilarPairs;

/// Score every pair of distinct cells by signature bit agreement.
///
/// Still O(n²) pairs, but each costs `lsh_count / 64` XOR-popcounts instead of
/// a sparse merge. As with [`Exhaustive`](super::Exhaustive), each unordered
/// pair is scored once per owner.
#[derive(Debug, Clone, Copy, Default)]
pub struct LshExhaustive {
    pub signature: SignatureParams,
}

impl LshExhaustive {
    pub fn new(signature: SignatureParams) -> Self {
        Self { signature }
    }
}

impl CandidateStrategy for LshExhaustive {
    fn name(&self) -> &'static str {
        "lsh_exhaustive"
    }

    fn signature_params(&self) -> Option<SignatureParams> {
        Some(self.signature)
    }

    fn validate(&self) -> Result<()> {
        self.signature.validate()
    }

    fn populate(&self, ctx: &RunContext<'_>, store: &mut SimilarPairs) -> Result<()> {
        let signatures = ctx.require_signatures(self.name())?;
        let n = ctx.cell_count() as CellId;
        let threshold = ctx.threshold;
        for_each_owner(
            ctx,
            store,
            || (),
            |_, block, cell0| {
                for cell1 in (0..n).filter(|&c| c != cell0) {
                    block.offer(cell0, cell1, signatures.similarity(cell0, cell1), threshold);
                }
            },
        )
    }
}
