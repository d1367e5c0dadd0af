//! Charikar's permutation search.
//!
//! See M. Charikar, "Similarity Estimation Techniques from Rounding
//! Algorithms" (2002), section 5. With `N` permutations the paper examines
//! `2N` neighbors per permutation; here both are free parameters, which makes
//! the nearest-neighbor scheme usable for top-k.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{for_each_owner, CandidateStrategy, RunContext, Scorer, Scoring, VisitMarks};
use crate::error::{Error, Result};
use crate::hash::{BitPermutation, PermutationTable, SignatureParams};
use crate::pairs::SimilarPairs;

/// Permutation search parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharikarParams {
    pub signature: SignatureParams,
    /// Number of independent bit permutations.
    pub permutation_count: usize,
    /// Cells examined per cell and permutation, half on each side.
    pub search_count: usize,
    /// Leading permuted bits used as the sort key (at most 64).
    pub permuted_bit_count: usize,
    /// Seed for the permutations.
    pub seed: u64,
    pub scoring: Scoring,
}

impl Default for CharikarParams {
    fn default() -> Self {
        Self {
            signature: SignatureParams::default(),
            permutation_count: 32,
            search_count: 64,
            permuted_bit_count: 64,
            seed: 231,
            scoring: Scoring::Exact,
        }
    }
}

impl CharikarParams {
    pub fn new(permutation_count: usize, search_count: usize) -> Self {
        Self {
            permutation_count,
            search_count,
            ..Self::default()
        }
    }

    pub fn with_signature(mut self, signature: SignatureParams) -> Self {
        self.signature = signature;
        self
    }

    pub fn with_permuted_bit_count(mut self, permuted_bit_count: usize) -> Self {
        self.permuted_bit_count = permuted_bit_count;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_scoring(mut self, scoring: Scoring) -> Self {
        self.scoring = scoring;
        self
    }
}

/// Candidates are the cells adjacent in permuted-signature sort order.
#[derive(Debug, Clone, Default)]
pub struct Charikar {
    params: CharikarParams,
}

impl Charikar {
    pub fn new(params: CharikarParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &CharikarParams {
        &self.params
    }
}

impl CandidateStrategy for Charikar {
    fn name(&self) -> &'static str {
        "charikar"
    }

    fn signature_params(&self) -> Option<SignatureParams> {
        Some(self.params.signature)
    }

    fn validate(&self) -> Result<()> {
        let p = &self.params;
        p.signature.validate()?;
        if p.permutation_count == 0 {
            return Err(Error::InvalidParameter("permutation_count must be >= 1".to_string()));
        }
        if p.search_count < 2 {
            return Err(Error::InvalidParameter(format!(
                "search_count {} must be >= 2",
                p.search_count
            )));
        }
        if p.permuted_bit_count == 0 || p.permuted_bit_count > 64 || p.permuted_bit_count > p.signature.lsh_count {
            return Err(Error::InvalidParameter(format!(
                "permuted_bit_count {} must be in 1..=min(64, lsh_count)",
                p.permuted_bit_count
            )));
        }
        Ok(())
    }

    fn populate(&self, ctx: &RunContext<'_>, store: &mut SimilarPairs) -> Result<()> {
        let p = &self.params;
        let signatures = ctx.require_signatures(self.name())?;
        let permutations = BitPermutation::generate(
            signatures.lsh_count(),
            p.permuted_bit_count,
            p.permutation_count,
            p.seed,
        )?;
        let tables: Vec<PermutationTable> = permutations
            .par_iter()
            .map(|permutation| PermutationTable::build(signatures, permutation))
            .collect();
        debug!(permutations = tables.len(), "built permutation tables");

        let scorer = Scorer::new(p.scoring, ctx, signatures);
        let threshold = ctx.threshold;
        let half_width = p.search_count / 2;
        let n = ctx.cell_count();

        for_each_owner(
            ctx,
            store,
            || VisitMarks::new(n),
            |marks, block, cell0| {
                marks.reset();
                marks.insert(cell0);
                for table in &tables {
                    for cell1 in table.neighbors(cell0, half_width) {
                        if !marks.insert(cell1) {
                            continue;
                        }
                        block.offer(cell0, cell1, scorer.score(cell0, cell1), threshold);
                    }
                }
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation() {
        assert!(Charikar::default().validate().is_ok());
        assert!(Charikar::new(CharikarParams::new(0, 10)).validate().is_err());
        assert!(Charikar::new(CharikarParams::new(4, 1)).validate().is_err());
        let p = CharikarParams::new(4, 10).with_permuted_bit_count(65);
        assert!(Charikar::new(p).validate().is_err());
        let p = CharikarParams::new(4, 10)
            .with_signature(SignatureParams::new(32, 1))
            .with_permuted_bit_count(64);
        assert!(Charikar::new(p).validate().is_err());
    }
}
