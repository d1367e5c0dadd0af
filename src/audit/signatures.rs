//! How faithful and how diverse LSH signatures are.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use super::metrics::{ErrorAccumulator, ErrorStats};
use crate::error::{Error, Result};
use crate::hash::Signatures;
use crate::ids::CellId;
use crate::similarity::CellProfiles;

/// Which pairs a signature accuracy audit looks at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairSampling {
    /// Fraction of pairs kept, in `(0, 1]`.
    pub fraction: f64,
    pub seed: u64,
}

impl Default for PairSampling {
    fn default() -> Self {
        Self {
            fraction: 1.0,
            seed: 231,
        }
    }
}

impl PairSampling {
    pub fn all() -> Self {
        Self::default()
    }

    /// Keep each pair with probability `fraction`. Which pairs are kept only
    /// depends on `seed`, not on the thread count.
    pub fn downsample(fraction: f64, seed: u64) -> Self {
        Self {
            fraction: fraction.clamp(0.0, 1.0),
            seed,
        }
    }

    /// Generator for the pairs owned by `cell`.
    pub(crate) fn row_rng(&self, cell: CellId) -> StdRng {
        StdRng::seed_from_u64(self.seed ^ u64::from(cell).wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }

    #[inline]
    pub(crate) fn keep(&self, rng: &mut StdRng) -> bool {
        self.fraction >= 1.0 || rng.random::<f64>() < self.fraction
    }
}

/// Error of signature-estimated similarities against exact similarities,
/// over the unordered cell pairs selected by `sampling`.
///
/// Errors are `estimated - exact`. Runs on the current rayon pool.
pub fn signature_accuracy(profiles: &CellProfiles, signatures: &Signatures, sampling: PairSampling) -> Result<ErrorStats> {
    if profiles.cell_count() != signatures.cell_count() || profiles.gene_count() != signatures.gene_count() {
        return Err(Error::SubsetMismatch(format!(
            "profiles are {} cells x {} genes, signatures {} x {}",
            profiles.cell_count(),
            profiles.gene_count(),
            signatures.cell_count(),
            signatures.gene_count()
        )));
    }
    let n = profiles.cell_count() as CellId;
    Ok((0..n)
        .into_par_iter()
        .map(|cell0| {
            let mut acc = ErrorAccumulator::new();
            let mut rng = sampling.row_rng(cell0);
            for cell1 in cell0 + 1..n {
                if !sampling.keep(&mut rng) {
                    continue;
                }
                let exact = profiles.similarity(cell0, cell1);
                acc.push(signatures.similarity(cell0, cell1) - exact);
            }
            acc
        })
        .reduce(ErrorAccumulator::new, ErrorAccumulator::merge)
        .finish())
}

/// Bit statistics of a signature set.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureSummary {
    /// For every bit, the fraction of cells with that bit set.
    pub one_frequency: Vec<f64>,
    /// Number of distinct signatures.
    pub distinct_signatures: usize,
}

pub fn inspect_signatures(signatures: &Signatures) -> SignatureSummary {
    let n = signatures.cell_count();
    let bits = signatures.lsh_count();
    let mut ones = vec![0usize; bits];
    let mut distinct: HashSet<&[u64]> = HashSet::new();
    for cell in 0..n as CellId {
        for (i, count) in ones.iter_mut().enumerate() {
            if signatures.bit(cell, i) {
                *count += 1;
            }
        }
        distinct.insert(signatures.signature(cell));
    }
    let one_frequency = ones
        .into_iter()
        .map(|c| if n == 0 { 0.0 } else { c as f64 / n as f64 })
        .collect();
    SignatureSummary {
        one_frequency,
        distinct_signatures: distinct.len(),
    }
}
