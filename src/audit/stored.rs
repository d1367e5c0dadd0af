//! Accuracy of the similarities stored in a populated set of pairs.
//!
//! Unlike [`compare`](super::compare), this needs no exact reference run: the
//! exact similarity of every stored pair is recomputed from the profiles.
//! Stores scored by signatures show their estimation error here; exactly
//! scored stores should be at `f32` rounding.

use rayon::prelude::*;
use tracing::debug;

use super::metrics::{ErrorAccumulator, ErrorStats};
use super::signatures::PairSampling;
use crate::error::{Error, Result};
use crate::ids::CellId;
use crate::pairs::PairsView;
use crate::similarity::CellProfiles;

/// Error of stored similarities against exact similarities, over the stored
/// pairs selected by `sampling`.
///
/// `profiles` must be loaded for the same gene set and cell set as `pairs`.
/// Errors are `stored - exact`. Runs on the current rayon pool.
pub fn stored_pair_accuracy<V>(pairs: &V, profiles: &CellProfiles, sampling: PairSampling) -> Result<ErrorStats>
where
    V: PairsView + Sync + ?Sized,
{
    if profiles.cell_count() != pairs.cell_count() || profiles.gene_count() != pairs.gene_set().len() {
        return Err(Error::SubsetMismatch(format!(
            "profiles are {} cells x {} genes, similar pairs {} x {}",
            profiles.cell_count(),
            profiles.gene_count(),
            pairs.cell_count(),
            pairs.gene_set().len()
        )));
    }

    let stats = (0..pairs.cell_count() as CellId)
        .into_par_iter()
        .map(|cell0| {
            let mut acc = ErrorAccumulator::new();
            let mut rng = sampling.row_rng(cell0);
            for pair in pairs.pairs(cell0).iter() {
                if sampling.keep(&mut rng) {
                    acc.push(f64::from(pair.similarity) - profiles.similarity(cell0, pair.cell_id));
                }
            }
            acc
        })
        .reduce(ErrorAccumulator::new, ErrorAccumulator::merge)
        .finish();
    debug!(pairs = stats.count, rms = stats.rms, max_abs = stats.max_abs, "audited stored similarities");
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{CellSet, GeneSet};
    use crate::pairs::{AdmissionPolicy, SimilarPairs};
    use crate::similarity::SparseProfile;

    fn profiles() -> CellProfiles {
        CellProfiles::from_profiles(
            3,
            vec![
                SparseProfile::new(&[(0, 1.0), (2, 2.0)]),
                SparseProfile::new(&[(0, 2.0), (2, 4.0)]),
                SparseProfile::new(&[(1, 3.0)]),
            ],
        )
    }

    #[test]
    fn measures_stored_minus_exact() {
        let p = profiles();
        let mut s = SimilarPairs::new(2, GeneSet::full(3), CellSet::full(3), AdmissionPolicy::LinearScan).unwrap();
        s.add_unsymmetric(0, 1, 0.75);
        s.add_unsymmetric(1, 0, p.similarity(1, 0));
        s.add_unsymmetric(2, 0, p.similarity(2, 0) + 0.5);
        s.sort();

        let stats = stored_pair_accuracy(&s, &p, PairSampling::all()).unwrap();
        assert_eq!(stats.count, 3);
        assert!((stats.max_abs - 0.5).abs() < 1e-6);
        assert!((stats.mean - (0.75 - 1.0 + 0.5) / 3.0).abs() < 1e-6);
    }

    #[test]
    fn other_cell_set_is_rejected() {
        let mut s = SimilarPairs::new(2, GeneSet::full(3), CellSet::full(4), AdmissionPolicy::LinearScan).unwrap();
        s.sort();
        let err = stored_pair_accuracy(&s, &profiles(), PairSampling::all());
        assert!(matches!(err, Err(Error::SubsetMismatch(_))));
    }
}
