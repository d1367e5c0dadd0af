//! Cell similarity: Pearson correlation of sparse expression profiles.
//!
//! ## Important nuance
//!
//! The correlation is computed over *every* gene in the gene set, with missing
//! genes counting as zero expression. Only the cross term `Σxy` depends on
//! both cells, so per-cell sums are precomputed once ([`SparseProfile`]) and
//! each pair costs a single merge of the two nonzero lists.
//!
//! ```text
//! r = (nΣxy − ΣxΣy) / sqrt((nΣx² − (Σx)²)(nΣy² − (Σy)²))
//! ```
//!
//! A cell with zero variance has no defined correlation; it is reported as
//! similarity `0.0` with every other cell.

use rayon::prelude::*;

use crate::ids::{CellId, CellSet, GeneId, GeneSet};
use crate::sparse::SparseVectorView;

/// Similarity assigned when either profile has zero variance.
pub const DEGENERATE_SIMILARITY: f64 = 0.0;

/// Nonzero expression of one cell over a gene set, plus its moments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseProfile {
    genes: Vec<GeneId>,
    values: Vec<f32>,
    sum: f64,
    sum_sq: f64,
}

impl SparseProfile {
    /// Build from `(local gene, value)` entries sorted by gene.
    pub fn new(entries: &[(GeneId, f32)]) -> Self {
        debug_assert!(entries.windows(2).all(|w| w[0].0 < w[1].0));
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        for &(_, v) in entries {
            let v = f64::from(v);
            sum += v;
            sum_sq += v * v;
        }
        Self {
            genes: entries.iter().map(|&(g, _)| g).collect(),
            values: entries.iter().map(|&(_, v)| v).collect(),
            sum,
            sum_sq,
        }
    }

    pub fn genes(&self) -> &[GeneId] {
        &self.genes
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn sum_sq(&self) -> f64 {
        self.sum_sq
    }

    pub fn nnz(&self) -> usize {
        self.genes.len()
    }

    /// `Σ a_g b_g` over the shared nonzero genes.
    #[inline]
    pub fn dot(&self, other: &SparseProfile) -> f64 {
        let (a_g, a_v) = (&self.genes, &self.values);
        let (b_g, b_v) = (&other.genes, &other.values);
        let (mut i, mut j) = (0, 0);
        let mut acc = 0.0f64;
        while i < a_g.len() && j < b_g.len() {
            let (ga, gb) = (a_g[i], b_g[j]);
            if ga < gb {
                i += 1;
            } else if gb < ga {
                j += 1;
            } else {
                acc += f64::from(a_v[i]) * f64::from(b_v[j]);
                i += 1;
                j += 1;
            }
        }
        acc
    }
}

/// Pearson correlation of two profiles over a gene set of `gene_count` genes.
#[inline]
#[must_use]
pub fn correlation(a: &SparseProfile, b: &SparseProfile, gene_count: usize) -> f64 {
    let n = gene_count as f64;
    let numerator = n * a.dot(b) - a.sum * b.sum;
    let var_a = n * a.sum_sq - a.sum * a.sum;
    let var_b = n * b.sum_sq - b.sum * b.sum;
    let denominator = (var_a * var_b).sqrt();
    if !(denominator > 0.0) || !numerator.is_finite() || !denominator.is_finite() {
        return DEGENERATE_SIMILARITY;
    }
    (numerator / denominator).clamp(-1.0, 1.0)
}

/// Pearson correlation of two dense vectors of equal length.
///
/// Reference implementation used to cross-check the sparse path.
#[must_use]
pub fn dense_correlation(a: &[f32], b: &[f32]) -> f64 {
    assert_eq!(a.len(), b.len(), "dense vectors must have equal length");
    let n = a.len() as f64;
    if a.is_empty() {
        return DEGENERATE_SIMILARITY;
    }
    let mean_a = a.iter().map(|&x| f64::from(x)).sum::<f64>() / n;
    let mean_b = b.iter().map(|&x| f64::from(x)).sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (&x, &y) in a.iter().zip(b) {
        let dx = f64::from(x) - mean_a;
        let dy = f64::from(y) - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    let denominator = (var_a * var_b).sqrt();
    if !(denominator > 0.0) {
        return DEGENERATE_SIMILARITY;
    }
    (cov / denominator).clamp(-1.0, 1.0)
}

/// Profiles of every cell in a cell set, indexed by local cell id.
#[derive(Debug, Clone)]
pub struct CellProfiles {
    gene_count: usize,
    profiles: Vec<SparseProfile>,
}

impl CellProfiles {
    /// Load the profiles of `cells` restricted to `genes` from a view.
    ///
    /// Runs on the current rayon pool.
    pub fn build<V: SparseVectorView + ?Sized>(view: &V, genes: &GeneSet, cells: &CellSet) -> Self {
        let profiles = cells
            .as_slice()
            .par_iter()
            .map_init(Vec::new, |scratch, &cell| {
                view.sparse_vector(cell, genes, scratch);
                SparseProfile::new(scratch)
            })
            .collect();
        Self {
            gene_count: genes.len(),
            profiles,
        }
    }

    /// Wrap already computed profiles.
    pub fn from_profiles(gene_count: usize, profiles: Vec<SparseProfile>) -> Self {
        Self {
            gene_count,
            profiles,
        }
    }

    pub fn gene_count(&self) -> usize {
        self.gene_count
    }

    pub fn cell_count(&self) -> usize {
        self.profiles.len()
    }

    pub fn get(&self, cell: CellId) -> &SparseProfile {
        &self.profiles[cell as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = &SparseProfile> {
        self.profiles.iter()
    }

    pub fn as_slice(&self) -> &[SparseProfile] {
        &self.profiles
    }

    /// Exact similarity of two local cells.
    #[inline]
    pub fn similarity(&self, cell0: CellId, cell1: CellId) -> f64 {
        correlation(self.get(cell0), self.get(cell1), self.gene_count)
    }

    /// Mean nonzero count per cell.
    pub fn mean_density(&self) -> f64 {
        if self.profiles.is_empty() {
            return 0.0;
        }
        self.profiles.iter().map(|p| p.nnz() as f64).sum::<f64>() / self.profiles.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sparse(dense: &[f32]) -> SparseProfile {
        let entries: Vec<(GeneId, f32)> = dense
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v != 0.0)
            .map(|(g, &v)| (g as GeneId, v))
            .collect();
        SparseProfile::new(&entries)
    }

    #[test]
    fn sparse_matches_dense() {
        let a = [0.0f32, 3.0, 0.0, 1.0, 5.0, 0.0, 2.0];
        let b = [1.0f32, 0.0, 0.0, 2.0, 4.0, 0.0, 0.0];
        let exact = dense_correlation(&a, &b);
        let fast = correlation(&sparse(&a), &sparse(&b), a.len());
        assert!((exact - fast).abs() < 1e-9, "{exact} vs {fast}");
    }

    #[test]
    fn identical_profiles_correlate_perfectly() {
        let a = [1.0f32, 0.0, 2.0, 7.0];
        let p = sparse(&a);
        assert!((correlation(&p, &p, a.len()) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn scaled_and_shifted_are_equivalent() {
        let a = [1.0f32, 2.0, 3.0, 4.0];
        let b = [12.0f32, 14.0, 16.0, 18.0];
        assert!((correlation(&sparse(&a), &sparse(&b), 4) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn zero_variance_is_degenerate() {
        let flat = sparse(&[2.0, 2.0, 2.0]);
        let empty = sparse(&[0.0, 0.0, 0.0]);
        let other = sparse(&[1.0, 0.0, 3.0]);
        assert_eq!(correlation(&flat, &other, 3), DEGENERATE_SIMILARITY);
        assert_eq!(correlation(&empty, &other, 3), DEGENERATE_SIMILARITY);
        assert_eq!(dense_correlation(&[2.0, 2.0], &[1.0, 3.0]), DEGENERATE_SIMILARITY);
    }
}
