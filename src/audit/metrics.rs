//! Quality metrics for approximate similar pairs.

use std::collections::HashSet;

use crate::ids::CellId;

/// Compute recall@k: fraction of the true top-k partners that were found.
///
/// recall@k = |found ∩ truth| / min(k, |truth|)
///
/// Only the first `k` entries of each list count. Returns 0.0 if `k` is 0 or
/// `truth` is empty.
pub fn recall_at_k(truth: &[CellId], found: &[CellId], k: usize) -> f64 {
    let wanted = k.min(truth.len());
    if wanted == 0 {
        return 0.0;
    }

    let truth_set: HashSet<CellId> = truth.iter().take(k).copied().collect();
    let hits = found
        .iter()
        .take(k)
        .collect::<HashSet<_>>()
        .into_iter()
        .filter(|id| truth_set.contains(*id))
        .count();
    hits as f64 / wanted as f64
}

/// Mean recall over several lists. Pairs of lists with an empty truth are
/// skipped; with nothing left to evaluate the recall is `1.0`, matching
/// [`compare`](super::compare).
pub fn mean_recall(truths: &[Vec<CellId>], found: &[Vec<CellId>], k: usize) -> f64 {
    let recalls: Vec<f64> = truths
        .iter()
        .zip(found)
        .filter(|(t, _)| !t.is_empty())
        .map(|(t, f)| recall_at_k(t, f, k))
        .collect();
    if recalls.is_empty() {
        return 1.0;
    }
    recalls.iter().sum::<f64>() / recalls.len() as f64
}

/// Summary of a set of signed errors.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ErrorStats {
    pub count: usize,
    /// Mean signed error.
    pub mean: f64,
    /// Root mean square error.
    pub rms: f64,
    /// Largest absolute error.
    pub max_abs: f64,
}

/// Streaming accumulator for [`ErrorStats`]. Accumulators can be merged, so
/// parallel workers can each keep one.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorAccumulator {
    count: usize,
    sum: f64,
    sum_sq: f64,
    max_abs: f64,
}

impl ErrorAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, error: f64) {
        self.count += 1;
        self.sum += error;
        self.sum_sq += error * error;
        self.max_abs = self.max_abs.max(error.abs());
    }

    pub fn merge(mut self, other: Self) -> Self {
        self.count += other.count;
        self.sum += other.sum;
        self.sum_sq += other.sum_sq;
        self.max_abs = self.max_abs.max(other.max_abs);
        self
    }

    pub fn finish(&self) -> ErrorStats {
        if self.count == 0 {
            return ErrorStats::default();
        }
        let n = self.count as f64;
        ErrorStats {
            count: self.count,
            mean: self.sum / n,
            rms: (self.sum_sq / n).sqrt(),
            max_abs: self.max_abs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recall_counts_hits_within_k() {
        assert_eq!(recall_at_k(&[1, 2, 3, 4], &[4, 9, 1, 2], 3), 2.0 / 3.0);
        assert_eq!(recall_at_k(&[1, 2], &[2, 1, 7], 5), 1.0);
        assert_eq!(recall_at_k(&[], &[1], 3), 0.0);
        assert_eq!(recall_at_k(&[1], &[1], 0), 0.0);
    }

    #[test]
    fn duplicate_hits_count_once() {
        assert_eq!(recall_at_k(&[1, 2], &[1, 1], 2), 0.5);
    }

    #[test]
    fn mean_recall_skips_empty_truth() {
        let truths = vec![vec![1, 2], vec![], vec![3]];
        let found = vec![vec![1, 5], vec![7], vec![3]];
        assert_eq!(mean_recall(&truths, &found, 2), 0.75);
    }

    #[test]
    fn nothing_to_find_is_full_recall() {
        assert_eq!(mean_recall(&[vec![], vec![]], &[vec![4], vec![]], 3), 1.0);
        assert_eq!(mean_recall(&[], &[], 3), 1.0);
    }

    #[test]
    fn error_stats() {
        let mut a = ErrorAccumulator::new();
        a.push(0.5);
        a.push(-0.5);
        let mut b = ErrorAccumulator::new();
        b.push(1.0);
        let stats = a.merge(b).finish();
        assert_eq!(stats.count, 3);
        assert!((stats.mean - 1.0 / 3.0).abs() < 1e-12);
        assert!((stats.rms - 0.5f64.sqrt()).abs() < 1e-12);
        assert_eq!(stats.max_abs, 1.0);
        assert_eq!(ErrorAccumulator::new().finish(), ErrorStats::default());
    }
}
