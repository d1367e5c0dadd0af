//! Compare approximate similar pairs against an exact reference.

use std::collections::HashMap;

use super::metrics::{recall_at_k, ErrorAccumulator, ErrorStats};
use crate::error::{Error, Result};
use crate::ids::CellId;
use crate::pairs::PairsView;

/// How well one set of similar pairs reproduces another.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonReport {
    /// `k` of the reference.
    pub k: usize,
    /// Cells with at least one reference pair; only these have a recall.
    pub evaluated_cells: usize,
    pub mean_recall: f64,
    pub min_recall: f64,
    /// Recall of every cell, `None` where the reference list is empty.
    pub cell_recall: Vec<Option<f64>>,
    /// `approximate - exact` similarity over pairs present in both.
    pub similarity_error: ErrorStats,
}

/// Compare `approximate` against `exact`. Both must have been computed over
/// the same gene set and cell set.
pub fn compare<E, A>(exact: &E, approximate: &A) -> Result<ComparisonReport>
where
    E: PairsView + ?Sized,
    A: PairsView + ?Sized,
{
    if exact.gene_set() != approximate.gene_set() {
        return Err(Error::SubsetMismatch(format!(
            "gene sets differ ({} vs {} genes)",
            exact.gene_set().len(),
            approximate.gene_set().len()
        )));
    }
    if exact.cell_set() != approximate.cell_set() {
        return Err(Error::SubsetMismatch(format!(
            "cell sets differ ({} vs {} cells)",
            exact.cell_set().len(),
            approximate.cell_set().len()
        )));
    }

    let k = exact.k();
    let mut errors = ErrorAccumulator::new();
    let mut cell_recall = Vec::with_capacity(exact.cell_count());

    for cell in 0..exact.cell_count() as CellId {
        let truth = exact.pairs(cell);
        let found = approximate.pairs(cell);

        let truth_similarity: HashMap<CellId, f32> = truth.iter().map(|p| (p.cell_id, p.similarity)).collect();
        for pair in found.iter() {
            if let Some(&s) = truth_similarity.get(&pair.cell_id) {
                errors.push(f64::from(pair.similarity) - f64::from(s));
            }
        }

        if truth.is_empty() {
            cell_recall.push(None);
        } else {
            let truth_ids: Vec<CellId> = truth.iter().map(|p| p.cell_id).collect();
            let found_ids: Vec<CellId> = found.iter().map(|p| p.cell_id).collect();
            cell_recall.push(Some(recall_at_k(&truth_ids, &found_ids, k)));
        }
    }

    let evaluated: Vec<f64> = cell_recall.iter().flatten().copied().collect();
    let (mean_recall, min_recall) = if evaluated.is_empty() {
        (1.0, 1.0)
    } else {
        (
            evaluated.iter().sum::<f64>() / evaluated.len() as f64,
            evaluated.iter().copied().fold(f64::INFINITY, f64::min),
        )
    };

    Ok(ComparisonReport {
        k,
        evaluated_cells: evaluated.len(),
        mean_recall,
        min_recall,
        cell_recall,
        similarity_error: errors.finish(),
    })
}
