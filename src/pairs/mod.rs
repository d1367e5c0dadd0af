//! Bounded top-k storage of similar cell pairs.
//!
//! For every cell of a cell set we keep at most `k` partners, the best seen so
//! far. Storage is one contiguous array of `cell_count * k` [`Pair`] slots plus
//! one [`CellInfo`] per cell, so nothing ever grows after creation and the
//! whole table can be written to disk (and memory-mapped back) as flat records.
//!
//! Because only the top `k` per cell are kept, `(a, b)` being stored does not
//! imply `(b, a)` is stored.
//!
//! ## Cell ids
//!
//! Every id stored or accepted here is a *local* cell id: the index in the
//! store's own copy of the cell set. Use
//! [`PairsView::global_cell_id`] / [`PairsView::local_cell_id`] to translate.

mod slot;
mod store;

pub use store::{OwnerBlock, SimilarPairs, StoreState};

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::ids::{CellId, CellSet, GeneSet, INVALID_CELL_ID};

/// A stored partner and its similarity. The owning cell is implied by position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pair {
    pub cell_id: CellId,
    pub similarity: f32,
}

impl Pair {
    pub fn new(cell_id: CellId, similarity: f32) -> Self {
        Self {
            cell_id,
            similarity,
        }
    }
}

impl Default for Pair {
    fn default() -> Self {
        Self {
            cell_id: INVALID_CELL_ID,
            similarity: 0.0,
        }
    }
}

/// Bookkeeping for one cell's slot region.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CellInfo {
    /// Number of valid pairs (0..=k).
    pub used_count: u32,
    /// Position of the lowest-similarity pair, relative to the cell's region.
    pub lowest_similarity_index: u32,
    /// Similarity of that pair. The admission threshold once the region is full.
    pub lowest_similarity: f32,
}

/// How a full region admits new candidates. Chosen once per store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionPolicy {
    /// Scan existing entries, skip partners already present, replace the
    /// minimum. O(k) per insertion, duplicate-free.
    #[default]
    LinearScan,
    /// Bounded min-heap on similarity. O(log k) per insertion but no
    /// duplicate check: callers must not offer the same pair twice.
    Heap,
}

/// Read access shared by in-memory and memory-mapped stores.
pub trait PairsView {
    /// Maximum number of pairs per cell.
    fn k(&self) -> usize;

    /// Gene set the similarities were computed over.
    fn gene_set(&self) -> &GeneSet;

    /// Cell set; local cell ids index into it.
    fn cell_set(&self) -> &CellSet;

    /// Stored pairs of `cell` (local id), valid entries only.
    fn pairs(&self, cell: CellId) -> Cow<'_, [Pair]>;

    fn cell_count(&self) -> usize {
        self.cell_set().len()
    }

    /// Number of pairs stored for `cell`.
    fn size(&self, cell: CellId) -> usize {
        self.pairs(cell).len()
    }

    /// True if `cell1` is currently listed among the partners of `cell0`.
    ///
    /// Not symmetric under a swap of the arguments.
    fn exists(&self, cell0: CellId, cell1: CellId) -> bool {
        self.pairs(cell0).iter().any(|p| p.cell_id == cell1)
    }

    /// Global cell id of a local cell id. Panics if out of range.
    fn global_cell_id(&self, local: CellId) -> CellId {
        self.cell_set().global_id(local)
    }

    /// Local cell id of a global cell id, or [`INVALID_CELL_ID`] if the cell is
    /// not in this store's cell set.
    fn local_cell_id(&self, global: CellId) -> CellId {
        self.cell_set().local_id(global).unwrap_or(INVALID_CELL_ID)
    }

    /// Total number of stored pairs over all cells.
    fn total_pairs(&self) -> usize {
        (0..self.cell_count() as CellId).map(|c| self.size(c)).sum()
    }
}
