//! In-memory similar pairs table.

use std::borrow::Cow;
use std::ops::Range;

use rayon::prelude::*;

use super::slot::{admit, sort_region};
use super::{AdmissionPolicy, CellInfo, Pair, PairsView};
use crate::error::{Error, Result};
use crate::ids::{CellId, CellSet, GeneSet};

/// Lifecycle of a [`SimilarPairs`] table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// Accepting insertions.
    Building,
    /// Sorted and frozen. Read-only.
    Complete,
    /// A run stopped early. Contents are partial and must not be trusted.
    Incomplete,
}

/// Top-k similar partners for every cell of a cell set.
///
/// Owns copies of the gene set and cell set it was created for: the stored
/// similarities only mean something relative to exactly those subsets.
#[derive(Debug, Clone)]
pub struct SimilarPairs {
    k: usize,
    policy: AdmissionPolicy,
    state: StoreState,
    /// `cell_count * k` slots; cell `c` owns `[c*k, (c+1)*k)`.
    pairs: Vec<Pair>,
    cell_info: Vec<CellInfo>,
    gene_set: GeneSet,
    cell_set: CellSet,
}

impl SimilarPairs {
    /// Create an empty table holding up to `k` pairs per cell.
    pub fn new(k: usize, gene_set: GeneSet, cell_set: CellSet, policy: AdmissionPolicy) -> Result<Self> {
        if k == 0 {
            return Err(Error::InvalidParameter("k must be >= 1".to_string()));
        }
        if k > u32::MAX as usize {
            return Err(Error::InvalidParameter(format!("k = {k} does not fit in u32")));
        }
        let cell_count = cell_set.len();
        let slots = cell_count.checked_mul(k).ok_or_else(|| {
            Error::InvalidParameter(format!("{cell_count} cells with k = {k} overflows"))
        })?;
        Ok(Self {
            k,
            policy,
            state: StoreState::Building,
            pairs: vec![Pair::default(); slots],
            cell_info: vec![CellInfo::default(); cell_count],
            gene_set,
            cell_set,
        })
    }

    /// Reassemble a completed table from its flat parts (used when loading).
    pub(crate) fn from_parts(
        k: usize,
        policy: AdmissionPolicy,
        pairs: Vec<Pair>,
        cell_info: Vec<CellInfo>,
        gene_set: GeneSet,
        cell_set: CellSet,
    ) -> Self {
        debug_assert_eq!(pairs.len(), cell_set.len() * k);
        debug_assert_eq!(cell_info.len(), cell_set.len());
        Self {
            k,
            policy,
            state: StoreState::Complete,
            pairs,
            cell_info,
            gene_set,
            cell_set,
        }
    }

    pub fn policy(&self) -> AdmissionPolicy {
        self.policy
    }

    pub fn state(&self) -> StoreState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == StoreState::Complete
    }

    /// Per-cell bookkeeping for `cell`.
    pub fn cell_info(&self, cell: CellId) -> CellInfo {
        self.cell_info[cell as usize]
    }

    /// Valid pairs of `cell`.
    pub fn pairs_of(&self, cell: CellId) -> &[Pair] {
        let start = cell as usize * self.k;
        let used = self.cell_info[cell as usize].used_count as usize;
        &self.pairs[start..start + used]
    }

    /// Offer the pair to both cells' lists.
    ///
    /// Each side independently keeps or drops it depending on what it already
    /// holds. Panics on out-of-range ids, on `cell0 == cell1`, or if the
    /// table is no longer building.
    pub fn add(&mut self, cell0: CellId, cell1: CellId, similarity: f64) {
        self.add_unsymmetric(cell0, cell1, similarity);
        self.add_unsymmetric(cell1, cell0, similarity);
    }

    /// Offer `cell1` to the list of `cell0` only.
    pub fn add_unsymmetric(&mut self, cell0: CellId, cell1: CellId, similarity: f64) -> bool {
        self.check_building();
        self.check_pair(cell0, cell1);
        let start = cell0 as usize * self.k;
        admit(
            &mut self.pairs[start..start + self.k],
            &mut self.cell_info[cell0 as usize],
            self.policy,
            Pair::new(cell1, similarity as f32),
        )
    }

    /// Replace the content of every list with the given per-cell pairs.
    ///
    /// `lists` must have one entry per cell; each list is offered through the
    /// table's admission policy, so at most the best `k` survive.
    pub fn copy_from(&mut self, lists: &[Vec<Pair>]) -> Result<()> {
        self.check_building();
        if lists.len() != self.cell_count() {
            return Err(Error::InvalidParameter(format!(
                "expected {} lists, got {}",
                self.cell_count(),
                lists.len()
            )));
        }
        self.pairs.fill(Pair::default());
        self.cell_info.fill(CellInfo::default());
        for (cell0, list) in lists.iter().enumerate() {
            for pair in list {
                self.add_unsymmetric(cell0 as CellId, pair.cell_id, f64::from(pair.similarity));
            }
        }
        Ok(())
    }

    /// Sort every list by decreasing similarity and freeze the table.
    pub fn sort(&mut self) {
        self.check_building();
        let k = self.k;
        self.pairs
            .par_chunks_mut(k)
            .zip(self.cell_info.par_iter_mut())
            .for_each(|(region, info)| sort_region(region, info));
        self.state = StoreState::Complete;
    }

    /// Mark the table as the output of an interrupted run.
    pub(crate) fn mark_incomplete(&mut self) {
        self.state = StoreState::Incomplete;
    }

    /// Split the table into disjoint blocks of `block_size` consecutive owner
    /// cells, for lock-free parallel population.
    pub(crate) fn par_owner_blocks(
        &mut self,
        block_size: usize,
    ) -> impl IndexedParallelIterator<Item = OwnerBlock<'_>> + '_ {
        assert!(block_size > 0, "block size must be >= 1");
        self.check_building();
        let k = self.k;
        let policy = self.policy;
        let cell_count = self.cell_set.len() as CellId;
        self.pairs
            .par_chunks_mut(k * block_size)
            .zip(self.cell_info.par_chunks_mut(block_size))
            .enumerate()
            .map(move |(i, (pairs, info))| OwnerBlock {
                first_cell: (i * block_size) as CellId,
                cell_count,
                k,
                policy,
                pairs,
                info,
            })
    }

    pub(crate) fn raw_pairs(&self) -> &[Pair] {
        &self.pairs
    }

    pub(crate) fn raw_cell_info(&self) -> &[CellInfo] {
        &self.cell_info
    }

    fn check_building(&self) {
        assert!(
            self.state == StoreState::Building,
            "similar pairs table is {:?}, insertions are only allowed while building",
            self.state
        );
    }

    fn check_pair(&self, cell0: CellId, cell1: CellId) {
        let n = self.cell_count();
        assert!(
            (cell0 as usize) < n && (cell1 as usize) < n,
            "cell id out of range: ({cell0}, {cell1}) with {n} cells"
        );
        assert_ne!(cell0, cell1, "a cell cannot be paired with itself");
    }
}

impl PairsView for SimilarPairs {
    fn k(&self) -> usize {
        self.k
    }

    fn gene_set(&self) -> &GeneSet {
        &self.gene_set
    }

    fn cell_set(&self) -> &CellSet {
        &self.cell_set
    }

    fn pairs(&self, cell: CellId) -> Cow<'_, [Pair]> {
        Cow::Borrowed(self.pairs_of(cell))
    }

    fn size(&self, cell: CellId) -> usize {
        self.cell_info[cell as usize].used_count as usize
    }
}

/// Exclusive write access to the lists of a contiguous range of owner cells.
///
/// Workers holding different blocks never touch the same list, so no locking
/// is needed.
pub struct OwnerBlock<'a> {
    first_cell: CellId,
    cell_count: CellId,
    k: usize,
    policy: AdmissionPolicy,
    pairs: &'a mut [Pair],
    info: &'a mut [CellInfo],
}

impl OwnerBlock<'_> {
    /// Owner cells of this block.
    pub fn cells(&self) -> Range<CellId> {
        self.first_cell..self.first_cell + self.info.len() as CellId
    }

    /// Offer `cell1` to the list of `cell0` if the similarity, as stored,
    /// is at least `threshold`.
    ///
    /// The check is made on the `f32` value that would be stored, so no kept
    /// pair ever reads back below `threshold`.
    #[inline]
    pub fn offer(&mut self, cell0: CellId, cell1: CellId, similarity: f64, threshold: f64) -> bool {
        let stored = similarity as f32;
        if f64::from(stored) >= threshold {
            self.add_unsymmetric(cell0, cell1, f64::from(stored))
        } else {
            false
        }
    }

    /// Offer `cell1` to the list of `cell0`, which must belong to this block.
    pub fn add_unsymmetric(&mut self, cell0: CellId, cell1: CellId, similarity: f64) -> bool {
        assert!(
            self.cells().contains(&cell0),
            "cell {cell0} is not owned by block {:?}",
            self.cells()
        );
        assert!(cell1 < self.cell_count, "cell id {cell1} out of range");
        assert_ne!(cell0, cell1, "a cell cannot be paired with itself");
        let local = (cell0 - self.first_cell) as usize;
        let start = local * self.k;
        admit(
            &mut self.pairs[start..start + self.k],
            &mut self.info[local],
            self.policy,
            Pair::new(cell1, similarity as f32),
        )
    }
}
