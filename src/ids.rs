//! Identifiers and id subsets.
//!
//! Cells and genes carry *global* ids (their index in whatever store owns the
//! expression data). A run works on a subset of cells and a subset of genes;
//! inside a run everything is addressed by *local* ids, the position of the
//! global id inside the sorted subset.

use crate::error::{Error, Result};

/// Cell identifier. Global or local depending on context.
pub type CellId = u32;

/// Gene identifier. Global or local depending on context.
pub type GeneId = u32;

/// Returned by global→local lookups when the global id is not in the subset.
pub const INVALID_CELL_ID: CellId = CellId::MAX;

/// Immutable, sorted, duplicate-free set of global ids.
///
/// Local id `i` maps to `ids[i]`, so local→global is O(1) and global→local is
/// a binary search.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IdSubset {
    ids: Vec<u32>,
}

/// Subset of genes (dimensions) a run is restricted to.
pub type GeneSet = IdSubset;

/// Subset of cells (items) a run is restricted to.
pub type CellSet = IdSubset;

impl IdSubset {
    /// Build from ids that are already strictly increasing.
    ///
    /// Fails if the ids are out of order, repeated, or if `u32::MAX` is present
    /// (it is reserved as the invalid id).
    pub fn from_sorted(ids: Vec<u32>) -> Result<Self> {
        if let Some(w) = ids.windows(2).find(|w| w[0] >= w[1]) {
            return Err(Error::InvalidParameter(format!(
                "subset ids must be strictly increasing, found {} followed by {}",
                w[0], w[1]
            )));
        }
        if ids.last() == Some(&INVALID_CELL_ID) {
            return Err(Error::InvalidParameter(
                "subset contains the reserved invalid id".to_string(),
            ));
        }
        Ok(Self { ids })
    }

    /// Build from arbitrary ids; sorts and removes duplicates.
    pub fn from_unsorted(mut ids: Vec<u32>) -> Result<Self> {
        ids.sort_unstable();
        ids.dedup();
        Self::from_sorted(ids)
    }

    /// The subset `0..count`.
    pub fn full(count: u32) -> Self {
        Self {
            ids: (0..count).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Global id of local id `local`. Panics if out of range.
    #[inline]
    pub fn global_id(&self, local: u32) -> u32 {
        self.ids[local as usize]
    }

    /// Local id of `global`, or `None` if it is not in the subset.
    #[inline]
    pub fn local_id(&self, global: u32) -> Option<u32> {
        self.ids.binary_search(&global).ok().map(|i| i as u32)
    }

    pub fn contains(&self, global: u32) -> bool {
        self.ids.binary_search(&global).is_ok()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.ids
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.ids.iter().copied()
    }
}
