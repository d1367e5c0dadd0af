//! Read-only, memory-mapped similar pairs.

use std::borrow::Cow;
use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use super::error::{PersistenceError, PersistenceResult};
use super::format::{
    read_cell_info, read_id_subset, read_pair, read_u32, Header, CELL_INFO_RECORD_LEN, PAIR_RECORD_LEN,
};
use crate::ids::{CellId, CellSet, GeneSet};
use crate::pairs::{AdmissionPolicy, CellInfo, Pair, PairsView, SimilarPairs};

/// A pairs file mapped into memory.
///
/// Gene and cell sets are decoded when the file is opened; pair records are
/// decoded on access, straight from the mapping.
#[derive(Debug)]
pub struct MappedSimilarPairs {
    mmap: Mmap,
    header: Header,
    gene_set: GeneSet,
    cell_set: CellSet,
}

impl MappedSimilarPairs {
    pub fn open(path: impl AsRef<Path>) -> PersistenceResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PersistenceError::NotFound(path.display().to_string()),
            _ => PersistenceError::Io(e),
        })?;
        // SAFETY: pairs files are written once through `create_new` and never
        // modified in place, so the mapping is not mutated under us.
        let mmap = unsafe { Mmap::map(&file)? };
        Self::from_mmap(mmap)
    }

    fn from_mmap(mmap: Mmap) -> PersistenceResult<Self> {
        let header = Header::parse(&mmap, mmap.len())?;
        let gene_set = read_id_subset(&mmap, header.gene_ids_offset(), header.gene_count, "gene")?;
        let cell_set = read_id_subset(&mmap, header.cell_ids_offset(), header.cell_count, "cell")?;

        for cell in 0..header.cell_count {
            let used = read_u32(&mmap, header.cell_info_offset() + cell * CELL_INFO_RECORD_LEN) as usize;
            if used > header.k {
                return Err(PersistenceError::Format(format!(
                    "cell {cell} claims {used} pairs with k = {}",
                    header.k
                )));
            }
        }

        Ok(Self {
            mmap,
            header,
            gene_set,
            cell_set,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn cell_info(&self, cell: CellId) -> CellInfo {
        assert!((cell as usize) < self.header.cell_count, "cell id {cell} out of range");
        read_cell_info(
            &self.mmap,
            self.header.cell_info_offset() + cell as usize * CELL_INFO_RECORD_LEN,
        )
    }

    /// The `i`-th stored pair of `cell`, read from the mapping without
    /// decoding the rest of the list.
    pub fn pair(&self, cell: CellId, i: usize) -> Pair {
        let used = self.size(cell);
        assert!(i < used, "pair {i} out of range for cell {cell} with {used} pairs");
        read_pair(&self.mmap, self.pair_offset(cell, i))
    }

    /// The stored pairs of `cell`, decoded lazily.
    pub fn iter_pairs(&self, cell: CellId) -> impl ExactSizeIterator<Item = Pair> + '_ {
        let used = self.size(cell);
        (0..used).map(move |i| read_pair(&self.mmap, self.pair_offset(cell, i)))
    }

    #[inline]
    fn pair_offset(&self, cell: CellId, i: usize) -> usize {
        self.header.pairs_offset() + (cell as usize * self.header.k + i) * PAIR_RECORD_LEN
    }

    /// Copy everything into an in-memory, completed store.
    pub fn to_store(&self) -> SimilarPairs {
        let h = &self.header;
        let pairs = (0..h.cell_count * h.k)
            .map(|i| read_pair(&self.mmap, h.pairs_offset() + i * PAIR_RECORD_LEN))
            .collect();
        let cell_info = (0..h.cell_count as CellId).map(|c| self.cell_info(c)).collect();
        SimilarPairs::from_parts(
            h.k,
            AdmissionPolicy::default(),
            pairs,
            cell_info,
            self.gene_set.clone(),
            self.cell_set.clone(),
        )
    }
}

impl PairsView for MappedSimilarPairs {
    fn k(&self) -> usize {
        self.header.k
    }

    fn gene_set(&self) -> &GeneSet {
        &self.gene_set
    }

    fn cell_set(&self) -> &CellSet {
        &self.cell_set
    }

    fn pairs(&self, cell: CellId) -> Cow<'_, [Pair]> {
        Cow::Owned(self.iter_pairs(cell).collect())
    }

    fn size(&self, cell: CellId) -> usize {
        self.cell_info(cell).used_count as usize
    }
}
