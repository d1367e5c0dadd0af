//! On-disk layout of a similar pairs file.
//!
//! All integers and floats are little-endian; every section is a fixed-stride
//! array, so any record can be located without parsing what comes before it.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Header (32B)                                 │
//! │   magic "SMPR" (4B) · version u32            │
//! │   k u64 · cell_count u64 · gene_count u64    │
//! ├──────────────────────────────────────────────┤
//! │ cell_count * k pair records (8B each)        │
//! │   partner cell u32 · similarity f32          │
//! ├──────────────────────────────────────────────┤
//! │ cell_count cell info records (12B each)      │
//! │   used_count u32 · lowest index u32          │
//! │   lowest similarity f32                      │
//! ├──────────────────────────────────────────────┤
//! │ gene_count global gene ids (u32)             │
//! ├──────────────────────────────────────────────┤
//! │ cell_count global cell ids (u32)             │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Unused pair slots are written as `(INVALID_CELL_ID, 0.0)`.

use std::io::Write;

use super::error::{PersistenceError, PersistenceResult};
use crate::ids::IdSubset;
use crate::pairs::{CellInfo, Pair, PairsView, SimilarPairs};

/// Magic bytes at the start of every pairs file.
pub const PAIRS_MAGIC: [u8; 4] = *b"SMPR";

/// Current format version.
pub const FORMAT_VERSION: u32 = 1;

pub const HEADER_LEN: usize = 32;
pub const PAIR_RECORD_LEN: usize = 8;
pub const CELL_INFO_RECORD_LEN: usize = 12;
pub const ID_RECORD_LEN: usize = 4;

/// Parsed file header plus derived section offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u32,
    pub k: usize,
    pub cell_count: usize,
    pub gene_count: usize,
}

impl Header {
    pub fn for_store(store: &SimilarPairs) -> Self {
        Self {
            version: FORMAT_VERSION,
            k: store.k(),
            cell_count: store.cell_count(),
            gene_count: store.gene_set().len(),
        }
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> PersistenceResult<()> {
        w.write_all(&PAIRS_MAGIC)?;
        w.write_all(&self.version.to_le_bytes())?;
        w.write_all(&(self.k as u64).to_le_bytes())?;
        w.write_all(&(self.cell_count as u64).to_le_bytes())?;
        w.write_all(&(self.gene_count as u64).to_le_bytes())?;
        Ok(())
    }

    /// Parse and check a header, including that `file_len` matches the
    /// sections it announces.
    pub fn parse(bytes: &[u8], file_len: usize) -> PersistenceResult<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(PersistenceError::Format(format!(
                "file is {} bytes, shorter than the {HEADER_LEN}-byte header",
                bytes.len()
            )));
        }
        if bytes[0..4] != PAIRS_MAGIC {
            return Err(PersistenceError::Format(format!(
                "bad magic {:?}, expected {:?}",
                &bytes[0..4],
                PAIRS_MAGIC
            )));
        }
        let version = read_u32(bytes, 4);
        if version != FORMAT_VERSION {
            return Err(PersistenceError::Format(format!(
                "unsupported format version {version}, expected {FORMAT_VERSION}"
            )));
        }
        let header = Self {
            version,
            k: to_usize(read_u64(bytes, 8), "k")?,
            cell_count: to_usize(read_u64(bytes, 16), "cell_count")?,
            gene_count: to_usize(read_u64(bytes, 24), "gene_count")?,
        };
        if header.k == 0 {
            return Err(PersistenceError::Format("k is 0".to_string()));
        }
        let expected = header.file_len().ok_or_else(|| {
            PersistenceError::Format(format!("section sizes overflow: {header:?}"))
        })?;
        if expected != file_len {
            return Err(PersistenceError::Format(format!(
                "file is {file_len} bytes, header announces {expected}"
            )));
        }
        Ok(header)
    }

    pub fn pairs_offset(&self) -> usize {
        HEADER_LEN
    }

    pub fn cell_info_offset(&self) -> usize {
        self.pairs_offset() + self.cell_count * self.k * PAIR_RECORD_LEN
    }

    pub fn gene_ids_offset(&self) -> usize {
        self.cell_info_offset() + self.cell_count * CELL_INFO_RECORD_LEN
    }

    pub fn cell_ids_offset(&self) -> usize {
        self.gene_ids_offset() + self.gene_count * ID_RECORD_LEN
    }

    /// Total file length, or `None` on overflow.
    pub fn file_len(&self) -> Option<usize> {
        let pairs = self.cell_count.checked_mul(self.k)?.checked_mul(PAIR_RECORD_LEN)?;
        let info = self.cell_count.checked_mul(CELL_INFO_RECORD_LEN)?;
        let genes = self.gene_count.checked_mul(ID_RECORD_LEN)?;
        let cells = self.cell_count.checked_mul(ID_RECORD_LEN)?;
        HEADER_LEN
            .checked_add(pairs)?
            .checked_add(info)?
            .checked_add(genes)?
            .checked_add(cells)
    }
}

/// Write a completed store in the layout above.
pub fn write_store<W: Write>(store: &SimilarPairs, w: &mut W) -> PersistenceResult<()> {
    if !store.is_complete() {
        return Err(PersistenceError::InvalidState(format!(
            "only completed similar pairs can be saved, this one is {:?}",
            store.state()
        )));
    }
    Header::for_store(store).write_to(w)?;
    for pair in store.raw_pairs() {
        w.write_all(&pair.cell_id.to_le_bytes())?;
        w.write_all(&pair.similarity.to_le_bytes())?;
    }
    for info in store.raw_cell_info() {
        w.write_all(&info.used_count.to_le_bytes())?;
        w.write_all(&info.lowest_similarity_index.to_le_bytes())?;
        w.write_all(&info.lowest_similarity.to_le_bytes())?;
    }
    for id in store.gene_set().iter().chain(store.cell_set().iter()) {
        w.write_all(&id.to_le_bytes())?;
    }
    Ok(())
}

#[inline]
pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(buf)
}

#[inline]
pub(crate) fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

#[inline]
pub(crate) fn read_f32(bytes: &[u8], offset: usize) -> f32 {
    f32::from_bits(read_u32(bytes, offset))
}

#[inline]
pub(crate) fn read_pair(bytes: &[u8], offset: usize) -> Pair {
    Pair::new(read_u32(bytes, offset), read_f32(bytes, offset + 4))
}

#[inline]
pub(crate) fn read_cell_info(bytes: &[u8], offset: usize) -> CellInfo {
    CellInfo {
        used_count: read_u32(bytes, offset),
        lowest_similarity_index: read_u32(bytes, offset + 4),
        lowest_similarity: read_f32(bytes, offset + 8),
    }
}

/// Decode `count` ids starting at `offset` into a subset.
pub(crate) fn read_id_subset(bytes: &[u8], offset: usize, count: usize, what: &str) -> PersistenceResult<IdSubset> {
    let ids = (0..count)
        .map(|i| read_u32(bytes, offset + i * ID_RECORD_LEN))
        .collect();
    IdSubset::from_sorted(ids).map_err(|e| PersistenceError::Format(format!("{what} ids: {e}")))
}

fn to_usize(value: u64, what: &str) -> PersistenceResult<usize> {
    usize::try_from(value).map_err(|_| PersistenceError::Format(format!("{what} = {value} does not fit in usize")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Header {
        Header {
            version: FORMAT_VERSION,
            k: 3,
            cell_count: 5,
            gene_count: 7,
        }
    }

    #[test]
    fn offsets_follow_the_layout() {
        let h = header();
        assert_eq!(h.pairs_offset(), 32);
        assert_eq!(h.cell_info_offset(), 32 + 15 * 8);
        assert_eq!(h.gene_ids_offset(), 32 + 120 + 60);
        assert_eq!(h.cell_ids_offset(), 32 + 120 + 60 + 28);
        assert_eq!(h.file_len(), Some(32 + 120 + 60 + 28 + 20));
    }

    #[test]
    fn header_round_trip_and_length_check() {
        let h = header();
        let mut bytes = Vec::new();
        h.write_to(&mut bytes).unwrap();
        assert_eq!(bytes.len(), HEADER_LEN);
        let len = h.file_len().unwrap();
        assert_eq!(Header::parse(&bytes, len).unwrap(), h);
        assert!(matches!(Header::parse(&bytes, len - 1), Err(PersistenceError::Format(_))));
    }

    #[test]
    fn bad_magic_and_version_are_rejected() {
        let mut bytes = Vec::new();
        header().write_to(&mut bytes).unwrap();
        let len = header().file_len().unwrap();

        let mut bad = bytes.clone();
        bad[0] = b'X';
        assert!(matches!(Header::parse(&bad, len), Err(PersistenceError::Format(_))));

        let mut bad = bytes;
        bad[4..8].copy_from_slice(&99u32.to_le_bytes());
        assert!(matches!(Header::parse(&bad, len), Err(PersistenceError::Format(_))));
    }
}
