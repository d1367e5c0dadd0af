//! Banded bucket tables over signature slices.
//!
//! A signature of `n` bits is cut into `n / L` consecutive slices of `L`
//! bits. Two cells collide in a slice when they agree on all `L` bits, which
//! for correlation `ρ` (angle `θ = acos ρ`) happens with probability
//! `(1 − θ/π)^L`. Long slices collide rarely and only for very similar
//! cells; short slices collide often. Several lengths can be combined, longest
//! first, to fill a candidate list with the most promising cells before the
//! noisier short slices are consulted.
//!
//! Each slice keeps its own bucket map. Bucket keys are either the raw slice
//! value or, when a bucket count `2^b` is given, the top `b` bits of a
//! multiplicative hash of it.

use std::collections::HashMap;

use rayon::prelude::*;

use super::signature::Signatures;
use crate::error::{Error, Result};
use crate::ids::CellId;

/// Largest supported `log2_bucket_count`.
pub const MAX_LOG2_BUCKET_COUNT: u32 = 32;

/// Buckets of one signature slice.
#[derive(Debug, Clone)]
pub struct SliceBuckets {
    start: usize,
    len: usize,
    log2_bucket_count: Option<u32>,
    buckets: HashMap<u64, Vec<CellId>>,
}

impl SliceBuckets {
    fn build(signatures: &Signatures, start: usize, len: usize, log2_bucket_count: Option<u32>) -> Self {
        let mut buckets: HashMap<u64, Vec<CellId>> = HashMap::new();
        for cell in 0..signatures.cell_count() as CellId {
            let key = bucket_key(signatures.slice(cell, start, len), log2_bucket_count);
            buckets.entry(key).or_default().push(cell);
        }
        Self {
            start,
            len,
            log2_bucket_count,
            buckets,
        }
    }

    /// First signature bit of this slice.
    pub fn start(&self) -> usize {
        self.start
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Cells sharing the bucket of `cell`, `cell` itself included, in
    /// increasing id order.
    pub fn bucket_of(&self, signatures: &Signatures, cell: CellId) -> &[CellId] {
        let key = bucket_key(signatures.slice(cell, self.start, self.len), self.log2_bucket_count);
        self.buckets.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Size of the largest bucket.
    pub fn max_bucket_size(&self) -> usize {
        self.buckets.values().map(Vec::len).max().unwrap_or(0)
    }
}

#[inline]
fn bucket_key(value: u64, log2_bucket_count: Option<u32>) -> u64 {
    match log2_bucket_count {
        None => value,
        Some(0) => 0,
        Some(b) => value.wrapping_mul(0x9E37_79B9_7F4A_7C15) >> (64 - b),
    }
}

/// Bucket tables for a decreasing list of slice lengths.
#[derive(Debug, Clone)]
pub struct BandTable {
    /// `groups[i]` holds the slices of length `lengths[i]`.
    lengths: Vec<usize>,
    groups: Vec<Vec<SliceBuckets>>,
}

impl BandTable {
    /// Check a list of slice lengths against a signature width.
    pub fn validate(lengths: &[usize], lsh_count: usize, log2_bucket_count: Option<u32>) -> Result<()> {
        if lengths.is_empty() {
            return Err(Error::InvalidParameter("at least one slice length is required".to_string()));
        }
        if let Some(&bad) = lengths.iter().find(|&&l| l == 0 || l > 64) {
            return Err(Error::InvalidParameter(format!(
                "slice length {bad} must be in 1..=64"
            )));
        }
        if lengths.windows(2).any(|w| w[1] >= w[0]) {
            return Err(Error::InvalidParameter(format!(
                "slice lengths {lengths:?} must be strictly decreasing"
            )));
        }
        if let Some(&bad) = lengths.iter().find(|&&l| l > lsh_count) {
            return Err(Error::InvalidParameter(format!(
                "slice length {bad} exceeds signature width {lsh_count}"
            )));
        }
        if let Some(b) = log2_bucket_count {
            if b > MAX_LOG2_BUCKET_COUNT {
                return Err(Error::InvalidParameter(format!(
                    "log2_bucket_count {b} exceeds {MAX_LOG2_BUCKET_COUNT}"
                )));
            }
        }
        Ok(())
    }

    /// Build all slice tables. Slices are built in parallel on the current
    /// rayon pool.
    pub fn build(signatures: &Signatures, lengths: &[usize], log2_bucket_count: Option<u32>) -> Result<Self> {
        Self::validate(lengths, signatures.lsh_count(), log2_bucket_count)?;
        let groups: Vec<Vec<SliceBuckets>> = lengths
            .iter()
            .map(|&len| {
                let slice_count = signatures.lsh_count() / len;
                (0..slice_count)
                    .into_par_iter()
                    .map(|s| SliceBuckets::build(signatures, s * len, len, log2_bucket_count))
                    .collect()
            })
            .collect();
        Ok(Self {
            lengths: lengths.to_vec(),
            groups,
        })
    }

    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    /// Slice groups, longest slices first.
    pub fn groups(&self) -> impl Iterator<Item = (usize, &[SliceBuckets])> {
        self.lengths
            .iter()
            .copied()
            .zip(self.groups.iter().map(Vec::as_slice))
    }

    pub fn slice_count(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::SignatureParams;

    fn sigs(words: Vec<u64>) -> Signatures {
        let cells = words.len();
        Signatures::from_words(SignatureParams::new(64, 0), cells, 1, words).unwrap()
    }

    #[test]
    fn rejects_bad_lengths() {
        assert!(BandTable::validate(&[], 64, None).is_err());
        assert!(BandTable::validate(&[8, 8], 64, None).is_err());
        assert!(BandTable::validate(&[4, 8], 64, None).is_err());
        assert!(BandTable::validate(&[65], 128, None).is_err());
        assert!(BandTable::validate(&[16, 0], 64, None).is_err());
        assert!(BandTable::validate(&[32, 16, 8], 64, Some(40)).is_err());
        assert!(BandTable::validate(&[32, 16, 8], 64, Some(12)).is_ok());
    }

    #[test]
    fn cells_agreeing_on_a_slice_share_a_bucket() {
        // Cells 0 and 1 agree on the low 32 bits only, cell 2 differs everywhere.
        let s = sigs(vec![
            0x0000_0000_1234_5678,
            0xFFFF_0000_1234_5678,
            0x0F0F_0F0F_0000_0000,
        ]);
        let table = BandTable::build(&s, &[32], None).unwrap();
        let (len, slices) = table.groups().next().unwrap();
        assert_eq!(len, 32);
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].bucket_of(&s, 0), &[0, 1]);
        assert_eq!(slices[1].bucket_of(&s, 0), &[0]);
        assert_eq!(slices[0].bucket_of(&s, 2), &[2]);
    }

    #[test]
    fn hashed_buckets_are_bounded() {
        let s = sigs((0..200u64).map(|i| i.wrapping_mul(0xABCD_EF01_2345)).collect());
        let table = BandTable::build(&s, &[16], Some(3)).unwrap();
        for (_, slices) in table.groups() {
            for slice in slices {
                assert!(slice.bucket_count() <= 8);
            }
        }
    }
}
