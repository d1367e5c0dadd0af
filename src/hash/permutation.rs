//! Sorted-permutation tables (Charikar's nearest-neighbor scheme).
//!
//! Pick `b` distinct signature bits in random order and read them as a
//! `b`-bit integer, first chosen bit most significant. Sorting all cells by
//! that key puts cells with long common prefixes next to each other, so a
//! cell's close neighbors in sort order are likely candidates. Repeating with
//! independent permutations covers cells that happened to disagree on an
//! early bit.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use smallvec::SmallVec;

use super::signature::Signatures;
use crate::error::{Error, Result};
use crate::ids::CellId;

/// An ordered choice of signature bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitPermutation {
    bits: SmallVec<[u32; 64]>,
}

impl BitPermutation {
    /// `count` permutations of `permuted_bit_count` bits each, drawn from a
    /// generator seeded with `seed`.
    pub fn generate(lsh_count: usize, permuted_bit_count: usize, count: usize, seed: u64) -> Result<Vec<Self>> {
        if permuted_bit_count == 0 || permuted_bit_count > 64 {
            return Err(Error::InvalidParameter(format!(
                "permuted_bit_count {permuted_bit_count} must be in 1..=64"
            )));
        }
        if permuted_bit_count > lsh_count {
            return Err(Error::InvalidParameter(format!(
                "permuted_bit_count {permuted_bit_count} exceeds signature width {lsh_count}"
            )));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let mut all: Vec<u32> = (0..lsh_count as u32).collect();
        Ok((0..count)
            .map(|_| {
                all.shuffle(&mut rng);
                Self {
                    bits: SmallVec::from_slice(&all[..permuted_bit_count]),
                }
            })
            .collect())
    }

    pub fn bits(&self) -> &[u32] {
        &self.bits
    }

    /// Permuted key of a cell.
    #[inline]
    pub fn key(&self, signatures: &Signatures, cell: CellId) -> u64 {
        self.bits.iter().enumerate().fold(0u64, |key, (i, &b)| {
            if signatures.bit(cell, b as usize) {
                key | (1u64 << (63 - i))
            } else {
                key
            }
        })
    }
}

/// All cells sorted by one permutation's key.
#[derive(Debug, Clone)]
pub struct PermutationTable {
    /// Cells in key order, ties by cell id.
    order: Vec<CellId>,
    /// `position[cell]` is the index of `cell` in `order`.
    position: Vec<u32>,
}

impl PermutationTable {
    pub fn build(signatures: &Signatures, permutation: &BitPermutation) -> Self {
        let cell_count = signatures.cell_count();
        let mut keyed: Vec<(u64, CellId)> = (0..cell_count as CellId)
            .map(|c| (permutation.key(signatures, c), c))
            .collect();
        keyed.sort_unstable();
        let order: Vec<CellId> = keyed.into_iter().map(|(_, c)| c).collect();
        let mut position = vec![0u32; cell_count];
        for (i, &c) in order.iter().enumerate() {
            position[c as usize] = i as u32;
        }
        Self { order, position }
    }

    pub fn order(&self) -> &[CellId] {
        &self.order
    }

    pub fn position(&self, cell: CellId) -> usize {
        self.position[cell as usize] as usize
    }

    /// Up to `half_width` cells on each side of `cell` in sort order,
    /// `cell` itself excluded.
    pub fn neighbors(&self, cell: CellId, half_width: usize) -> impl Iterator<Item = CellId> + '_ {
        let p = self.position(cell);
        let lo = p.saturating_sub(half_width);
        let hi = (p + half_width + 1).min(self.order.len());
        self.order[lo..p]
            .iter()
            .chain(&self.order[p + 1..hi])
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::SignatureParams;
    use smallvec::smallvec;

    #[test]
    fn generation_is_seeded_and_bits_are_distinct() {
        let a = BitPermutation::generate(100, 20, 3, 9).unwrap();
        let b = BitPermutation::generate(100, 20, 3, 9).unwrap();
        assert_eq!(a, b);
        for p in &a {
            let mut bits = p.bits().to_vec();
            bits.sort_unstable();
            bits.dedup();
            assert_eq!(bits.len(), 20);
            assert!(bits.iter().all(|&x| x < 100));
        }
        assert_ne!(a[0], a[1]);
    }

    #[test]
    fn rejects_too_many_bits() {
        assert!(BitPermutation::generate(128, 65, 1, 0).is_err());
        assert!(BitPermutation::generate(16, 32, 1, 0).is_err());
        assert!(BitPermutation::generate(16, 0, 1, 0).is_err());
    }

    #[test]
    fn key_reads_first_chosen_bit_as_most_significant() {
        let s = Signatures::from_words(SignatureParams::new(64, 0), 1, 1, vec![0b101]).unwrap();
        let p = BitPermutation { bits: smallvec![2, 1, 0] };
        assert_eq!(p.key(&s, 0), (1u64 << 63) | (1u64 << 61));
    }

    #[test]
    fn neighbors_are_clipped_at_the_ends() {
        let s = Signatures::from_words(SignatureParams::new(64, 0), 4, 1, vec![3, 0, 2, 1]).unwrap();
        let p = BitPermutation { bits: smallvec![1, 0] };
        let t = PermutationTable::build(&s, &p);
        assert_eq!(t.order(), &[1, 3, 2, 0]);
        assert_eq!(t.neighbors(1, 2).collect::<Vec<_>>(), vec![3, 2]);
        assert_eq!(t.neighbors(2, 1).collect::<Vec<_>>(), vec![3, 0]);
    }
}
