//! Random-hyperplane LSH for expression profiles.
//!
//! ## The LSH Intuition
//!
//! Traditional hash functions try to *minimize* collisions. LSH does the opposite
//! for similar items: hash values of similar cells agree more often than
//! those of dissimilar cells, so most of the expensive exact comparisons can
//! be skipped.
//!
//! ## Random hyperplanes (Charikar 2002)
//!
//! Project a vector onto a random hyperplane normal `r` and keep the sign:
//!
//! ```text
//! P[sign(r·a) = sign(r·b)] = 1 - θ(a,b)/π
//! ```
//!
//! With `n` hyperplanes and `m` disagreeing bits, `cos(π·m/n)` estimates
//! `cos θ`. Profiles are centered before projection, so the cosine of the
//! centered vectors is exactly the Pearson correlation used by the exact
//! metric.
//!
//! ## Beyond all pairs
//!
//! Signatures make each comparison cheap but still O(n²) pairs. Two ways to
//! look at fewer pairs:
//!
//! - **Banding** ([`BandTable`]): split signatures into slices and only compare
//!   cells that agree on a whole slice.
//! - **Permutations** ([`PermutationTable`]): sort cells by randomly permuted
//!   signatures and only compare cells that land close together.
//!
//! ## References
//!
//! - Charikar (2002). "Similarity estimation techniques from rounding algorithms."
//! - Leskovec, Rajaraman, Ullman. "Mining of Massive Datasets", sections 3.4–3.7.

pub mod bucket;
pub mod permutation;
pub mod signature;

pub use bucket::{BandTable, SliceBuckets};
pub use permutation::{BitPermutation, PermutationTable};
pub use signature::{Hyperplanes, SignatureParams, Signatures};
