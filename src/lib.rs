//! cellpairs: top-k similar cell pairs over sparse expression profiles.
//!
//! For every cell of a cell set, find the `k` cells whose expression
//! profiles (restricted to a gene set) are most correlated with it.
//!
//! - `ids`: gene and cell subsets, local/global id translation
//! - `similarity`: Pearson correlation of sparse profiles
//! - `pairs`: the bounded top-k store
//! - `hash`: random-hyperplane signatures, band and permutation tables
//! - `strategy`: exhaustive, LSH-exhaustive, banded and Charikar searches
//! - `persistence`: named on-disk artifacts, memory-mapped reads, CSV export
//! - `audit`: recall and similarity error against an exact run
//! - `graph`: k-NN similarity graph
//!
//! ```no_run
//! use cellpairs::{Charikar, CharikarParams, CellSet, GeneSet, PairFinder, PairsView, SparseMatrix};
//!
//! # fn main() -> cellpairs::Result<()> {
//! # let matrix = SparseMatrix::new(100);
//! let strategy = Charikar::new(CharikarParams::new(64, 128));
//! let pairs = PairFinder::new(20)
//!     .with_threshold(0.2)
//!     .run(&matrix, &GeneSet::full(100), &CellSet::full(1000), &strategy)?;
//! for p in pairs.pairs(0).iter() {
//!     println!("{} {}", pairs.global_cell_id(p.cell_id), p.similarity);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Nuances
//!
//! ## Top-k is not symmetric
//!
//! Each cell keeps only its own best `k`. A hub cell may be in the list of
//! hundreds of cells while its own list holds just `k` of them, so
//! `exists(a, b)` does not imply `exists(b, a)`.
//!
//! ## Correlation vs. signature similarity
//!
//! Signatures estimate the angle between *centered* profiles, i.e. the
//! Pearson correlation, with error shrinking as `1/sqrt(lsh_count)`. Scoring
//! candidates exactly removes that error but not the recall loss of a
//! candidate strategy.

pub mod audit;
pub mod cancel;
pub mod config;
pub mod error;
pub mod finder;
pub mod graph;
pub mod hash;
pub mod ids;
pub mod pairs;
pub mod persistence;
pub mod similarity;
pub mod sparse;
pub mod strategy;

// Re-exports
pub use cancel::Cancellation;
pub use config::{RunConfig, StrategyConfig};
pub use error::{Error, PersistenceError, Result};
pub use finder::PairFinder;
pub use graph::{GraphParams, SimilarityGraph};
pub use hash::{SignatureParams, Signatures};
pub use ids::{CellId, CellSet, GeneId, GeneSet, IdSubset, INVALID_CELL_ID};
pub use pairs::{AdmissionPolicy, CellInfo, Pair, PairsView, SimilarPairs, StoreState};
pub use persistence::{MappedSimilarPairs, PairsCatalog};
pub use similarity::{CellProfiles, SparseProfile};
pub use sparse::{SparseMatrix, SparseVectorView};
pub use strategy::{
    Banded, BandedParams, CandidateStrategy, Charikar, CharikarParams, Exhaustive, LshExhaustive, RunContext, Scoring,
};
