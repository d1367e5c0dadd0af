//! Disk persistence for similar pairs.
//!
//! A completed [`SimilarPairs`](crate::pairs::SimilarPairs) is written once to
//! a single flat file (see [`format`]) and opened back memory-mapped
//! ([`MappedSimilarPairs`]). Files are managed by name through a
//! [`PairsCatalog`]:
//!
//! ```rust,no_run
//! use cellpairs::persistence::PairsCatalog;
//! # fn run(store: &cellpairs::SimilarPairs) -> Result<(), cellpairs::PersistenceError> {
//! let catalog = PairsCatalog::open("data/pairs")?;
//! catalog.create("exhaustive-k20", store)?;
//! let mapped = catalog.open_mapped("exhaustive-k20")?;
//! # Ok(())
//! # }
//! ```
//!
//! Stores from cancelled runs are refused with `InvalidState`.

pub mod catalog;
pub mod csv;
pub mod error;
pub mod format;
pub mod mapped;

pub use catalog::PairsCatalog;
pub use csv::{export_csv, write_csv};
pub use error::{PersistenceError, PersistenceResult};
pub use mapped::MappedSimilarPairs;
