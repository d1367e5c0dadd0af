//! Accuracy audits.
//!
//! - [`compare`]: recall and similarity error of one set of similar pairs
//!   against an exact reference.
//! - [`signature_accuracy`]: how well signature bit agreement estimates the
//!   exact similarity.
//! - [`inspect_signatures`]: bit balance and diversity of a signature set.
//! - [`stored_pair_accuracy`]: error of the similarities a populated store
//!   holds, recomputed exactly.

pub mod compare;
pub mod metrics;
pub mod signatures;
pub mod stored;

pub use compare::{compare, ComparisonReport};
pub use metrics::{mean_recall, recall_at_k, ErrorAccumulator, ErrorStats};
pub use signatures::{inspect_signatures, signature_accuracy, PairSampling, SignatureSummary};
pub use stored::stored_pair_accuracy;
