//! Serializable run configuration.
//!
//! ```json
//! {
//!   "k": 20,
//!   "similarity_threshold": 0.2,
//!   "threads": 8,
//!   "strategy": { "kind": "charikar", "permutation_count": 64, "search_count": 128 }
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cancel::Cancellation;
use crate::error::Result;
use crate::finder::PairFinder;
use crate::hash::SignatureParams;
use crate::pairs::AdmissionPolicy;
use crate::persistence::PersistenceError;
use crate::strategy::{Banded, BandedParams, CandidateStrategy, Charikar, CharikarParams, Exhaustive, LshExhaustive, DEFAULT_BLOCK_SIZE};

/// Which strategy to run, with its parameters.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    #[default]
    Exhaustive,
    LshExhaustive {
        #[serde(default)]
        signature: SignatureParams,
    },
    Banded(BandedParams),
    Charikar(CharikarParams),
}

impl StrategyConfig {
    pub fn build(&self) -> Box<dyn CandidateStrategy> {
        match self {
            StrategyConfig::Exhaustive => Box::new(Exhaustive),
            StrategyConfig::LshExhaustive { signature } => Box::new(LshExhaustive::new(*signature)),
            StrategyConfig::Banded(params) => Box::new(Banded::new(params.clone())),
            StrategyConfig::Charikar(params) => Box::new(Charikar::new(params.clone())),
        }
    }
}

/// Everything needed to run a [`PairFinder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub k: usize,
    /// Pairs below this similarity are not stored. `None` keeps everything.
    pub similarity_threshold: Option<f64>,
    /// Worker threads, `0` for the rayon default.
    pub threads: usize,
    pub policy: AdmissionPolicy,
    pub block_size: usize,
    /// Cancel the run after this many milliseconds.
    pub timeout_ms: Option<u64>,
    pub strategy: StrategyConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            k: 10,
            similarity_threshold: None,
            threads: 0,
            policy: AdmissionPolicy::default(),
            block_size: DEFAULT_BLOCK_SIZE,
            timeout_ms: None,
            strategy: StrategyConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json).map_err(PersistenceError::from)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self).map_err(PersistenceError::from)?)
    }

    /// A finder with this configuration. The timeout clock starts now.
    pub fn finder(&self) -> PairFinder {
        let mut finder = PairFinder::new(self.k)
            .with_threads(self.threads)
            .with_policy(self.policy)
            .with_block_size(self.block_size);
        if let Some(threshold) = self.similarity_threshold {
            finder = finder.with_threshold(threshold);
        }
        if let Some(ms) = self.timeout_ms {
            finder = finder.with_cancellation(Cancellation::with_timeout(Duration::from_millis(ms)));
        }
        finder
    }

    pub fn strategy(&self) -> Box<dyn CandidateStrategy> {
        self.strategy.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::Scoring;

    #[test]
    fn parses_partial_config() {
        let config = RunConfig::from_json(
            r#"{ "k": 5, "strategy": { "kind": "banded", "slice_lengths": [24, 12], "scoring": "signature" } }"#,
        )
        .unwrap();
        assert_eq!(config.k, 5);
        assert_eq!(config.threads, 0);
        match &config.strategy {
            StrategyConfig::Banded(p) => {
                assert_eq!(p.slice_lengths, vec![24, 12]);
                assert_eq!(p.scoring, Scoring::Signature);
                assert_eq!(p.signature, SignatureParams::default());
            }
            other => panic!("unexpected strategy {other:?}"),
        }
        assert_eq!(config.strategy().name(), "banded");
    }

    #[test]
    fn json_round_trip() {
        let config = RunConfig {
            k: 7,
            similarity_threshold: Some(0.25),
            policy: AdmissionPolicy::Heap,
            strategy: StrategyConfig::Charikar(CharikarParams::new(8, 16).with_seed(3)),
            ..RunConfig::default()
        };
        let back = RunConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
        assert_eq!(back.finder().k(), 7);
    }

    #[test]
    fn unknown_strategy_is_an_error() {
        let err = RunConfig::from_json(r#"{ "strategy": { "kind": "gpu" } }"#).unwrap_err();
        assert!(matches!(err, crate::Error::Persistence(PersistenceError::Serialization(_))));
    }
}
