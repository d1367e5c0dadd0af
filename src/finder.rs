//! Run a candidate strategy end to end.

use std::time::Instant;

use tracing::{debug, info};

use crate::cancel::Cancellation;
use crate::error::{Error, Result};
use crate::hash::Signatures;
use crate::ids::{CellSet, GeneSet};
use crate::pairs::{AdmissionPolicy, PairsView, SimilarPairs};
use crate::similarity::CellProfiles;
use crate::sparse::SparseVectorView;
use crate::strategy::{CandidateStrategy, RunContext, DEFAULT_BLOCK_SIZE};

/// Finds the top-k most similar partners of every cell in a cell set.
///
/// ```no_run
/// use cellpairs::{CellSet, Exhaustive, GeneSet, PairFinder, SparseMatrix};
///
/// let matrix = SparseMatrix::from_dense(&[vec![1.0, 0.0, 2.0], vec![2.0, 0.0, 4.0], vec![0.0, 3.0, 0.0]])?;
/// let pairs = PairFinder::new(2)
///     .with_threshold(0.5)
///     .run(&matrix, &GeneSet::full(3), &CellSet::full(3), &Exhaustive)?;
/// # Ok::<(), cellpairs::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct PairFinder {
    k: usize,
    threshold: f64,
    threads: usize,
    policy: AdmissionPolicy,
    block_size: usize,
    cancellation: Cancellation,
}

impl PairFinder {
    /// Keep up to `k` partners per cell, no threshold, default thread count.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            threshold: f64::NEG_INFINITY,
            threads: 0,
            policy: AdmissionPolicy::default(),
            block_size: DEFAULT_BLOCK_SIZE,
            cancellation: Cancellation::new(),
        }
    }

    /// Minimum similarity for a pair to be stored.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Worker threads. `0` lets rayon decide.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_policy(mut self, policy: AdmissionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn cancellation(&self) -> &Cancellation {
        &self.cancellation
    }

    /// Load profiles from `view` and run `strategy`, generating signatures
    /// if it needs them.
    pub fn run<V>(&self, view: &V, genes: &GeneSet, cells: &CellSet, strategy: &dyn CandidateStrategy) -> Result<SimilarPairs>
    where
        V: SparseVectorView + ?Sized,
    {
        self.run_with_signatures(view, genes, cells, strategy, None)
    }

    /// Like [`run`](Self::run), reusing precomputed signatures. They must have
    /// been computed for the same cells with the parameters the strategy asks
    /// for.
    pub fn run_with_signatures<V>(
        &self,
        view: &V,
        genes: &GeneSet,
        cells: &CellSet,
        strategy: &dyn CandidateStrategy,
        signatures: Option<&Signatures>,
    ) -> Result<SimilarPairs>
    where
        V: SparseVectorView + ?Sized,
    {
        self.validate(genes, cells, strategy)?;
        check_range("gene", genes, view.gene_count())?;
        check_range("cell", cells, view.cell_count())?;

        let pool = self.pool()?;
        pool.install(|| {
            let t0 = Instant::now();
            let profiles = CellProfiles::build(view, genes, cells);
            debug!(
                cells = profiles.cell_count(),
                mean_nnz = profiles.mean_density(),
                elapsed_ms = t0.elapsed().as_millis() as u64,
                "loaded expression profiles"
            );
            self.execute(&profiles, genes, cells, strategy, signatures)
        })
    }

    /// Run on profiles that are already loaded.
    pub fn run_profiles(
        &self,
        profiles: &CellProfiles,
        genes: &GeneSet,
        cells: &CellSet,
        strategy: &dyn CandidateStrategy,
        signatures: Option<&Signatures>,
    ) -> Result<SimilarPairs> {
        self.validate(genes, cells, strategy)?;
        if profiles.cell_count() != cells.len() || profiles.gene_count() != genes.len() {
            return Err(Error::SubsetMismatch(format!(
                "profiles are {} cells x {} genes, subsets are {} x {}",
                profiles.cell_count(),
                profiles.gene_count(),
                cells.len(),
                genes.len()
            )));
        }
        self.pool()?
            .install(|| self.execute(profiles, genes, cells, strategy, signatures))
    }

    fn validate(&self, genes: &GeneSet, cells: &CellSet, strategy: &dyn CandidateStrategy) -> Result<()> {
        if self.k == 0 {
            return Err(Error::InvalidParameter("k must be >= 1".to_string()));
        }
        if cells.len() < 2 {
            return Err(Error::TooFewCells { count: cells.len() });
        }
        if genes.is_empty() {
            return Err(Error::InvalidParameter("gene set is empty".to_string()));
        }
        if self.threshold.is_nan() {
            return Err(Error::InvalidParameter("similarity threshold is NaN".to_string()));
        }
        strategy.validate()
    }

    fn pool(&self) -> Result<rayon::ThreadPool> {
        Ok(rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()?)
    }

    fn execute(
        &self,
        profiles: &CellProfiles,
        genes: &GeneSet,
        cells: &CellSet,
        strategy: &dyn CandidateStrategy,
        signatures: Option<&Signatures>,
    ) -> Result<SimilarPairs> {
        let start = Instant::now();
        info!(
            strategy = strategy.name(),
            cells = cells.len(),
            genes = genes.len(),
            k = self.k,
            threshold = self.threshold,
            threads = rayon::current_num_threads(),
            "finding similar pairs"
        );

        let generated;
        let signatures = match (strategy.signature_params(), signatures) {
            (None, _) => None,
            (Some(params), Some(given)) => {
                if given.params() != params || given.cell_count() != profiles.cell_count() {
                    return Err(Error::InvalidParameter(format!(
                        "signatures {:?} over {} cells do not match requested {:?} over {} cells",
                        given.params(),
                        given.cell_count(),
                        params,
                        profiles.cell_count()
                    )));
                }
                Some(given)
            }
            (Some(params), None) => {
                let t0 = Instant::now();
                generated = Signatures::compute(profiles, params)?;
                debug!(
                    lsh_count = params.lsh_count,
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    "generated signatures"
                );
                Some(&generated)
            }
        };

        let mut store = SimilarPairs::new(self.k, genes.clone(), cells.clone(), self.policy)?;
        let mut ctx = RunContext::new(profiles, &self.cancellation)
            .with_threshold(self.threshold)
            .with_block_size(self.block_size);
        if let Some(signatures) = signatures {
            ctx = ctx.with_signatures(signatures);
        }

        let t0 = Instant::now();
        strategy.populate(&ctx, &mut store)?;
        debug!(elapsed_ms = t0.elapsed().as_millis() as u64, "populated similar pairs");

        store.sort();
        info!(
            strategy = strategy.name(),
            pairs = store.total_pairs(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "similar pairs complete"
        );
        Ok(store)
    }
}

fn check_range(what: &str, set: &crate::ids::IdSubset, count: usize) -> Result<()> {
    match set.as_slice().last() {
        Some(&max) if max as usize >= count => Err(Error::InvalidParameter(format!(
            "{what} id {max} out of range for {count} {what}s"
        ))),
        _ => Ok(()),
    }
}
