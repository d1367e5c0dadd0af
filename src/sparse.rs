//! Sparse expression vectors.
//!
//! The expression store is an external collaborator; all the pair finder needs
//! from it is [`SparseVectorView`]. [`SparseMatrix`] is a compact in-memory
//! implementation (CSR, one row per cell) for callers that already hold the
//! counts in memory, and for tests.

use crate::error::{Error, Result};
use crate::ids::{CellId, GeneId, GeneSet};

/// Read access to sparse expression vectors.
pub trait SparseVectorView: Sync {
    /// Number of cells addressable by global id.
    fn cell_count(&self) -> usize;

    /// Number of genes addressable by global id.
    fn gene_count(&self) -> usize;

    /// Nonzero entries of cell `cell` (global id) restricted to `genes`.
    ///
    /// Gene ids in the output are *local* to `genes` and strictly increasing.
    /// `out` is cleared first.
    fn sparse_vector(&self, cell: CellId, genes: &GeneSet, out: &mut Vec<(GeneId, f32)>);
}

/// CSR matrix of expression values, rows are cells and columns are genes.
#[derive(Debug, Clone, Default)]
pub struct SparseMatrix {
    gene_count: usize,
    row_offsets: Vec<usize>,
    genes: Vec<GeneId>,
    values: Vec<f32>,
}

impl SparseMatrix {
    /// Empty matrix with `gene_count` columns.
    pub fn new(gene_count: usize) -> Self {
        Self {
            gene_count,
            row_offsets: vec![0],
            genes: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Append a cell. Entries may come in any order; zeros are dropped and
    /// repeated genes are rejected.
    pub fn push_cell(&mut self, entries: &[(GeneId, f32)]) -> Result<CellId> {
        let mut row: Vec<(GeneId, f32)> =
            entries.iter().copied().filter(|&(_, v)| v != 0.0).collect();
        row.sort_unstable_by_key(|&(g, _)| g);
        if let Some(w) = row.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(Error::InvalidParameter(format!(
                "gene {} appears twice in the same cell",
                w[0].0
            )));
        }
        if let Some(&(g, _)) = row.last() {
            if g as usize >= self.gene_count {
                return Err(Error::InvalidParameter(format!(
                    "gene {g} out of range for {} genes",
                    self.gene_count
                )));
            }
        }
        if let Some(&(g, v)) = row.iter().find(|(_, v)| !v.is_finite()) {
            return Err(Error::InvalidParameter(format!(
                "non-finite value {v} for gene {g}"
            )));
        }

        let id = self.cell_count() as CellId;
        for (g, v) in row {
            self.genes.push(g);
            self.values.push(v);
        }
        self.row_offsets.push(self.genes.len());
        Ok(id)
    }

    /// Append a cell given as a dense row of length `gene_count`.
    pub fn push_dense(&mut self, row: &[f32]) -> Result<CellId> {
        if row.len() != self.gene_count {
            return Err(Error::InvalidParameter(format!(
                "dense row has {} values, expected {}",
                row.len(),
                self.gene_count
            )));
        }
        let entries: Vec<(GeneId, f32)> = row
            .iter()
            .enumerate()
            .map(|(g, &v)| (g as GeneId, v))
            .collect();
        self.push_cell(&entries)
    }

    /// Build from dense rows.
    pub fn from_dense(rows: &[Vec<f32>]) -> Result<Self> {
        let gene_count = rows.first().map_or(0, Vec::len);
        let mut m = Self::new(gene_count);
        for row in rows {
            m.push_dense(row)?;
        }
        Ok(m)
    }

    /// Nonzero entries of a cell over all genes (global gene ids).
    pub fn row(&self, cell: CellId) -> (&[GeneId], &[f32]) {
        let start = self.row_offsets[cell as usize];
        let end = self.row_offsets[cell as usize + 1];
        (&self.genes[start..end], &self.values[start..end])
    }

    /// Total number of stored nonzeros.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }
}

impl SparseVectorView for SparseMatrix {
    fn cell_count(&self) -> usize {
        self.row_offsets.len() - 1
    }

    fn gene_count(&self) -> usize {
        self.gene_count
    }

    fn sparse_vector(&self, cell: CellId, genes: &GeneSet, out: &mut Vec<(GeneId, f32)>) {
        out.clear();
        let (row_genes, row_values) = self.row(cell);
        let subset = genes.as_slice();

        // Merge the row with the sorted gene subset.
        let (mut i, mut j) = (0, 0);
        while i < row_genes.len() && j < subset.len() {
            match row_genes[i].cmp(&subset[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    out.push((j as GeneId, row_values[i]));
                    i += 1;
                    j += 1;
                }
            }
        }
    }
}
