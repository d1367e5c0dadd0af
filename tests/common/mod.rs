//! Shared test datasets.
#![allow(dead_code)]

use cellpairs::{CellProfiles, CellSet, GeneSet, SparseMatrix};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Cells drawn around `clusters` random sparse centers.
///
/// Each center has about half of its genes at zero; cells scale every nonzero
/// gene of their center by `1 + noise * N(0, 1)`, so zeros stay zeros and
/// same-cluster correlations are close to 1 for small `noise`.
pub fn clustered(clusters: usize, per_cluster: usize, genes: usize, noise: f32, seed: u64) -> SparseMatrix {
    let mut rng = StdRng::seed_from_u64(seed);
    let centers: Vec<Vec<f32>> = (0..clusters)
        .map(|_| {
            (0..genes)
                .map(|_| {
                    if rng.random::<f32>() < 0.5 {
                        0.0
                    } else {
                        rng.random_range(1.0f32..10.0)
                    }
                })
                .collect()
        })
        .collect();

    let mut matrix = SparseMatrix::new(genes);
    for i in 0..clusters * per_cluster {
        let center = &centers[i % clusters];
        let row: Vec<f32> = center
            .iter()
            .map(|&c| {
                if c == 0.0 {
                    0.0
                } else {
                    let z: f32 = rng.sample(StandardNormal);
                    (c * (1.0 + noise * z)).max(0.01)
                }
            })
            .collect();
        matrix.push_dense(&row).unwrap();
    }
    matrix
}

/// Dense random counts with roughly `density` nonzeros.
pub fn random_dense(cells: usize, genes: usize, density: f64, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..cells)
        .map(|_| {
            (0..genes)
                .map(|_| {
                    if rng.random::<f64>() < density {
                        rng.random_range(1..20) as f32
                    } else {
                        0.0
                    }
                })
                .collect()
        })
        .collect()
}

pub fn full_sets(matrix: &SparseMatrix) -> (GeneSet, CellSet) {
    use cellpairs::SparseVectorView;
    (
        GeneSet::full(matrix.gene_count() as u32),
        CellSet::full(matrix.cell_count() as u32),
    )
}

pub fn profiles(matrix: &SparseMatrix) -> CellProfiles {
    let (genes, cells) = full_sets(matrix);
    CellProfiles::build(matrix, &genes, &cells)
}
