//! Exhaustive search against an independent dense computation.

mod common;

use cellpairs::similarity::dense_correlation;
use cellpairs::{AdmissionPolicy, CellSet, Exhaustive, GeneSet, PairFinder, PairsView, SparseMatrix};

/// Top-k of every cell by brute force over dense rows, ties by partner id.
fn dense_top_k(rows: &[Vec<f32>], k: usize, threshold: f64) -> Vec<Vec<(u32, f64)>> {
    (0..rows.len())
        .map(|i| {
            let mut all: Vec<(u32, f64)> = (0..rows.len())
                .filter(|&j| j != i)
                .map(|j| (j as u32, dense_correlation(&rows[i], &rows[j])))
                .filter(|&(_, s)| s >= threshold)
                .collect();
            all.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
            all.truncate(k);
            all
        })
        .collect()
}

fn check_against_oracle(policy: AdmissionPolicy, threshold: f64) {
    let rows = common::random_dense(20, 10, 0.4, 11);
    let matrix = SparseMatrix::from_dense(&rows).unwrap();
    let k = 4;
    let pairs = PairFinder::new(k)
        .with_threshold(threshold)
        .with_policy(policy)
        .run(&matrix, &GeneSet::full(10), &CellSet::full(20), &Exhaustive)
        .unwrap();
    let expected = dense_top_k(&rows, k, threshold);

    for cell in 0..20u32 {
        let got = pairs.pairs(cell);
        let want = &expected[cell as usize];
        assert_eq!(got.len(), want.len(), "cell {cell}: pair count");
        for (g, w) in got.iter().zip(want) {
            assert!(
                (f64::from(g.similarity) - w.1).abs() < 1e-5,
                "cell {cell}: similarity {} vs {}",
                g.similarity,
                w.1
            );
        }
        // Partners can only differ between tied similarities.
        for (g, w) in got.iter().zip(want) {
            if g.cell_id != w.0 {
                let tied = want.iter().any(|o| o.0 == g.cell_id && (o.1 - w.1).abs() < 1e-5);
                assert!(tied || want.len() == k, "cell {cell}: unexpected partner {}", g.cell_id);
            }
        }
    }
}

#[test]
fn exhaustive_matches_dense_oracle() {
    check_against_oracle(AdmissionPolicy::LinearScan, f64::NEG_INFINITY);
}

#[test]
fn exhaustive_matches_dense_oracle_with_heap_policy() {
    check_against_oracle(AdmissionPolicy::Heap, f64::NEG_INFINITY);
}

#[test]
fn threshold_is_respected() {
    check_against_oracle(AdmissionPolicy::LinearScan, 0.3);
}

#[test]
fn subsets_use_local_ids() {
    let rows = common::random_dense(12, 8, 0.5, 5);
    let matrix = SparseMatrix::from_dense(&rows).unwrap();
    let genes = GeneSet::from_sorted(vec![0, 2, 3, 5, 7]).unwrap();
    let cells = CellSet::from_sorted(vec![1, 4, 5, 9, 11]).unwrap();
    let pairs = PairFinder::new(2).run(&matrix, &genes, &cells, &Exhaustive).unwrap();

    let restricted: Vec<Vec<f32>> = cells
        .iter()
        .map(|c| genes.iter().map(|g| rows[c as usize][g as usize]).collect())
        .collect();
    let expected = dense_top_k(&restricted, 2, f64::NEG_INFINITY);
    for local in 0..5u32 {
        for (g, w) in pairs.pairs(local).iter().zip(&expected[local as usize]) {
            assert!((f64::from(g.similarity) - w.1).abs() < 1e-5);
        }
        assert_eq!(pairs.local_cell_id(pairs.global_cell_id(local)), local);
    }
    assert_eq!(pairs.local_cell_id(0), cellpairs::INVALID_CELL_ID);
}
