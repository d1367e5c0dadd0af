//! Property-based tests for the top-k store and id subsets.
//!
//! These hold regardless of insertion order:
//! - each list holds the best `min(k, offered)` similarities
//! - the lowest-similarity bookkeeping tracks the true minimum
//! - sorted lists are non-increasing and duplicate-free

use std::collections::HashSet;

use cellpairs::{AdmissionPolicy, CellId, CellSet, GeneSet, IdSubset, PairsView, SimilarPairs};
use proptest::prelude::*;

const CELLS: u32 = 6;

fn policy() -> impl Strategy<Value = AdmissionPolicy> {
    prop_oneof![Just(AdmissionPolicy::LinearScan), Just(AdmissionPolicy::Heap)]
}

/// Offers `(owner, partner, similarity)` with each (owner, partner) at most once.
fn offers() -> impl Strategy<Value = Vec<(CellId, CellId, f64)>> {
    prop::collection::vec((0..CELLS, 0..CELLS, -1000i32..=1000), 0..60).prop_map(|raw| {
        let mut seen = HashSet::new();
        raw.into_iter()
            .filter(|&(a, b, _)| a != b && seen.insert((a, b)))
            .map(|(a, b, s)| (a, b, f64::from(s) / 1000.0))
            .collect()
    })
}

fn store(k: usize, policy: AdmissionPolicy) -> SimilarPairs {
    SimilarPairs::new(k, GeneSet::full(4), CellSet::full(CELLS), policy).unwrap()
}

mod store_props {
    use super::*;

    proptest! {
        #[test]
        fn keeps_the_best_k(k in 1usize..5, policy in policy(), offers in offers()) {
            let mut s = store(k, policy);
            for &(a, b, sim) in &offers {
                s.add_unsymmetric(a, b, sim);
            }
            s.sort();

            for cell in 0..CELLS {
                let mut expected: Vec<f32> = offers
                    .iter()
                    .filter(|o| o.0 == cell)
                    .map(|o| o.2 as f32)
                    .collect();
                expected.sort_by(|a, b| b.total_cmp(a));
                expected.truncate(k);

                let got: Vec<f32> = s.pairs(cell).iter().map(|p| p.similarity).collect();
                prop_assert_eq!(got, expected);
            }
        }

        #[test]
        fn lowest_tracks_minimum(k in 1usize..5, policy in policy(), offers in offers()) {
            let mut s = store(k, policy);
            for &(a, b, sim) in &offers {
                s.add_unsymmetric(a, b, sim);
                let info = s.cell_info(a);
                let region = s.pairs_of(a);
                prop_assert!(info.used_count as usize <= k);
                prop_assert_eq!(region.len(), info.used_count as usize);
                let min = region.iter().map(|p| p.similarity).fold(f32::INFINITY, f32::min);
                prop_assert_eq!(info.lowest_similarity, min);
                prop_assert_eq!(region[info.lowest_similarity_index as usize].similarity, min);
            }
        }

        #[test]
        fn sorted_lists_are_consistent(k in 1usize..5, policy in policy(), offers in offers()) {
            let mut s = store(k, policy);
            for &(a, b, sim) in &offers {
                s.add_unsymmetric(a, b, sim);
            }
            s.sort();

            for cell in 0..CELLS {
                let pairs = s.pairs(cell);
                prop_assert!(pairs.windows(2).all(|w| w[0].similarity >= w[1].similarity));
                let partners: HashSet<CellId> = pairs.iter().map(|p| p.cell_id).collect();
                prop_assert_eq!(partners.len(), pairs.len());
                for other in 0..CELLS {
                    prop_assert_eq!(s.exists(cell, other), partners.contains(&other));
                }
                prop_assert!(!s.exists(cell, cell));
                if let Some(last) = pairs.last() {
                    prop_assert_eq!(s.cell_info(cell).lowest_similarity, last.similarity);
                }
            }
            prop_assert!(s.total_pairs() <= CELLS as usize * k);
        }

        #[test]
        fn linear_scan_ignores_repeated_partners(k in 1usize..5, repeats in 1usize..4, offers in offers()) {
            let mut once = store(k, AdmissionPolicy::LinearScan);
            let mut repeated = store(k, AdmissionPolicy::LinearScan);
            for &(a, b, sim) in &offers {
                once.add_unsymmetric(a, b, sim);
                for _ in 0..repeats {
                    repeated.add_unsymmetric(a, b, sim);
                }
            }
            once.sort();
            repeated.sort();
            for cell in 0..CELLS {
                prop_assert_eq!(once.pairs(cell), repeated.pairs(cell));
            }
        }
    }
}

mod subset_props {
    use super::*;

    proptest! {
        #[test]
        fn local_global_round_trip(ids in prop::collection::btree_set(0u32..10_000, 0..50)) {
            let ids: Vec<u32> = ids.into_iter().collect();
            let subset = IdSubset::from_sorted(ids.clone()).unwrap();
            prop_assert_eq!(subset.len(), ids.len());
            for (local, &global) in ids.iter().enumerate() {
                prop_assert_eq!(subset.global_id(local as u32), global);
                prop_assert_eq!(subset.local_id(global), Some(local as u32));
            }
            for id in [0u32, 1, 4_999, 9_999, 10_000] {
                prop_assert_eq!(subset.contains(id), ids.binary_search(&id).is_ok());
            }
        }

        #[test]
        fn unsorted_input_is_normalized(ids in prop::collection::vec(0u32..500, 0..40)) {
            let subset = IdSubset::from_unsorted(ids.clone()).unwrap();
            let mut expected = ids;
            expected.sort_unstable();
            expected.dedup();
            prop_assert_eq!(subset.as_slice(), expected.as_slice());
        }
    }
}
