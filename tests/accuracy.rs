//! Accuracy of signature-based similarity.

mod common;

use cellpairs::audit::{self, PairSampling};
use cellpairs::{Exhaustive, LshExhaustive, PairFinder, PairsView, SignatureParams, Signatures};

const SEEDS: [u64; 5] = [1, 2, 3, 4, 5];

#[test]
fn lsh_exhaustive_rms_error_at_1024_bits() {
    let matrix = common::clustered(4, 8, 60, 0.1, 17);
    let (genes, cells) = common::full_sets(&matrix);
    let profiles = common::profiles(&matrix);

    let mut total = 0.0;
    for seed in SEEDS {
        let strategy = LshExhaustive::new(SignatureParams::new(1024, seed));
        let pairs = PairFinder::new(5).run(&matrix, &genes, &cells, &strategy).unwrap();

        let mut sum_sq = 0.0;
        let mut n = 0usize;
        for cell0 in 0..pairs.cell_count() as u32 {
            for p in pairs.pairs(cell0).iter() {
                let err = f64::from(p.similarity) - profiles.similarity(cell0, p.cell_id);
                sum_sq += err * err;
                n += 1;
            }
        }
        assert_eq!(n, 32 * 5);
        total += (sum_sq / n as f64).sqrt();
    }
    let rms = total / SEEDS.len() as f64;
    assert!(rms <= 0.05, "mean RMS error {rms}");
}

#[test]
fn stored_pair_audit_of_signature_scored_store() {
    let matrix = common::clustered(4, 8, 60, 0.1, 17);
    let (genes, cells) = common::full_sets(&matrix);
    let profiles = common::profiles(&matrix);

    let strategy = LshExhaustive::new(SignatureParams::new(1024, 3));
    let pairs = PairFinder::new(5).run(&matrix, &genes, &cells, &strategy).unwrap();
    let stats = audit::stored_pair_accuracy(&pairs, &profiles, PairSampling::all()).unwrap();
    assert_eq!(stats.count, pairs.total_pairs());
    assert!(stats.rms > 0.0 && stats.rms <= 0.05, "RMS error {}", stats.rms);

    let sampled = audit::stored_pair_accuracy(&pairs, &profiles, PairSampling::downsample(0.5, 4)).unwrap();
    assert!(sampled.count > 0 && sampled.count < stats.count);
    let again = audit::stored_pair_accuracy(&pairs, &profiles, PairSampling::downsample(0.5, 4)).unwrap();
    assert_eq!(sampled, again);

    let exact = PairFinder::new(5).run(&matrix, &genes, &cells, &Exhaustive).unwrap();
    let stats = audit::stored_pair_accuracy(&exact, &profiles, PairSampling::all()).unwrap();
    assert_eq!(stats.count, exact.total_pairs());
    assert!(stats.max_abs < 1e-6, "exact store off by {}", stats.max_abs);
}

#[test]
fn signature_audit_over_all_pairs() {
    let matrix = common::clustered(4, 5, 50, 0.1, 3);
    let profiles = common::profiles(&matrix);

    let mut total = 0.0;
    for seed in SEEDS {
        let signatures = Signatures::compute(&profiles, SignatureParams::new(1024, seed)).unwrap();
        let stats = audit::signature_accuracy(&profiles, &signatures, PairSampling::all()).unwrap();
        assert_eq!(stats.count, 20 * 19 / 2);
        total += stats.rms;
    }
    // Uncorrelated pairs are the worst case, with a standard deviation of
    // pi / 2 / sqrt(1024) ~ 0.049.
    let rms = total / SEEDS.len() as f64;
    assert!(rms < 0.06, "mean RMS error {rms}");
}

#[test]
fn downsampled_audit_is_deterministic() {
    let matrix = common::clustered(3, 10, 40, 0.2, 8);
    let profiles = common::profiles(&matrix);
    let signatures = Signatures::compute(&profiles, SignatureParams::new(256, 1)).unwrap();
    let a = audit::signature_accuracy(&profiles, &signatures, PairSampling::downsample(0.3, 9)).unwrap();
    let b = audit::signature_accuracy(&profiles, &signatures, PairSampling::downsample(0.3, 9)).unwrap();
    assert_eq!(a, b);
    assert!(a.count > 0 && a.count < 30 * 29 / 2);
}

#[test]
fn signatures_are_balanced_and_distinct() {
    let matrix = common::clustered(4, 10, 60, 0.3, 21);
    let profiles = common::profiles(&matrix);
    let signatures = Signatures::compute(&profiles, SignatureParams::new(512, 4)).unwrap();
    let summary = audit::inspect_signatures(&signatures);
    assert_eq!(summary.one_frequency.len(), 512);
    assert_eq!(summary.distinct_signatures, 40);
    let mean = summary.one_frequency.iter().sum::<f64>() / 512.0;
    assert!((mean - 0.5).abs() < 0.15, "mean bit frequency {mean}");
}
