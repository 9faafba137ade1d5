mod common;
use common::{indexed_trials, repeat_labels, separable_trials};
use megdec::decode::{self, balance, labels, prepare_trials};
use megdec::rng::{stream_rng, Stream};
use megdec::{ClassifierConfig, DecodeError, DecodingConfig, TrialSet};
use ndarray::Array3;
use std::collections::BTreeSet;

fn two_class_config() -> DecodingConfig {
    DecodingConfig {
        triggers: vec![1, 2],
        n_folds: 5,
        n_permutations: 100,
        seed: 7,
        ..DecodingConfig::default()
    }
}

// ── End-to-end ────────────────────────────────────────────────────────────────

#[test]
fn separable_channel_is_decoded_at_every_sample() {
    let y = repeat_labels(&[(1, 20), (2, 20)]);
    let trials = separable_trials(&y, 1, 10, 5, 3);
    let out = decode::run(&trials, &two_class_config()).unwrap();

    assert_eq!(out.summary.len(), 5);
    assert_eq!(out.null_distribution.dim(), (5, 100));
    for t in 0..5 {
        let acc = out.summary.accuracy[t];
        assert!(acc >= 0.9, "sample {t}: accuracy {acc}");
        let (lo, hi) = (out.summary.lower[t], out.summary.upper[t]);
        assert!(lo < 0.5 && 0.5 < hi, "sample {t}: null band [{lo}, {hi}] misses chance");
        assert!(acc > hi);
    }
    assert_eq!(out.summary.above_band(), vec![0, 1, 2, 3, 4]);
    assert_eq!(out.class_counts.values().copied().collect::<Vec<_>>(), vec![20, 20]);
}

#[test]
fn nearest_centroid_also_decodes() {
    let y = repeat_labels(&[(1, 20), (2, 20)]);
    let trials = separable_trials(&y, 1, 10, 3, 11);
    let cfg = DecodingConfig {
        classifier: ClassifierConfig::NearestCentroid,
        n_permutations: 20,
        ..two_class_config()
    };
    let out = decode::run(&trials, &cfg).unwrap();
    assert!(out.summary.accuracy.iter().all(|&a| a >= 0.9));
}

#[test]
fn accuracies_lie_in_unit_interval() {
    let y = repeat_labels(&[(1, 12), (2, 12), (3, 12)]);
    let trials = indexed_trials(&y, 4, 4, 5);
    let cfg = DecodingConfig {
        triggers: vec![1, 2, 3],
        n_folds: 3,
        n_permutations: 30,
        ..DecodingConfig::default()
    };
    let out = decode::run(&trials, &cfg).unwrap();
    assert!(out.summary.accuracy.iter().all(|a| (0.0..=1.0).contains(a)));
    assert!(out.null_distribution.iter().all(|a| (0.0..=1.0).contains(a)));
    assert!(out.summary.p_values.iter().all(|&p| p > 0.0 && p <= 1.0));
    for t in 0..out.summary.len() {
        assert!(out.summary.lower[t] <= out.summary.upper[t]);
    }
}

// ── Reproducibility ──────────────────────────────────────────────────────────

#[test]
fn fixed_seed_is_reproducible() {
    let y = repeat_labels(&[(1, 25), (2, 15)]);
    let trials = indexed_trials(&y, 6, 4, 9);
    let cfg = DecodingConfig { n_permutations: 25, shuffle_folds: true, ..two_class_config() };

    let a = decode::run(&trials, &cfg).unwrap();
    let b = decode::run(&trials, &cfg).unwrap();
    assert_eq!(a.summary.accuracy, b.summary.accuracy);
    assert_eq!(a.null_distribution, b.null_distribution);

    let pa = prepare_trials(&trials, &cfg).unwrap();
    let pb = prepare_trials(&trials, &cfg).unwrap();
    assert_eq!(pa, pb);
}

#[test]
fn thread_count_does_not_change_results() {
    let y = repeat_labels(&[(1, 20), (2, 20)]);
    let trials = indexed_trials(&y, 5, 6, 21);
    let base = DecodingConfig { n_permutations: 15, ..two_class_config() };

    let sequential = decode::run(&trials, &DecodingConfig { n_jobs: 1, ..base.clone() }).unwrap();
    for n_jobs in [0, 3] {
        let parallel = decode::run(&trials, &DecodingConfig { n_jobs, ..base.clone() }).unwrap();
        assert_eq!(sequential.summary.accuracy, parallel.summary.accuracy, "n_jobs = {n_jobs}");
        assert_eq!(sequential.null_distribution, parallel.null_distribution, "n_jobs = {n_jobs}");
    }
}

#[test]
fn different_seeds_give_different_nulls() {
    let y = repeat_labels(&[(1, 20), (2, 20)]);
    let trials = indexed_trials(&y, 5, 2, 2);
    let a = decode::run(&trials, &DecodingConfig { n_permutations: 20, ..two_class_config() }).unwrap();
    let b = decode::run(&trials, &DecodingConfig { n_permutations: 20, seed: 8, ..two_class_config() }).unwrap();
    assert_ne!(a.null_distribution, b.null_distribution);
}

// ── Label handling ───────────────────────────────────────────────────────────

#[test]
fn unequal_classes_are_undersampled_without_replacement() {
    let y = repeat_labels(&[(1, 30), (2, 10)]);
    let trials = indexed_trials(&y, 3, 2, 4);
    for seed in 0..20 {
        let cfg = DecodingConfig { seed, ..two_class_config() };
        let prepared = prepare_trials(&trials, &cfg).unwrap();
        assert_eq!(prepared.n_trials(), 20);
        assert_eq!(prepared.labels().len(), prepared.data().dim().0);

        let counts = balance::class_counts(prepared.labels());
        assert_eq!(counts.get(&1), Some(&10));
        assert_eq!(counts.get(&2), Some(&10));

        let origin: BTreeSet<usize> = (0..prepared.n_trials())
            .map(|i| prepared.data()[[i, 0, 0]] as usize)
            .collect();
        assert_eq!(origin.len(), 20, "seed {seed}: a trial was drawn twice");
        for i in 0..prepared.n_trials() {
            let src = prepared.data()[[i, 0, 0]] as usize;
            assert_eq!(prepared.labels()[i], y[src], "trial {src} lost its label");
        }
    }
}

#[test]
fn balancing_any_seed_equalizes_every_class() {
    let y = repeat_labels(&[(4, 7), (5, 13), (6, 9), (7, 21)]);
    let trials = indexed_trials(&y, 2, 1, 0);
    for seed in 0..50 {
        let mut rng = stream_rng(seed, Stream::Balance, 0);
        let out = balance::balance_classes(&trials, &mut rng);
        let counts = balance::class_counts(out.labels());
        assert!(counts.values().all(|&n| n == 7), "seed {seed}: {counts:?}");
    }
}

#[test]
fn combining_merges_pairs_and_keeps_the_rest() {
    assert_eq!(
        labels::combine_labels(&[11, 21, 12, 22], &[[11, 21]]).unwrap(),
        vec![1121, 1121, 12, 22]
    );

    let y = repeat_labels(&[(11, 10), (21, 10), (12, 20), (99, 5)]);
    let trials = indexed_trials(&y, 3, 2, 6);
    let cfg = DecodingConfig {
        triggers: vec![11, 21, 12],
        combine: vec![[11, 21]],
        ..DecodingConfig::default()
    };
    let prepared = prepare_trials(&trials, &cfg).unwrap();
    let counts = balance::class_counts(prepared.labels());
    assert_eq!(counts.into_iter().collect::<Vec<_>>(), vec![(12, 20), (1121, 20)]);
}

#[test]
fn untouched_labels_pass_through_combination() {
    let y = vec![3, 11, 7, 21, 3, 12];
    let out = labels::combine_labels(&y, &[[11, 21]]).unwrap();
    for (a, b) in y.iter().zip(&out) {
        if ![11, 21].contains(a) {
            assert_eq!(a, b);
        }
    }
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[test]
fn trigger_set_matching_nothing_is_a_configuration_error() {
    let y = repeat_labels(&[(1, 20), (2, 20)]);
    let trials = indexed_trials(&y, 2, 2, 1);
    let cfg = DecodingConfig { triggers: vec![99], ..two_class_config() };
    assert!(matches!(decode::run(&trials, &cfg), Err(DecodeError::Configuration { .. })));
}

#[test]
fn too_few_trials_for_the_folds() {
    let y = repeat_labels(&[(1, 4), (2, 4)]);
    let trials = indexed_trials(&y, 2, 2, 1);
    let err = decode::run(&trials, &two_class_config()).unwrap_err();
    assert!(matches!(err, DecodeError::Configuration { .. }), "{err}");
}

#[test]
fn single_class_is_rejected() {
    let y = repeat_labels(&[(1, 20), (2, 20)]);
    let trials = indexed_trials(&y, 2, 2, 1);
    let cfg = DecodingConfig { triggers: vec![1], ..two_class_config() };
    assert!(matches!(decode::run(&trials, &cfg), Err(DecodeError::Configuration { .. })));
}

#[test]
fn zero_permutations_are_rejected() {
    let y = repeat_labels(&[(1, 20), (2, 20)]);
    let trials = indexed_trials(&y, 2, 2, 1);
    let cfg = DecodingConfig { n_permutations: 0, ..two_class_config() };
    assert!(decode::run(&trials, &cfg).is_err());
}

#[test]
fn label_count_must_match_trials() {
    let err = TrialSet::new(Array3::zeros((3, 2, 4)), vec![1, 2], vec![0.0; 4]).unwrap_err();
    assert!(matches!(err, DecodeError::ShapeMismatch { .. }));
    let err = TrialSet::new(Array3::zeros((2, 2, 4)), vec![1, 2], vec![0.0; 3]).unwrap_err();
    assert!(matches!(err, DecodeError::ShapeMismatch { .. }));
}

// ── Diagnostics ──────────────────────────────────────────────────────────────

#[test]
fn constant_channel_is_reported_not_fatal() {
    let y = repeat_labels(&[(1, 20), (2, 20)]);
    let trials = separable_trials(&y, 1, 4, 2, 5);
    let (mut data, labels, times) = trials.into_parts();
    data.index_axis_mut(ndarray::Axis(1), 2).fill(3.0);
    let trials = TrialSet::new(data, labels, times).unwrap();

    let cfg = DecodingConfig { n_permutations: 5, ..two_class_config() };
    let out = decode::run(&trials, &cfg).unwrap();
    assert!(out.diagnostics.has_degenerate_features());
    assert_eq!(out.diagnostics.degenerate_samples(), vec![0, 1]);
    assert!(out.diagnostics.degenerate.iter().all(|d| d.channel == 2));
    assert!(out.summary.accuracy.iter().all(|&a| a >= 0.9));
}
