//! Time-resolved decoding with a permutation null.
//!
//! ```text
//! TrialSet [E, C, T] + labels
//!   │
//!   ├─ labels::filter_triggers    keep requested codes
//!   ├─ labels::combine_labels     merge code pairs into composites
//!   ├─ balance::balance_classes   undersample to the smallest class
//!   │
//!   └─ for every time sample t (rayon)
//!        ├─ scaler::StandardScaler    on X[:, :, t]
//!        ├─ cv::cross_val_accuracy    mean of fold accuracies
//!        └─ N × shuffled labels       → null accuracies
//!             │
//!             └─ summary::summarize   → accuracy, lower, upper
//! ```
//!
//! Every random draw comes from a stream derived from
//! [`DecodingConfig::seed`](crate::DecodingConfig::seed), so results are
//! identical for any thread count.
pub mod balance;
pub mod classifier;
pub mod cv;
pub mod labels;
pub mod scaler;
pub mod summary;

use std::collections::BTreeMap;

use ndarray::{Array2, Array3};
use rand::seq::SliceRandom;
use rayon::prelude::*;

use crate::config::DecodingConfig;
use crate::error::{DecodeError, DecodingDiagnostics, DegenerateFeature};
use crate::rng::{stream_rng, Stream, StreamRng};
use crate::trials::TrialSet;

use classifier::ClassifierConfig;
use scaler::StandardScaler;
pub use summary::DecodingSummary;

/// Everything produced by [`run`].
#[derive(Debug, Clone)]
pub struct DecodingOutcome {
    pub summary: DecodingSummary,
    /// `[samples, permutations]`.
    pub null_distribution: Array2<f64>,
    pub diagnostics: DecodingDiagnostics,
    /// Trials per class after balancing, keyed by (possibly composite) code.
    pub class_counts: BTreeMap<i64, usize>,
}

/// Filter, combine and balance `trials` as requested by `cfg`.
///
/// Fails when the trigger set matches no trial.
pub fn prepare_trials(trials: &TrialSet, cfg: &DecodingConfig) -> Result<TrialSet, DecodeError> {
    let filtered = labels::filter_triggers(trials, &cfg.triggers);
    if filtered.is_empty() {
        return Err(DecodeError::config(format!(
            "trigger set {:?} matches none of the {} trials",
            cfg.triggers,
            trials.n_trials()
        )));
    }
    tracing::debug!(kept = filtered.n_trials(), total = trials.n_trials(), "filtered triggers");

    let combined = if cfg.combine.is_empty() {
        filtered
    } else {
        let y = labels::combine_labels(filtered.labels(), &cfg.combine)?;
        filtered.relabel(y)?
    };

    let mut rng = stream_rng(cfg.seed, Stream::Balance, 0);
    let balanced = balance::balance_classes(&combined, &mut rng);
    tracing::info!(
        trials = balanced.n_trials(),
        classes = ?balance::class_counts(balanced.labels()),
        "balanced classes"
    );
    Ok(balanced)
}

/// Observed cross-validated accuracy per time sample, without permutations.
///
/// `trials` is used as given (no filtering or balancing).
pub fn decode_over_time(
    trials: &TrialSet,
    cfg: &DecodingConfig,
) -> Result<(Vec<f64>, DecodingDiagnostics), DecodeError> {
    let results = run_samples(trials, cfg, 0)?;
    let diagnostics = collect_diagnostics(&results);
    Ok((results.into_iter().map(|r| r.accuracy).collect(), diagnostics))
}

/// Null accuracies (`[samples, cfg.n_permutations]`) from label shuffling.
///
/// `trials` is used as given (no filtering or balancing).
pub fn permutation_null(trials: &TrialSet, cfg: &DecodingConfig) -> Result<Array2<f64>, DecodeError> {
    let results = run_samples(trials, cfg, cfg.n_permutations)?;
    Ok(null_matrix(&results, cfg.n_permutations))
}

/// Full pipeline: prepare trials, decode every time sample, build the
/// permutation null and summarize it.
pub fn run(trials: &TrialSet, cfg: &DecodingConfig) -> Result<DecodingOutcome, DecodeError> {
    cfg.validate()?;
    if cfg.n_permutations == 0 {
        return Err(DecodeError::config("at least one permutation is needed for the null band"));
    }

    let prepared = prepare_trials(trials, cfg)?;
    let results = run_samples(&prepared, cfg, cfg.n_permutations)?;

    let accuracy: Vec<f64> = results.iter().map(|r| r.accuracy).collect();
    let null_distribution = null_matrix(&results, cfg.n_permutations);
    let diagnostics = collect_diagnostics(&results);
    let summary = summary::summarize(
        prepared.times(),
        &accuracy,
        &null_distribution,
        cfg.band[0],
        cfg.band[1],
    );

    if let Some((t, acc)) = summary.peak() {
        tracing::info!(
            peak_time = summary.times[t],
            peak_accuracy = acc,
            above_band = summary.above_band().len(),
            "decoding finished"
        );
    }

    Ok(DecodingOutcome {
        summary,
        null_distribution,
        diagnostics,
        class_counts: balance::class_counts(prepared.labels()),
    })
}

// ── Per-sample loop ───────────────────────────────────────────────────────

struct SampleResult {
    accuracy: f64,
    null: Vec<f64>,
    degenerate: Vec<usize>,
}

/// Shared, read-only state of one decoding run.
struct SampleContext<'a> {
    data: &'a Array3<f64>,
    y: Vec<usize>,
    n_classes: usize,
    folds: Vec<usize>,
    n_folds: usize,
    shuffle_folds: bool,
    classifier: &'a ClassifierConfig,
    seed: u64,
    n_permutations: usize,
}

impl SampleContext<'_> {
    fn decode_sample(&self, t: usize) -> Result<SampleResult, DecodeError> {
        let slice = self.data.index_axis(ndarray::Axis(2), t);
        let (scaler, x) = StandardScaler::fit_transform(slice);

        let accuracy = cv::cross_val_accuracy(
            self.classifier,
            x.view(),
            &self.y,
            self.n_classes,
            &self.folds,
            self.n_folds,
        );

        let mut rng = stream_rng(self.seed, Stream::Permutation, t as u64);
        let mut y_perm = self.y.clone();
        let mut null = Vec::with_capacity(self.n_permutations);
        for _ in 0..self.n_permutations {
            y_perm.shuffle(&mut rng);
            let folds = if self.shuffle_folds {
                cv::stratified_folds(&y_perm, self.n_classes, self.n_folds, Some(&mut rng))?
            } else {
                cv::stratified_folds::<StreamRng>(&y_perm, self.n_classes, self.n_folds, None)?
            };
            null.push(cv::cross_val_accuracy(
                self.classifier,
                x.view(),
                &y_perm,
                self.n_classes,
                &folds,
                self.n_folds,
            ));
        }

        tracing::trace!(sample = t, accuracy, "decoded sample");
        Ok(SampleResult {
            accuracy,
            null,
            degenerate: scaler.degenerate,
        })
    }
}

fn run_samples(
    trials: &TrialSet,
    cfg: &DecodingConfig,
    n_permutations: usize,
) -> Result<Vec<SampleResult>, DecodeError> {
    cfg.classifier.validate().map_err(DecodeError::config)?;
    let (y, classes) = cv::encode_labels(trials.labels());
    let n_classes = classes.len();
    let folds = if cfg.shuffle_folds {
        let mut rng = stream_rng(cfg.seed, Stream::Folds, 0);
        cv::stratified_folds(&y, n_classes, cfg.n_folds, Some(&mut rng))?
    } else {
        cv::stratified_folds::<StreamRng>(&y, n_classes, cfg.n_folds, None)?
    };

    let ctx = SampleContext {
        data: trials.data(),
        y,
        n_classes,
        folds,
        n_folds: cfg.n_folds,
        shuffle_folds: cfg.shuffle_folds,
        classifier: &cfg.classifier,
        seed: cfg.seed,
        n_permutations,
    };
    let n_samples = trials.n_samples();
    tracing::debug!(
        samples = n_samples,
        channels = trials.n_channels(),
        n_classes,
        n_permutations,
        "decoding over time"
    );

    let sweep = || -> Result<Vec<SampleResult>, DecodeError> {
        (0..n_samples).into_par_iter().map(|t| ctx.decode_sample(t)).collect()
    };

    match cfg.n_jobs {
        0 => sweep(),
        1 => (0..n_samples).map(|t| ctx.decode_sample(t)).collect(),
        n => rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build()
            .map_err(|e| DecodeError::config(format!("cannot start {n} worker threads: {e}")))?
            .install(sweep),
    }
}

fn null_matrix(results: &[SampleResult], n_permutations: usize) -> Array2<f64> {
    let mut null = Array2::<f64>::zeros((results.len(), n_permutations));
    for (mut row, r) in null.rows_mut().into_iter().zip(results) {
        row.assign(&ndarray::ArrayView1::from(&r.null));
    }
    null
}

fn collect_diagnostics(results: &[SampleResult]) -> DecodingDiagnostics {
    let degenerate: Vec<DegenerateFeature> = results
        .iter()
        .enumerate()
        .flat_map(|(sample, r)| {
            r.degenerate
                .iter()
                .map(move |&channel| DegenerateFeature { sample, channel })
        })
        .collect();
    let diagnostics = DecodingDiagnostics { degenerate };
    if diagnostics.has_degenerate_features() {
        tracing::warn!(
            features = diagnostics.degenerate.len(),
            samples = diagnostics.degenerate_samples().len(),
            "zero-variance channels were centred to zero and carry no signal"
        );
    }
    diagnostics
}
