//! Stratified k-fold cross-validation.
//!
//! Fold allocation follows scikit-learn's `StratifiedKFold`: classes are
//! numbered by first appearance, the sorted class vector is strided by `k`
//! to get per-fold class counts, and each class's trials are dealt to folds
//! in trial order (optionally shuffled within the class).
use ndarray::{ArrayView2, Axis};
use rand::seq::SliceRandom;
use rand::Rng;

use super::classifier::Classifier;
use crate::error::DecodeError;

/// Encode labels as class indices `0..K` in ascending code order.
pub fn encode_labels(labels: &[i64]) -> (Vec<usize>, Vec<i64>) {
    let mut classes = labels.to_vec();
    classes.sort_unstable();
    classes.dedup();
    let encoded = labels
        .iter()
        .map(|l| classes.binary_search(l).unwrap_or_default())
        .collect();
    (encoded, classes)
}

/// Check that stratified `k`-fold splitting is possible for `y`.
pub fn check_folds(y: &[usize], n_classes: usize, k: usize) -> Result<(), DecodeError> {
    if k < 2 {
        return Err(DecodeError::config(format!(
            "cross-validation needs at least 2 folds, got {k}"
        )));
    }
    if n_classes < 2 {
        return Err(DecodeError::config(format!(
            "decoding needs at least 2 classes, got {n_classes}"
        )));
    }
    let mut counts = vec![0usize; n_classes];
    for &c in y {
        counts[c] += 1;
    }
    if let Some((class, &n)) = counts.iter().enumerate().find(|&(_, &n)| n < k) {
        return Err(DecodeError::config(format!(
            "class index {class} has {n} trials, fewer than the {k} cross-validation folds"
        )));
    }
    Ok(())
}

/// Test-fold index for every trial.
///
/// With `shuffle = Some(rng)` the fold labels are permuted within each class.
pub fn stratified_folds<R: Rng + ?Sized>(
    y: &[usize],
    n_classes: usize,
    k: usize,
    mut shuffle: Option<&mut R>,
) -> Result<Vec<usize>, DecodeError> {
    check_folds(y, n_classes, k)?;

    // Number classes by order of first appearance.
    let mut order = vec![usize::MAX; n_classes];
    let mut next = 0;
    for &c in y {
        if order[c] == usize::MAX {
            order[c] = next;
            next += 1;
        }
    }
    let y_enc: Vec<usize> = y.iter().map(|&c| order[c]).collect();
    let mut y_sorted = y_enc.clone();
    y_sorted.sort_unstable();

    // allocation[fold][class]
    let mut allocation = vec![vec![0usize; n_classes]; k];
    for (fold, alloc) in allocation.iter_mut().enumerate() {
        for &c in y_sorted.iter().skip(fold).step_by(k) {
            alloc[c] += 1;
        }
    }

    let mut folds = vec![0usize; y.len()];
    for class in 0..next {
        let mut class_folds: Vec<usize> = (0..k)
            .flat_map(|f| std::iter::repeat(f).take(allocation[f][class]))
            .collect();
        if let Some(rng) = shuffle.as_deref_mut() {
            class_folds.shuffle(rng);
        }
        let members = y_enc.iter().enumerate().filter(|&(_, &c)| c == class).map(|(i, _)| i);
        for (i, f) in members.zip(class_folds) {
            folds[i] = f;
        }
    }
    Ok(folds)
}

/// Mean of the per-fold accuracies of `clf` on `x` / `y`.
///
/// Folds with no test trial are skipped.
pub fn cross_val_accuracy<C: Classifier + ?Sized>(
    clf: &C,
    x: ArrayView2<'_, f64>,
    y: &[usize],
    n_classes: usize,
    folds: &[usize],
    k: usize,
) -> f64 {
    let mut total = 0.0;
    let mut used = 0usize;
    for fold in 0..k {
        let (test, train): (Vec<usize>, Vec<usize>) = (0..y.len()).partition(|&i| folds[i] == fold);
        if test.is_empty() || train.is_empty() {
            continue;
        }
        let x_train = x.select(Axis(0), &train);
        let x_test = x.select(Axis(0), &test);
        let y_train: Vec<usize> = train.iter().map(|&i| y[i]).collect();

        let pred = clf.fit_predict(x_train.view(), &y_train, n_classes, x_test.view());
        let correct = pred.iter().zip(&test).filter(|&(&p, &i)| p == y[i]).count();
        total += correct as f64 / test.len() as f64;
        used += 1;
    }
    if used == 0 {
        0.0
    } else {
        total / used as f64
    }
}
