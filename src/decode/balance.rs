//! Class balancing by random undersampling.
use std::collections::BTreeMap;

use rand::Rng;

use crate::trials::TrialSet;

/// Trial count per class, keyed by label in ascending order.
pub fn class_counts(labels: &[i64]) -> BTreeMap<i64, usize> {
    let mut counts = BTreeMap::new();
    for &l in labels {
        *counts.entry(l).or_insert(0) += 1;
    }
    counts
}

/// Indices of a balanced subset: for each class in ascending label order,
/// `min(class counts)` of its trials drawn uniformly without replacement,
/// in draw order.
pub fn balanced_indices<R: Rng + ?Sized>(labels: &[i64], rng: &mut R) -> Vec<usize> {
    let counts = class_counts(labels);
    let Some(&m) = counts.values().min() else {
        return Vec::new();
    };

    let mut keep = Vec::with_capacity(m * counts.len());
    for &class in counts.keys() {
        let members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|&(_, &l)| l == class)
            .map(|(i, _)| i)
            .collect();
        let picks = rand::seq::index::sample(rng, members.len(), m);
        keep.extend(picks.iter().map(|p| members[p]));
    }
    keep
}

/// Undersample every class down to the size of the smallest one.
pub fn balance_classes<R: Rng + ?Sized>(trials: &TrialSet, rng: &mut R) -> TrialSet {
    trials.select(&balanced_indices(trials.labels(), rng))
}
