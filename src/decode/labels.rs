//! Trigger selection and label combination.
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::error::DecodeError;
use crate::trials::TrialSet;

/// Indices of the trials whose label is in `triggers`, in original order.
pub fn trigger_indices(labels: &[i64], triggers: &[i64]) -> Vec<usize> {
    let accepted: BTreeSet<i64> = triggers.iter().copied().collect();
    labels
        .iter()
        .enumerate()
        .filter(|(_, l)| accepted.contains(*l))
        .map(|(i, _)| i)
        .collect()
}

/// Keep only the trials labelled with one of `triggers`.
///
/// Order is preserved. No match yields an empty set, not an error.
pub fn filter_triggers(trials: &TrialSet, triggers: &[i64]) -> TrialSet {
    trials.select(&trigger_indices(trials.labels(), triggers))
}

/// Composite code of a combine pair: decimal digits of `a` followed by those
/// of `b`, e.g. `(11, 21) -> 1121`.
pub fn composite_code(a: i64, b: i64) -> Result<i64, DecodeError> {
    let digits = format!("{a}{b}");
    digits.parse::<i64>().map_err(|_| {
        DecodeError::config(format!(
            "combine pair [{a}, {b}] does not form a valid composite code ({digits:?})"
        ))
    })
}

/// Map from original code to composite code for every code in `pairs`.
///
/// A code may belong to one pair only, and only once. Two pairs may not
/// share a composite code, e.g. `[1, 12]` and `[11, 2]` both give `112`.
pub fn combine_map(pairs: &[[i64; 2]]) -> Result<HashMap<i64, i64>, DecodeError> {
    let mut map = HashMap::with_capacity(pairs.len() * 2);
    let mut issued = HashSet::with_capacity(pairs.len());
    for &[a, b] in pairs {
        if a == b {
            return Err(DecodeError::config(format!(
                "combine pair [{a}, {b}] repeats the same code"
            )));
        }
        let composite = composite_code(a, b)?;
        if !issued.insert(composite) {
            return Err(DecodeError::config(format!(
                "combine pair [{a}, {b}] gives composite code {composite}, already used by another pair"
            )));
        }
        for code in [a, b] {
            if map.insert(code, composite).is_some() {
                return Err(DecodeError::config(format!(
                    "label {code} appears in more than one combine pair"
                )));
            }
        }
    }
    Ok(map)
}

/// Replace every label that belongs to a combine pair by the pair's
/// composite code. Labels outside all pairs are returned unchanged.
///
/// A composite equal to a label that is present but left untouched would
/// silently merge two conditions and is rejected.
pub fn combine_labels(labels: &[i64], pairs: &[[i64; 2]]) -> Result<Vec<i64>, DecodeError> {
    if pairs.is_empty() {
        return Ok(labels.to_vec());
    }
    let map = combine_map(pairs)?;
    for &label in labels {
        if map.contains_key(&label) {
            continue;
        }
        if map.values().any(|&c| c == label) {
            return Err(DecodeError::config(format!(
                "composite code {label} collides with an existing label"
            )));
        }
    }
    Ok(labels
        .iter()
        .map(|l| map.get(l).copied().unwrap_or(*l))
        .collect())
}
