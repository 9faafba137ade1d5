//! Descriptive statistics over the permutation null distribution.
use ndarray::{Array2, Axis};
use serde::Serialize;

/// Linear-interpolation quantile (numpy's default, "R-7").
///
/// `sorted` must be ascending and non-empty; `p` is clamped to `[0, 1]`.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let h = (n - 1) as f64 * p.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = h - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

/// Quantile of an unsorted sample. `NaN` for an empty sample.
pub fn quantile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(|a, b| a.total_cmp(b));
    quantile_sorted(&sorted, p)
}

/// Accuracy curve with its null band, aligned on the time axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodingSummary {
    /// Seconds relative to the event.
    pub times: Vec<f64>,
    pub accuracy: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    /// `(1 + #{null >= observed}) / (N + 1)` per sample.
    pub p_values: Vec<f64>,
}

impl DecodingSummary {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Time indices where the observed accuracy exceeds the upper band.
    pub fn above_band(&self) -> Vec<usize> {
        self.accuracy
            .iter()
            .zip(&self.upper)
            .enumerate()
            .filter(|(_, (a, u))| a > u)
            .map(|(i, _)| i)
            .collect()
    }

    /// Index and value of the best accuracy.
    pub fn peak(&self) -> Option<(usize, f64)> {
        self.accuracy
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }
}

/// Band per time sample from `null` (`[samples, permutations]`).
pub fn summarize(
    times: &[f64],
    accuracy: &[f64],
    null: &Array2<f64>,
    lower_q: f64,
    upper_q: f64,
) -> DecodingSummary {
    let mut lower = Vec::with_capacity(accuracy.len());
    let mut upper = Vec::with_capacity(accuracy.len());
    let mut p_values = Vec::with_capacity(accuracy.len());

    for (row, &observed) in null.axis_iter(Axis(0)).zip(accuracy) {
        let mut sorted: Vec<f64> = row.to_vec();
        sorted.sort_unstable_by(|a, b| a.total_cmp(b));
        if sorted.is_empty() {
            lower.push(f64::NAN);
            upper.push(f64::NAN);
            p_values.push(f64::NAN);
            continue;
        }
        lower.push(quantile_sorted(&sorted, lower_q));
        upper.push(quantile_sorted(&sorted, upper_q));
        let exceed = sorted.iter().filter(|&&v| v >= observed).count();
        p_values.push((1 + exceed) as f64 / (sorted.len() + 1) as f64);
    }

    DecodingSummary {
        times: times.to_vec(),
        accuracy: accuracy.to_vec(),
        lower,
        upper,
        p_values,
    }
}
