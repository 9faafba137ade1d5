//! Epoch baseline correction.
//!
//! Matches `mne.baseline.rescale(mode='mean')`: for every epoch and channel
//! the mean over the baseline window is subtracted from the whole trace.
//! A window edge of `None` means the first / last sample.
use std::ops::Range;

use anyhow::{ensure, Result};
use ndarray::{s, Array3};

/// Sample range of the baseline window `(bmin, bmax)` on `times`.
///
/// `bmin` maps to the first sample at or after it, `bmax` to the last
/// sample at or before it (inclusive).
pub fn baseline_range(times: &[f64], window: (Option<f64>, Option<f64>)) -> Result<Range<usize>> {
    let (bmin, bmax) = window;
    // Half a nanosecond of slack absorbs `k / sfreq` rounding.
    let eps = 5e-10;
    let start = match bmin {
        None => 0,
        Some(b) => times.iter().position(|&t| t >= b - eps).unwrap_or(times.len()),
    };
    let end = match bmax {
        None => times.len(),
        Some(b) => times.iter().rposition(|&t| t <= b + eps).map_or(0, |i| i + 1),
    };
    ensure!(
        start < end,
        "baseline window {window:?} selects no samples of [{:?}, {:?}]",
        times.first(),
        times.last()
    );
    Ok(start..end)
}

/// Subtract the per-epoch, per-channel mean over `range`.
/// `epochs`: `[E, C, T]`.
pub fn baseline_correct_inplace(epochs: &mut Array3<f64>, range: Range<usize>) {
    let (n_e, n_c, _n_t) = epochs.dim();
    for e in 0..n_e {
        for c in 0..n_c {
            let m = epochs
                .slice(s![e, c, range.clone()])
                .mean()
                .unwrap_or(0.0);
            epochs.slice_mut(s![e, c, ..]).mapv_inplace(|v| v - m);
        }
    }
}
