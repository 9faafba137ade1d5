//! Event-locked epoching.
//!
//! An epoch spans samples `onset + round(tmin·sfreq) ..= onset + round(tmax·sfreq)`,
//! so it holds `round(tmax·sfreq) − round(tmin·sfreq) + 1` samples and its
//! time axis is `k / sfreq` for `k` in that offset range. Events whose
//! window runs off either end of the recording are skipped.
use ndarray::{s, Array2, Array3, Axis};

/// Sample offsets of an epoch window relative to its event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochWindow {
    pub start: i64,
    pub stop: i64,
}

impl EpochWindow {
    pub fn new(tmin: f64, tmax: f64, sfreq: f64) -> Self {
        Self {
            start: (tmin * sfreq).round() as i64,
            stop: (tmax * sfreq).round() as i64,
        }
    }

    pub fn n_samples(&self) -> usize {
        (self.stop - self.start + 1).max(0) as usize
    }

    /// Event-relative time of every sample, seconds.
    pub fn times(&self, sfreq: f64) -> Vec<f64> {
        (self.start..=self.stop).map(|k| k as f64 / sfreq).collect()
    }

    /// First sample of the window for an event at `onset`, if the whole
    /// window fits in `n_times` samples.
    fn first_sample(&self, onset: usize, n_times: usize) -> Option<usize> {
        let first = onset as i64 + self.start;
        let last = onset as i64 + self.stop;
        (first >= 0 && last < n_times as i64).then_some(first as usize)
    }
}

/// Cut `[C, T]` data into `[E, C, n]` epochs around `onsets`.
///
/// Returns the epochs and, for each one, the index into `onsets` it came from.
pub fn cut_epochs(data: &Array2<f64>, onsets: &[usize], window: EpochWindow) -> (Array3<f64>, Vec<usize>) {
    let (n_ch, n_t) = data.dim();
    let n = window.n_samples();
    let kept: Vec<(usize, usize)> = onsets
        .iter()
        .enumerate()
        .filter_map(|(i, &onset)| window.first_sample(onset, n_t).map(|first| (i, first)))
        .collect();

    let mut out = Array3::<f64>::zeros((kept.len(), n_ch, n));
    for (e, &(_, first)) in kept.iter().enumerate() {
        out.slice_mut(s![e, .., ..])
            .assign(&data.slice(s![.., first..first + n]));
    }

    let skipped = onsets.len() - kept.len();
    if skipped > 0 {
        tracing::debug!(skipped, "events too close to the recording edge");
    }
    (out, kept.into_iter().map(|(i, _)| i).collect())
}

/// Keep every `decim`-th sample of each epoch, starting at the first.
pub fn decimate(epochs: &Array3<f64>, times: &[f64], decim: usize) -> (Array3<f64>, Vec<f64>) {
    if decim <= 1 {
        return (epochs.clone(), times.to_vec());
    }
    let idx: Vec<usize> = (0..times.len()).step_by(decim).collect();
    let times = idx.iter().map(|&i| times[i]).collect();
    (epochs.select(Axis(2), &idx), times)
}
