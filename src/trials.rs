//! Trial tensor + label vector + time axis.
use ndarray::{Array3, ArrayView2, Axis};

use crate::error::DecodeError;

/// Labelled trials sharing one event-relative time axis.
///
/// `data` is `[trials, channels, samples]`, `labels[i]` belongs to
/// `data[i, .., ..]` and `times[t]` (seconds) to `data[.., .., t]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialSet {
    data: Array3<f64>,
    labels: Vec<i64>,
    times: Vec<f64>,
}

impl TrialSet {
    /// Build a trial set, checking that the trial axis matches `labels` and
    /// the sample axis matches `times`.
    pub fn new(data: Array3<f64>, labels: Vec<i64>, times: Vec<f64>) -> Result<Self, DecodeError> {
        let (n_trials, _n_ch, n_samples) = data.dim();
        if labels.len() != n_trials {
            return Err(DecodeError::shape("label vector", n_trials, labels.len()));
        }
        if times.len() != n_samples {
            return Err(DecodeError::shape("time axis", n_samples, times.len()));
        }
        Ok(Self { data, labels, times })
    }

    /// Time axis `0, 1/sfreq, 2/sfreq, ...` shifted by `tmin`.
    pub fn with_sfreq(
        data: Array3<f64>,
        labels: Vec<i64>,
        tmin: f64,
        sfreq: f64,
    ) -> Result<Self, DecodeError> {
        let n_samples = data.dim().2;
        let times = (0..n_samples).map(|i| tmin + i as f64 / sfreq).collect();
        Self::new(data, labels, times)
    }

    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    pub fn labels(&self) -> &[i64] {
        &self.labels
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn n_trials(&self) -> usize {
        self.labels.len()
    }

    pub fn n_channels(&self) -> usize {
        self.data.dim().1
    }

    pub fn n_samples(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// `[trials, channels]` view at time index `t`.
    pub fn sample_slice(&self, t: usize) -> ArrayView2<'_, f64> {
        self.data.index_axis(Axis(2), t)
    }

    /// New trial set made of the trials at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            data: self.data.select(Axis(0), indices),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
            times: self.times.clone(),
        }
    }

    /// Same trials with a replacement label vector.
    pub fn relabel(&self, labels: Vec<i64>) -> Result<Self, DecodeError> {
        Self::new(self.data.clone(), labels, self.times.clone())
    }

    pub fn into_parts(self) -> (Array3<f64>, Vec<i64>, Vec<f64>) {
        (self.data, self.labels, self.times)
    }
}
