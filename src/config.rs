//! Analysis configuration.
//!
//! [`PreprocessConfig`] holds every tunable parameter of the recording →
//! epochs step and [`DecodingConfig`] those of the decoding pipeline. Both
//! have defaults matching the self/other MEG experiment and can be built with
//! struct-update syntax:
//!
//! ```
//! use megdec::DecodingConfig;
//!
//! let cfg = DecodingConfig {
//!     triggers: vec![11, 12],
//!     n_permutations: 500,
//!     ..DecodingConfig::default()
//! };
//! assert!(cfg.validate().is_ok());
//! ```
//!
//! Both also (de)serialize from JSON; missing fields take their defaults.
use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::decode::classifier::ClassifierConfig;
use crate::error::DecodeError;

/// Load a JSON configuration file.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

// ── Decoding ──────────────────────────────────────────────────────────────

/// Configuration of the time-resolved decoding pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodingConfig {
    /// Label codes to keep. Every other trial is dropped before anything
    /// else happens.
    pub triggers: Vec<i64>,

    /// Pairs of codes merged into one composite class (`[11, 21]` → 1121).
    /// A code may appear in one pair only.
    ///
    /// Default: `[]`.
    pub combine: Vec<[i64; 2]>,

    /// Number of stratified cross-validation folds. Every class needs at
    /// least this many trials after balancing.
    ///
    /// Default: `5`.
    pub n_folds: usize,

    /// Shuffle trials within each class before dealing them to folds.
    ///
    /// Default: `false` (folds follow trial order).
    pub shuffle_folds: bool,

    /// Label permutations per time sample for the null distribution.
    ///
    /// Default: `100`.
    pub n_permutations: usize,

    /// Seed of every random stream (balancing, folds, permutations).
    ///
    /// Default: `42`.
    pub seed: u64,

    /// Model fitted inside each fold.
    ///
    /// Default: L2 logistic regression, `C = 1`.
    pub classifier: ClassifierConfig,

    /// Lower and upper quantile of the null band.
    ///
    /// Default: `[0.01, 0.99]`.
    pub band: [f64; 2],

    /// Worker threads for the per-sample loop. `0` uses the global rayon
    /// pool, `1` runs sequentially. Results do not depend on this value.
    ///
    /// Default: `0`.
    pub n_jobs: usize,
}

impl Default for DecodingConfig {
    fn default() -> Self {
        Self {
            triggers: vec![],
            combine: vec![],
            n_folds: 5,
            shuffle_folds: false,
            n_permutations: 100,
            seed: 42,
            classifier: ClassifierConfig::default(),
            band: [0.01, 0.99],
            n_jobs: 0,
        }
    }
}

impl DecodingConfig {
    /// Check the request itself, independent of any data.
    pub fn validate(&self) -> Result<(), DecodeError> {
        if self.triggers.is_empty() {
            return Err(DecodeError::config("trigger set is empty"));
        }
        if self.n_folds < 2 {
            return Err(DecodeError::config(format!(
                "cross-validation needs at least 2 folds, got {}",
                self.n_folds
            )));
        }
        let [lo, hi] = self.band;
        if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo > hi {
            return Err(DecodeError::config(format!(
                "null band quantiles must satisfy 0 <= lower <= upper <= 1, got [{lo}, {hi}]"
            )));
        }
        self.classifier.validate().map_err(DecodeError::config)?;
        crate::decode::labels::combine_map(&self.combine)?;
        Ok(())
    }
}

// ── Preprocessing ─────────────────────────────────────────────────────────

/// Peak-to-peak rejection thresholds per channel type.
///
/// An epoch is dropped when any channel of a thresholded type has a
/// peak-to-peak amplitude above its limit. `None` disables the check for
/// that type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RejectThresholds {
    /// Magnetometers, T. Default: `4e-12`.
    pub mag: Option<f64>,
    /// Gradiometers, T/m. Default: `4000e-13`.
    pub grad: Option<f64>,
    /// EOG, V. Default: `250e-6`.
    pub eog: Option<f64>,
}

impl Default for RejectThresholds {
    fn default() -> Self {
        Self {
            mag: Some(4e-12),
            grad: Some(4000e-13),
            eog: Some(250e-6),
        }
    }
}

impl RejectThresholds {
    pub fn none() -> Self {
        Self { mag: None, grad: None, eog: None }
    }

    pub fn is_empty(&self) -> bool {
        self.mag.is_none() && self.grad.is_none() && self.eog.is_none()
    }
}

/// ICA components to remove, per recording name.
///
/// The components were picked by inspecting topographies and source time
/// courses; the table is data, so it lives in the configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IcaExclusions(pub BTreeMap<String, Vec<usize>>);

impl IcaExclusions {
    pub fn get(&self, recording: &str) -> Option<&[usize]> {
        self.0.get(recording).map(Vec::as_slice)
    }

    pub fn insert(&mut self, recording: impl Into<String>, components: Vec<usize>) {
        self.0.insert(recording.into(), components);
    }
}

impl<S: Into<String>> FromIterator<(S, Vec<usize>)> for IcaExclusions {
    fn from_iter<I: IntoIterator<Item = (S, Vec<usize>)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Configuration of the recording → epochs step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Channel names removed before any processing. Matching ignores case
    /// and spaces.
    ///
    /// Default: `[]`.
    pub bad_channels: Vec<String>,

    /// Keep only `[tmin, tmax]` seconds of the recording.
    ///
    /// Default: `None`.
    pub crop: Option<(f64, f64)>,

    /// High-pass cutoff in Hz.
    ///
    /// Default: `None`.
    pub l_freq: Option<f64>,

    /// Low-pass cutoff in Hz.
    ///
    /// Default: `Some(40.0)`.
    pub h_freq: Option<f64>,

    /// Apply the recording's SSP projectors to the MEG channels.
    ///
    /// Default: `true`.
    pub apply_projections: bool,

    /// Components removed from each recording.
    ///
    /// Default: empty.
    pub ica_exclusions: IcaExclusions,

    /// Name of the trigger channel. `None` picks the first `stim` channel.
    ///
    /// Default: `None`.
    pub stim_channel: Option<String>,

    /// Minimum duration (s) a trigger value must persist to count as an
    /// event.
    ///
    /// Default: `0.002`.
    pub min_event_duration: f64,

    /// Event codes to epoch. Empty epochs every event.
    ///
    /// Default: `[]`.
    pub event_codes: Vec<i64>,

    /// Epoch start relative to the event, s. Default: `-0.2`.
    pub tmin: f64,

    /// Epoch end relative to the event, s (inclusive). Default: `1.0`.
    pub tmax: f64,

    /// Baseline window `(start, end)` in seconds; `None` means the epoch
    /// edge. `Some((None, None))` uses the whole epoch, `None` disables
    /// baseline correction.
    ///
    /// Default: `Some((None, Some(0.0)))`.
    pub baseline: Option<(Option<f64>, Option<f64>)>,

    /// Peak-to-peak rejection thresholds.
    pub reject: RejectThresholds,

    /// Keep every `decim`-th sample of each epoch.
    ///
    /// Default: `1`.
    pub decim: usize,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            bad_channels: vec![],
            crop: None,
            l_freq: None,
            h_freq: Some(40.0),
            apply_projections: true,
            ica_exclusions: IcaExclusions::default(),
            stim_channel: None,
            min_event_duration: 0.002,
            event_codes: vec![],
            tmin: -0.2,
            tmax: 1.0,
            baseline: Some((None, Some(0.0))),
            reject: RejectThresholds::default(),
            decim: 1,
        }
    }
}

impl PreprocessConfig {
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.tmin < self.tmax, "tmin ({}) must be below tmax ({})", self.tmin, self.tmax);
        anyhow::ensure!(self.decim >= 1, "decim must be at least 1");
        anyhow::ensure!(self.min_event_duration >= 0.0, "min_event_duration must be non-negative");
        if let (Some(l), Some(h)) = (self.l_freq, self.h_freq) {
            anyhow::ensure!(l < h, "l_freq ({l}) must be below h_freq ({h})");
        }
        if let Some((a, b)) = self.crop {
            anyhow::ensure!(a < b, "crop start ({a}) must be below crop end ({b})");
        }
        Ok(())
    }

    /// Number of samples per epoch at `sfreq`, before decimation.
    ///
    /// ```
    /// use megdec::PreprocessConfig;
    /// let cfg = PreprocessConfig::default();
    /// assert_eq!(cfg.epoch_samples(1000.0), 1201);
    /// ```
    pub fn epoch_samples(&self, sfreq: f64) -> usize {
        let start = (self.tmin * sfreq).round() as i64;
        let stop = (self.tmax * sfreq).round() as i64;
        (stop - start + 1).max(0) as usize
    }
}
