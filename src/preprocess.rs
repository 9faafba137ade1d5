//! Recording → epochs.
//!
//! [`preprocess_recording`] chains every step for one recording in a fixed
//! order, each controlled by a field of [`PreprocessConfig`]:
//!
//! 1. Drop [`PreprocessConfig::bad_channels`].
//! 2. Crop to [`PreprocessConfig::crop`].
//! 3. Zero-phase FIR band-pass (`l_freq`, `h_freq`) on every data channel.
//! 4. SSP projectors on the MEG channels (`apply_projections`).
//! 5. ICA component removal on the MEG channels (`ica_exclusions`).
//! 6. Event detection on the trigger channel.
//! 7. Epoching, peak-to-peak rejection, MEG pick, baseline correction and
//!    decimation.
use std::collections::BTreeMap;

use anyhow::{bail, ensure, Context, Result};
use ndarray::{concatenate, s, Array2, Array3, Axis};

use crate::config::PreprocessConfig;
use crate::epoch::{cut_epochs, decimate, EpochWindow};
use crate::error::DecodeError;
use crate::events::{find_events, select_events};
use crate::filter::{apply_fir_zero_phase, design_filter};
use crate::ica::IcaSolution;
use crate::normalize::{baseline_correct_inplace, baseline_range};
use crate::projection::apply_projectors;
use crate::raw::{ChannelType, RawRecording};
use crate::reject::check_epoch;
use crate::trials::TrialSet;

/// Event-locked MEG epochs.
#[derive(Debug, Clone, PartialEq)]
pub struct Epochs {
    /// `[epochs, channels, samples]`.
    pub data: Array3<f64>,
    /// Trigger code of each epoch.
    pub labels: Vec<i64>,
    /// Event-relative time of each sample, seconds.
    pub times: Vec<f64>,
    pub ch_names: Vec<String>,
    /// Sampling rate after decimation.
    pub sfreq: f64,
    /// Epochs dropped by peak-to-peak rejection.
    pub n_rejected: usize,
}

impl Epochs {
    pub fn n_epochs(&self) -> usize {
        self.labels.len()
    }

    /// Epoch count per trigger code.
    pub fn counts(&self) -> BTreeMap<i64, usize> {
        let mut counts = BTreeMap::new();
        for &l in &self.labels {
            *counts.entry(l).or_insert(0) += 1;
        }
        counts
    }

    pub fn into_trial_set(self) -> Result<TrialSet, DecodeError> {
        TrialSet::new(self.data, self.labels, self.times)
    }

    /// Average of the epochs with trigger `code` (`[C, T]`), or `None` if
    /// there are none.
    pub fn evoked(&self, code: i64) -> Option<Array2<f64>> {
        let idx: Vec<usize> = self
            .labels
            .iter()
            .enumerate()
            .filter(|&(_, &l)| l == code)
            .map(|(i, _)| i)
            .collect();
        if idx.is_empty() {
            return None;
        }
        self.data.select(Axis(0), &idx).mean_axis(Axis(0))
    }
}

/// Stack the epochs of several recordings.
///
/// Channel names, time axes and sampling rates must agree.
pub fn concatenate_epochs(parts: Vec<Epochs>) -> Result<Epochs> {
    let mut iter = parts.into_iter();
    let first = iter.next().context("no epochs to concatenate")?;
    let mut views = vec![];
    let rest: Vec<Epochs> = iter.collect();
    for (i, p) in rest.iter().enumerate() {
        ensure!(p.ch_names == first.ch_names, "recording {} has different channels", i + 1);
        ensure!(
            p.times.len() == first.times.len()
                && p.times.iter().zip(&first.times).all(|(a, b)| (a - b).abs() < 1e-9),
            "recording {} has a different time axis",
            i + 1
        );
        ensure!((p.sfreq - first.sfreq).abs() < 1e-9, "recording {} has a different sampling rate", i + 1);
    }

    views.push(first.data.view());
    views.extend(rest.iter().map(|p| p.data.view()));
    let data = concatenate(Axis(0), &views).context("stacking epochs")?;

    let mut labels = first.labels.clone();
    labels.extend(rest.iter().flat_map(|p| p.labels.iter().copied()));
    let n_rejected = first.n_rejected + rest.iter().map(|p| p.n_rejected).sum::<usize>();

    Ok(Epochs {
        data,
        labels,
        times: first.times.clone(),
        ch_names: first.ch_names.clone(),
        sfreq: first.sfreq,
        n_rejected,
    })
}

/// Run the full preprocessing chain on the recording `name`.
///
/// `ica` must be given when `cfg.ica_exclusions` lists components for `name`.
pub fn preprocess_recording(
    name: &str,
    mut raw: RawRecording,
    cfg: &PreprocessConfig,
    ica: Option<&IcaSolution>,
) -> Result<Epochs> {
    cfg.validate()?;

    let dropped = raw.drop_channels(&cfg.bad_channels);
    if !dropped.is_empty() {
        tracing::info!(recording = name, ?dropped, "dropped bad channels");
    }
    if let Some((tmin, tmax)) = cfg.crop {
        raw.crop(tmin, tmax)?;
    }

    // Trigger values must not be smeared by the filter.
    let stim = raw.stim_index(cfg.stim_channel.as_deref())?;
    let stim_trace = raw.data.row(stim).to_vec();

    if let Some(h) = design_filter(cfg.l_freq, cfg.h_freq, raw.sfreq)? {
        let rows = raw.indices_where(ChannelType::is_data);
        filter_rows(&mut raw.data, &rows, &h)?;
        tracing::debug!(recording = name, taps = h.len(), l_freq = ?cfg.l_freq, h_freq = ?cfg.h_freq, "filtered");
    }

    let meg = raw.meg_indices();
    ensure!(!meg.is_empty(), "recording {name} has no MEG channels");

    if cfg.apply_projections {
        if let Some(vectors) = &raw.projectors {
            let rank = apply_projectors(&mut raw.data, vectors.view(), &meg)?;
            tracing::debug!(recording = name, rank, "applied SSP projectors");
        }
    }

    if let Some(components) = cfg.ica_exclusions.get(name) {
        let Some(ica) = ica else {
            bail!("ICA exclusions are configured for {name} but no solution was given");
        };
        let mut meg_data = raw.data.select(Axis(0), &meg);
        ica.exclude(&mut meg_data, components)
            .with_context(|| format!("removing ICA components from {name}"))?;
        assign_rows(&mut raw.data, &meg, &meg_data);
        tracing::info!(recording = name, ?components, "removed ICA components");
    }

    let events = select_events(&find_events(&stim_trace, raw.sfreq, cfg.min_event_duration), &cfg.event_codes);
    let window = EpochWindow::new(cfg.tmin, cfg.tmax, raw.sfreq);
    let onsets: Vec<usize> = events.iter().map(|e| e.sample).collect();
    let (cut, kept) = cut_epochs(&raw.data, &onsets, window);
    let times = window.times(raw.sfreq);

    // Reject on all thresholded channels (EOG included), then keep MEG only.
    let mut clean = vec![];
    let mut n_rejected = 0;
    for (e, &ev) in kept.iter().enumerate() {
        match check_epoch(cut.slice(s![e, .., ..]), &raw.ch_types, &cfg.reject) {
            Some(r) => {
                n_rejected += 1;
                tracing::debug!(
                    recording = name,
                    sample = events[ev].sample,
                    channel = %raw.ch_names[r.channel],
                    peak_to_peak = r.peak_to_peak,
                    "rejected epoch"
                );
            }
            None => clean.push((e, events[ev].code)),
        }
    }
    let rows: Vec<usize> = clean.iter().map(|&(e, _)| e).collect();
    let mut data = cut.select(Axis(0), &rows).select(Axis(1), &meg);
    let labels: Vec<i64> = clean.iter().map(|&(_, code)| code).collect();

    if let Some(window) = cfg.baseline {
        let range = baseline_range(&times, window)?;
        baseline_correct_inplace(&mut data, range);
    }
    let (data, times) = decimate(&data, &times, cfg.decim);

    tracing::info!(
        recording = name,
        events = events.len(),
        epochs = labels.len(),
        rejected = n_rejected,
        "epoched"
    );

    Ok(Epochs {
        data,
        labels,
        times,
        ch_names: meg.iter().map(|&i| raw.ch_names[i].clone()).collect(),
        sfreq: raw.sfreq / cfg.decim as f64,
        n_rejected,
    })
}

fn filter_rows(data: &mut Array2<f64>, rows: &[usize], h: &[f64]) -> Result<()> {
    let mut sub = data.select(Axis(0), rows);
    apply_fir_zero_phase(&mut sub, h)?;
    assign_rows(data, rows, &sub);
    Ok(())
}

fn assign_rows(data: &mut Array2<f64>, rows: &[usize], values: &Array2<f64>) {
    for (k, &r) in rows.iter().enumerate() {
        data.row_mut(r).assign(&values.row(k));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RejectThresholds;

    fn tiny_recording() -> RawRecording {
        let n_t = 400;
        let mut data = Array2::<f64>::zeros((3, n_t));
        for onset in [100, 250] {
            for t in onset..onset + 5 {
                data[[2, t]] = if onset == 100 { 11.0 } else { 12.0 };
            }
            for t in onset + 1..onset + 20 {
                data[[0, t]] = 1.0;
            }
        }
        RawRecording::new(
            data,
            100.0,
            vec!["MEG 0111".into(), "MEG 0121".into(), "STI 101".into()],
            vec![ChannelType::Mag, ChannelType::Mag, ChannelType::Stim],
        )
        .unwrap()
    }

    fn no_filter() -> PreprocessConfig {
        PreprocessConfig {
            h_freq: None,
            reject: RejectThresholds::none(),
            tmin: -0.5,
            tmax: 0.5,
            ..Default::default()
        }
    }

    #[test]
    fn epochs_follow_events() {
        let ep = preprocess_recording("r", tiny_recording(), &no_filter(), None).unwrap();
        assert_eq!(ep.labels, vec![11, 12]);
        assert_eq!(ep.data.dim(), (2, 2, 101));
        assert_eq!(ep.ch_names.len(), 2);
        // Baseline (-0.5, 0) is flat zero, so the response keeps its amplitude.
        approx::assert_abs_diff_eq!(ep.data[[0, 0, 51]], 1.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(ep.data[[0, 0, 50]], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn event_code_selection() {
        let cfg = PreprocessConfig { event_codes: vec![12], ..no_filter() };
        let ep = preprocess_recording("r", tiny_recording(), &cfg, None).unwrap();
        assert_eq!(ep.labels, vec![12]);
    }

    #[test]
    fn rejection_drops_large_epochs() {
        let cfg = PreprocessConfig {
            reject: RejectThresholds { mag: Some(0.5), grad: None, eog: None },
            ..no_filter()
        };
        let ep = preprocess_recording("r", tiny_recording(), &cfg, None).unwrap();
        assert_eq!(ep.n_epochs(), 0);
        assert_eq!(ep.n_rejected, 2);
    }

    #[test]
    fn missing_ica_solution_is_an_error() {
        let mut cfg = no_filter();
        cfg.ica_exclusions.insert("r", vec![0]);
        assert!(preprocess_recording("r", tiny_recording(), &cfg, None).is_err());
        // Other recordings are unaffected.
        assert!(preprocess_recording("other", tiny_recording(), &cfg, None).is_ok());
    }

    #[test]
    fn evoked_and_concatenation() {
        let a = preprocess_recording("a", tiny_recording(), &no_filter(), None).unwrap();
        let b = a.clone();
        let both = concatenate_epochs(vec![a, b]).unwrap();
        assert_eq!(both.labels, vec![11, 12, 11, 12]);
        assert_eq!(both.counts()[&11], 2);
        let evk = both.evoked(11).unwrap();
        assert_eq!(evk.dim(), (2, 101));
        assert!(both.evoked(99).is_none());
        let trials = both.into_trial_set().unwrap();
        assert_eq!(trials.n_trials(), 4);
    }

    #[test]
    fn concatenation_checks_channels() {
        let a = preprocess_recording("a", tiny_recording(), &no_filter(), None).unwrap();
        let mut b = a.clone();
        b.ch_names[0] = "MEG 9999".into();
        assert!(concatenate_epochs(vec![a, b]).is_err());
        assert!(concatenate_epochs(vec![]).is_err());
    }
}
