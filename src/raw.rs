//! Continuous multichannel recording.
use std::fmt;
use std::str::FromStr;

use anyhow::{bail, ensure, Context, Result};
use ndarray::{s, Array2, Axis};

/// Sensor kind of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelType {
    /// Magnetometer (T).
    Mag,
    /// Planar gradiometer (T/m).
    Grad,
    Eeg,
    Eog,
    /// Trigger channel.
    Stim,
    Misc,
}

impl ChannelType {
    pub fn is_meg(self) -> bool {
        matches!(self, ChannelType::Mag | ChannelType::Grad)
    }

    /// Channels that carry a physiological signal and get filtered.
    pub fn is_data(self) -> bool {
        !matches!(self, ChannelType::Stim | ChannelType::Misc)
    }

    pub fn name(self) -> &'static str {
        match self {
            ChannelType::Mag => "mag",
            ChannelType::Grad => "grad",
            ChannelType::Eeg => "eeg",
            ChannelType::Eog => "eog",
            ChannelType::Stim => "stim",
            ChannelType::Misc => "misc",
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChannelType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim().to_lowercase().as_str() {
            "mag" => ChannelType::Mag,
            "grad" => ChannelType::Grad,
            "eeg" => ChannelType::Eeg,
            "eog" => ChannelType::Eog,
            "stim" => ChannelType::Stim,
            "misc" => ChannelType::Misc,
            other => bail!("unknown channel type {other:?}"),
        })
    }
}

/// Channel names compare without case and spaces (`"MEG 0113"` == `"meg0113"`).
pub fn normalize_channel_name(name: &str) -> String {
    name.replace(' ', "").to_lowercase()
}

/// A continuous recording: `data` is `[channels, samples]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecording {
    pub data: Array2<f64>,
    pub sfreq: f64,
    pub ch_names: Vec<String>,
    pub ch_types: Vec<ChannelType>,
    /// SSP vectors, `[projectors, channels]`.
    pub projectors: Option<Array2<f64>>,
}

impl RawRecording {
    pub fn new(
        data: Array2<f64>,
        sfreq: f64,
        ch_names: Vec<String>,
        ch_types: Vec<ChannelType>,
    ) -> Result<Self> {
        let n_ch = data.nrows();
        ensure!(sfreq > 0.0, "sampling rate must be positive, got {sfreq}");
        ensure!(ch_names.len() == n_ch, "{} channel names for {n_ch} channels", ch_names.len());
        ensure!(ch_types.len() == n_ch, "{} channel types for {n_ch} channels", ch_types.len());
        Ok(Self { data, sfreq, ch_names, ch_types, projectors: None })
    }

    pub fn with_projectors(mut self, projectors: Array2<f64>) -> Result<Self> {
        ensure!(
            projectors.ncols() == self.n_channels(),
            "projectors span {} channels, recording has {}",
            projectors.ncols(),
            self.n_channels()
        );
        self.projectors = Some(projectors);
        Ok(self)
    }

    pub fn n_channels(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_times(&self) -> usize {
        self.data.ncols()
    }

    pub fn channel_index(&self, name: &str) -> Option<usize> {
        let norm = normalize_channel_name(name);
        self.ch_names.iter().position(|n| normalize_channel_name(n) == norm)
    }

    /// Indices of channels whose type satisfies `pred`, in channel order.
    pub fn indices_where(&self, pred: impl Fn(ChannelType) -> bool) -> Vec<usize> {
        self.ch_types
            .iter()
            .enumerate()
            .filter(|&(_, &t)| pred(t))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn meg_indices(&self) -> Vec<usize> {
        self.indices_where(ChannelType::is_meg)
    }

    /// Named trigger channel, or the first `stim` channel when `name` is `None`.
    pub fn stim_index(&self, name: Option<&str>) -> Result<usize> {
        match name {
            Some(n) => self.channel_index(n).with_context(|| format!("no channel named {n:?}")),
            None => self
                .ch_types
                .iter()
                .position(|&t| t == ChannelType::Stim)
                .context("recording has no stim channel"),
        }
    }

    /// Keep only the channels at `indices`, in that order.
    pub fn pick(&self, indices: &[usize]) -> Self {
        Self {
            data: self.data.select(Axis(0), indices),
            sfreq: self.sfreq,
            ch_names: indices.iter().map(|&i| self.ch_names[i].clone()).collect(),
            ch_types: indices.iter().map(|&i| self.ch_types[i]).collect(),
            projectors: self.projectors.as_ref().map(|p| p.select(Axis(1), indices)),
        }
    }

    /// Remove the named channels. Returns the names that were present;
    /// unknown names are ignored.
    pub fn drop_channels(&mut self, names: &[String]) -> Vec<String> {
        let drop: Vec<String> = names.iter().map(|n| normalize_channel_name(n)).collect();
        let (keep, dropped): (Vec<usize>, Vec<usize>) = (0..self.n_channels())
            .partition(|&i| !drop.contains(&normalize_channel_name(&self.ch_names[i])));
        if dropped.is_empty() {
            return vec![];
        }
        let dropped_names = dropped.iter().map(|&i| self.ch_names[i].clone()).collect();
        *self = self.pick(&keep);
        dropped_names
    }

    /// Keep samples `round(tmin·sfreq) ..= round(tmax·sfreq)`.
    pub fn crop(&mut self, tmin: f64, tmax: f64) -> Result<()> {
        ensure!(tmin >= 0.0 && tmin < tmax, "invalid crop window [{tmin}, {tmax}]");
        let start = (tmin * self.sfreq).round() as usize;
        let stop = ((tmax * self.sfreq).round() as usize).min(self.n_times().saturating_sub(1));
        ensure!(
            start <= stop,
            "crop start {tmin} s is beyond the recording ({} samples)",
            self.n_times()
        );
        self.data = self.data.slice(s![.., start..=stop]).to_owned();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording() -> RawRecording {
        let data = Array2::from_shape_fn((4, 100), |(c, t)| (c * 1000 + t) as f64);
        RawRecording::new(
            data,
            100.0,
            vec!["MEG 0111".into(), "MEG 0112".into(), "EOG 061".into(), "STI 101".into()],
            vec![ChannelType::Mag, ChannelType::Grad, ChannelType::Eog, ChannelType::Stim],
        )
        .unwrap()
    }

    #[test]
    fn name_matching_ignores_case_and_spaces() {
        let raw = recording();
        assert_eq!(raw.channel_index("meg0112"), Some(1));
        assert_eq!(raw.channel_index("STI101"), Some(3));
        assert_eq!(raw.channel_index("nope"), None);
    }

    #[test]
    fn drop_keeps_projectors_aligned() {
        let projs = Array2::from_shape_fn((1, 4), |(_, c)| c as f64);
        let mut raw = recording().with_projectors(projs).unwrap();
        let dropped = raw.drop_channels(&["meg 0112".into(), "missing".into()]);
        assert_eq!(dropped, vec!["MEG 0112".to_string()]);
        assert_eq!(raw.n_channels(), 3);
        assert_eq!(raw.ch_types, vec![ChannelType::Mag, ChannelType::Eog, ChannelType::Stim]);
        assert_eq!(raw.projectors.unwrap().row(0).to_vec(), vec![0.0, 2.0, 3.0]);
        assert_eq!(raw.data[[1, 0]], 2000.0);
    }

    #[test]
    fn crop_is_inclusive() {
        let mut raw = recording();
        raw.crop(0.1, 0.2).unwrap();
        assert_eq!(raw.n_times(), 11);
        assert_eq!(raw.data[[0, 0]], 10.0);
        assert!(raw.crop(0.5, 0.1).is_err());
    }

    #[test]
    fn stim_lookup() {
        let raw = recording();
        assert_eq!(raw.stim_index(None).unwrap(), 3);
        assert_eq!(raw.stim_index(Some("EOG 061")).unwrap(), 2);
        assert!(raw.stim_index(Some("STI 014")).is_err());
        assert_eq!(raw.meg_indices(), vec![0, 1]);
    }

    #[test]
    fn mismatched_names_are_rejected() {
        let data = Array2::zeros((2, 10));
        assert!(RawRecording::new(data, 100.0, vec!["a".into()], vec![ChannelType::Mag; 2]).is_err());
    }
}
