//! Peak-to-peak epoch rejection.
use ndarray::{ArrayView1, ArrayView2};

use crate::config::RejectThresholds;
use crate::raw::ChannelType;

/// The channel that caused an epoch to be dropped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rejection {
    pub channel: usize,
    pub ch_type: ChannelType,
    pub peak_to_peak: f64,
}

impl RejectThresholds {
    /// Threshold for a channel type, if that type is checked.
    pub fn limit(&self, ch_type: ChannelType) -> Option<f64> {
        match ch_type {
            ChannelType::Mag => self.mag,
            ChannelType::Grad => self.grad,
            ChannelType::Eog => self.eog,
            _ => None,
        }
    }
}

pub fn peak_to_peak(trace: ArrayView1<'_, f64>) -> f64 {
    let (lo, hi) = trace
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if lo.is_finite() { hi - lo } else { 0.0 }
}

/// First channel of `epoch` (`[C, T]`) whose peak-to-peak amplitude exceeds
/// the threshold for its type, or `None` if the epoch is clean.
pub fn check_epoch(
    epoch: ArrayView2<'_, f64>,
    ch_types: &[ChannelType],
    reject: &RejectThresholds,
) -> Option<Rejection> {
    epoch
        .outer_iter()
        .zip(ch_types)
        .enumerate()
        .find_map(|(channel, (trace, &ch_type))| {
            let limit = reject.limit(ch_type)?;
            let p2p = peak_to_peak(trace);
            (p2p > limit).then_some(Rejection { channel, ch_type, peak_to_peak: p2p })
        })
}
