//! FIR filter design matching MNE / `scipy.signal.firwin`.
//!
//! For a band edge at `f` Hz with sampling rate `sfreq`:
//!   • high-pass transition = min(max(0.25 · l_freq, 2), l_freq)
//!   • low-pass transition  = min(max(0.25 · h_freq, 2), sfreq/2 − h_freq)
//!   • filter length N      = ceil(3.3 / min(transitions) · sfreq), rounded to odd
//!   • firwin cutoffs sit in the middle of each transition band
//!   • high-pass = δ − low-pass, band-pass = low-pass(high edge) − low-pass(low edge)
use std::f64::consts::PI;

use anyhow::{ensure, Result};

/// MNE's automatic transition bandwidth below a high-pass edge.
pub fn highpass_trans_bandwidth(l_freq: f64) -> f64 {
    (0.25 * l_freq).max(2.0).min(l_freq)
}

/// MNE's automatic transition bandwidth above a low-pass edge.
pub fn lowpass_trans_bandwidth(h_freq: f64, sfreq: f64) -> f64 {
    (0.25 * h_freq).max(2.0).min(sfreq / 2.0 - h_freq)
}

/// Number of taps for a Hamming-window design: `ceil(3.3 / trans_bw · sfreq)`,
/// bumped to the next odd number.
pub fn auto_filter_length(trans_bw: f64, sfreq: f64) -> usize {
    let n = (3.3 / trans_bw * sfreq).ceil() as usize;
    n | 1
}

/// Hamming window of length `n`.
pub fn hamming(n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![1.0];
    }
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

/// Hamming-windowed sinc low-pass with `n` taps and −6 dB point at
/// `cutoff_hz`, scaled to unit DC gain (`scipy.signal.firwin`, `pass_zero=True`).
pub fn firwin_lowpass(n: usize, cutoff_hz: f64, sfreq: f64) -> Result<Vec<f64>> {
    ensure!(n % 2 == 1, "firwin requires an odd number of taps, got {n}");
    let fc = cutoff_hz / (sfreq / 2.0);
    ensure!(fc > 0.0 && fc < 1.0, "cutoff {cutoff_hz} Hz must lie strictly between 0 and Nyquist");

    let alpha = (n - 1) as f64 / 2.0;
    let win = hamming(n);
    let mut h: Vec<f64> = (0..n)
        .map(|i| {
            let x = i as f64 - alpha;
            // lim_{x→0} sin(π·fc·x) / (π·x) = fc
            let sinc = if x == 0.0 { fc } else { (PI * fc * x).sin() / (PI * x) };
            sinc * win[i]
        })
        .collect();
    let dc: f64 = h.iter().sum();
    h.iter_mut().for_each(|v| *v /= dc);
    Ok(h)
}

/// Zero-phase FIR for the band `[l_freq, h_freq]` Hz.
///
/// * only `l_freq` → high-pass
/// * only `h_freq` → low-pass
/// * both          → band-pass
///
/// Returns `None` when neither edge is set. Matches
/// `mne.filter.create_filter(..., fir_window='hamming', fir_design='firwin')`.
pub fn design_filter(l_freq: Option<f64>, h_freq: Option<f64>, sfreq: f64) -> Result<Option<Vec<f64>>> {
    let nyq = sfreq / 2.0;
    match (l_freq, h_freq) {
        (None, None) => Ok(None),
        (Some(l), None) => {
            ensure!(l > 0.0 && l < nyq, "l_freq {l} Hz outside (0, {nyq})");
            let tb = highpass_trans_bandwidth(l);
            let n = auto_filter_length(tb, sfreq);
            let mut h = firwin_lowpass(n, l - tb / 2.0, sfreq)?;
            // Spectral inversion: δ[N/2] − low-pass.
            h.iter_mut().for_each(|v| *v = -*v);
            h[n / 2] += 1.0;
            Ok(Some(h))
        }
        (None, Some(h)) => {
            ensure!(h > 0.0 && h < nyq, "h_freq {h} Hz outside (0, {nyq})");
            let tb = lowpass_trans_bandwidth(h, sfreq);
            let n = auto_filter_length(tb, sfreq);
            firwin_lowpass(n, h + tb / 2.0, sfreq).map(Some)
        }
        (Some(l), Some(h)) => {
            ensure!(0.0 < l && l < h && h < nyq, "band [{l}, {h}] Hz invalid for Nyquist {nyq}");
            let l_tb = highpass_trans_bandwidth(l);
            let h_tb = lowpass_trans_bandwidth(h, sfreq);
            let n = auto_filter_length(l_tb.min(h_tb), sfreq);
            // Difference of two unit-DC low-passes: zero gain at DC, unit
            // gain inside the band.
            let upper = firwin_lowpass(n, h + h_tb / 2.0, sfreq)?;
            let lower = firwin_lowpass(n, l - l_tb / 2.0, sfreq)?;
            Ok(Some(upper.iter().zip(&lower).map(|(u, l)| u - l).collect()))
        }
    }
}

/// Zero-phase high-pass at `l_freq` Hz.
pub fn design_highpass(l_freq: f64, sfreq: f64) -> Result<Vec<f64>> {
    design_filter(Some(l_freq), None, sfreq).map(Option::unwrap_or_default)
}

/// Zero-phase low-pass at `h_freq` Hz.
pub fn design_lowpass(h_freq: f64, sfreq: f64) -> Result<Vec<f64>> {
    design_filter(None, Some(h_freq), sfreq).map(Option::unwrap_or_default)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `|H(f)|` of a symmetric FIR.
    fn gain_at(h: &[f64], f_hz: f64, sfreq: f64) -> f64 {
        let w = 2.0 * PI * f_hz / sfreq;
        let (re, im) = h.iter().enumerate().fold((0.0, 0.0), |(re, im), (i, &v)| {
            (re + v * (w * i as f64).cos(), im - v * (w * i as f64).sin())
        });
        (re * re + im * im).sqrt()
    }

    #[test]
    fn filter_length_is_odd() {
        for l_freq in [0.5, 1.0, 2.0, 5.0] {
            let n = auto_filter_length(highpass_trans_bandwidth(l_freq), 256.0);
            assert!(n % 2 == 1, "N={n} is even for l_freq={l_freq}");
        }
    }

    #[test]
    fn highpass_known_length_256hz() {
        // MNE: 0.5 Hz high-pass at 256 Hz has 1691 taps.
        let h = design_highpass(0.5, 256.0).unwrap();
        assert_eq!(h.len(), 1691);
    }

    #[test]
    fn lowpass_known_length_1000hz() {
        // 40 Hz low-pass at 1 kHz: transition 10 Hz → 331 taps.
        let h = design_lowpass(40.0, 1000.0).unwrap();
        assert_eq!(h.len(), 331);
    }

    #[test]
    fn highpass_sum_near_zero() {
        let h = design_highpass(0.5, 256.0).unwrap();
        let s: f64 = h.iter().sum();
        assert!(s.abs() < 1e-6, "highpass sum = {s}");
    }

    #[test]
    fn lowpass_dc_gain_unity() {
        let h = design_lowpass(40.0, 1000.0).unwrap();
        approx::assert_abs_diff_eq!(h.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn designs_are_symmetric() {
        let h = design_filter(Some(1.0), Some(40.0), 250.0).unwrap().unwrap();
        let n = h.len();
        for i in 0..n / 2 {
            approx::assert_abs_diff_eq!(h[i], h[n - 1 - i], epsilon = 1e-12);
        }
    }

    #[test]
    fn bandpass_passes_band_and_stops_edges() {
        let sfreq = 250.0;
        let h = design_filter(Some(1.0), Some(40.0), sfreq).unwrap().unwrap();
        approx::assert_abs_diff_eq!(gain_at(&h, 10.0, sfreq), 1.0, epsilon = 0.01);
        assert!(gain_at(&h, 0.0, sfreq) < 0.01);
        assert!(gain_at(&h, 60.0, sfreq) < 0.01);
    }

    #[test]
    fn no_edges_means_no_filter() {
        assert!(design_filter(None, None, 1000.0).unwrap().is_none());
    }

    #[test]
    fn invalid_edges_are_errors() {
        assert!(design_filter(Some(40.0), Some(10.0), 1000.0).is_err());
        assert!(design_lowpass(600.0, 1000.0).is_err());
        assert!(firwin_lowpass(10, 0.1, 2.0).is_err());
    }
}
