//! Zero-phase FIR convolution via FFT.
//!
//! Zero phase comes from centring the kernel: the output is the full linear
//! convolution shifted left by `(N-1)/2` samples, not a forward-backward
//! pass. Each side is first extended by `N-1` samples of odd reflection
//! (MNE's `reflect_limited` padding) so the edge transient is suppressed.
use std::sync::Arc;

use anyhow::{ensure, Result};
use ndarray::{Array2, ArrayViewMut1, Axis};
use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Reusable FFT plans and kernel spectrum for one kernel / signal length.
struct Convolver {
    n_fft: usize,
    n_h: usize,
    h_fft: Vec<Complex<f64>>,
    fwd: Arc<dyn Fft<f64>>,
    inv: Arc<dyn Fft<f64>>,
}

impl Convolver {
    fn new(h: &[f64], n_x: usize) -> Self {
        let n_h = h.len();
        let n_ext = n_x + 2 * (n_h - 1);
        let n_fft = (n_ext + n_h - 1).next_power_of_two();

        let mut planner = FftPlanner::<f64>::new();
        let fwd = planner.plan_fft_forward(n_fft);
        let inv = planner.plan_fft_inverse(n_fft);

        let mut h_fft = to_complex(h, n_fft);
        fwd.process(&mut h_fft);
        Self { n_fft, n_h, h_fft, fwd, inv }
    }

    fn filter(&self, x: &[f64]) -> Vec<f64> {
        let n_x = x.len();
        let n_edge = self.n_h - 1;
        let shift = n_edge / 2;
        let x_ext = reflect_limited_pad(x, n_edge);

        let mut buf = to_complex(&x_ext, self.n_fft);
        self.fwd.process(&mut buf);
        for (b, hf) in buf.iter_mut().zip(&self.h_fft) {
            *b *= hf;
        }
        self.inv.process(&mut buf);

        let scale = 1.0 / self.n_fft as f64;
        buf[n_edge + shift..n_edge + shift + n_x]
            .iter()
            .map(|c| c.re * scale)
            .collect()
    }
}

fn to_complex(x: &[f64], n_fft: usize) -> Vec<Complex<f64>> {
    let mut buf = vec![Complex::default(); n_fft];
    for (b, &v) in buf.iter_mut().zip(x) {
        b.re = v;
    }
    buf
}

/// Odd reflection around the first and last sample, `n_pad` on each side.
///
/// `left[i] = 2·x[0] − x[i]`, `right[i] = 2·x[-1] − x[-1-i]`; padding beyond
/// the signal length is zero-filled.
pub fn reflect_limited_pad(x: &[f64], n_pad: usize) -> Vec<f64> {
    let n = x.len();
    if n == 0 {
        return vec![0.0; 2 * n_pad];
    }
    let k = n_pad.min(n - 1);
    let (first, last) = (x[0], x[n - 1]);

    let mut out = Vec::with_capacity(n + 2 * n_pad);
    out.extend(std::iter::repeat(0.0).take(n_pad - k));
    out.extend((1..=k).rev().map(|i| 2.0 * first - x[i]));
    out.extend_from_slice(x);
    out.extend((1..=k).map(|i| 2.0 * last - x[n - 1 - i]));
    out.extend(std::iter::repeat(0.0).take(n_pad - k));
    out
}

/// Filter one signal with the zero-phase kernel `h` (odd length).
pub fn filter_1d(x: &[f64], h: &[f64]) -> Result<Vec<f64>> {
    ensure!(h.len() % 2 == 1, "zero-phase FIR needs an odd kernel, got {} taps", h.len());
    if x.is_empty() {
        return Ok(vec![]);
    }
    Ok(Convolver::new(h, x.len()).filter(x))
}

/// Filter every row of `data` (`[C, T]`) in place.
pub fn apply_fir_zero_phase(data: &mut Array2<f64>, h: &[f64]) -> Result<()> {
    ensure!(h.len() % 2 == 1, "zero-phase FIR needs an odd kernel, got {} taps", h.len());
    let n_t = data.ncols();
    if n_t == 0 {
        return Ok(());
    }
    let conv = Convolver::new(h, n_t);
    for mut row in data.axis_iter_mut(Axis(0)) {
        let filtered = conv.filter(&row.to_vec());
        assign_row(&mut row, &filtered);
    }
    Ok(())
}

fn assign_row(row: &mut ArrayViewMut1<'_, f64>, values: &[f64]) {
    for (dst, &src) in row.iter_mut().zip(values) {
        *dst = src;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::design::{design_highpass, design_lowpass};

    #[test]
    fn filter_preserves_length() {
        let x: Vec<f64> = (0..1024).map(|i| (i as f64 / 1024.0).sin()).collect();
        let h = design_highpass(0.5, 256.0).unwrap();
        assert_eq!(filter_1d(&x, &h).unwrap().len(), x.len());
    }

    #[test]
    fn highpass_removes_dc() {
        let x = vec![1.0; 4096];
        let h = design_highpass(0.5, 256.0).unwrap();
        let y = filter_1d(&x, &h).unwrap();
        let max_val = y.iter().map(|v| v.abs()).fold(0.0, f64::max);
        assert!(max_val < 1e-6, "DC not removed: max={max_val}");
    }

    #[test]
    fn lowpass_keeps_slow_and_kills_fast() {
        let sfreq = 1000.0;
        let slow: Vec<f64> = (0..4000).map(|i| (2.0 * std::f64::consts::PI * 5.0 * i as f64 / sfreq).sin()).collect();
        let fast: Vec<f64> = (0..4000).map(|i| (2.0 * std::f64::consts::PI * 150.0 * i as f64 / sfreq).sin()).collect();
        let x: Vec<f64> = slow.iter().zip(&fast).map(|(a, b)| a + b).collect();

        let h = design_lowpass(40.0, sfreq).unwrap();
        let y = filter_1d(&x, &h).unwrap();
        let interior = h.len()..x.len() - h.len();
        let err = interior.map(|i| (y[i] - slow[i]).abs()).fold(0.0, f64::max);
        assert!(err < 0.01, "max deviation from 5 Hz component: {err}");
    }

    #[test]
    fn filter_is_zero_phase() {
        // A centred impulse stays centred.
        let mut x = vec![0.0; 201];
        x[100] = 1.0;
        let h = design_lowpass(40.0, 1000.0).unwrap();
        let y = filter_1d(&x, &h).unwrap();
        let peak = y.iter().enumerate().max_by(|a, b| a.1.total_cmp(b.1)).map(|(i, _)| i);
        assert_eq!(peak, Some(100));
    }

    #[test]
    fn rows_are_filtered_independently() {
        let mut data = Array2::from_shape_fn((2, 512), |(c, _)| if c == 0 { 3.0 } else { -1.0 });
        let h = design_highpass(1.0, 256.0).unwrap();
        apply_fir_zero_phase(&mut data, &h).unwrap();
        assert!(data.iter().all(|v| v.abs() < 1e-6));
    }

    #[test]
    fn reflect_limited_left_pad() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let padded = reflect_limited_pad(&x, 3);
        // 2·1 − x[3], 2·1 − x[2], 2·1 − x[1]
        assert_eq!(&padded[..3], &[-2.0, -1.0, 0.0]);
        assert_eq!(&padded[3..8], &x[..]);
        assert_eq!(&padded[8..], &[6.0, 7.0, 8.0]);
    }

    #[test]
    fn even_kernel_is_rejected() {
        assert!(filter_1d(&[1.0, 2.0], &[0.5, 0.5]).is_err());
    }
}
