//! Shared synthetic data for integration tests.
use megdec::{ChannelType, RawRecording, TrialSet};
use ndarray::{Array2, Array3};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

#[allow(unused)]
/// Trials where channel 0 is `+1` for `labels[i] == positive` and `-1`
/// otherwise; every other channel is uniform noise in `[-0.5, 0.5)`.
pub fn separable_trials(labels: &[i64], positive: i64, n_ch: usize, n_t: usize, seed: u64) -> TrialSet {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let data = Array3::from_shape_fn((labels.len(), n_ch, n_t), |(e, c, _)| {
        let noise = rng.random::<f64>() - 0.5;
        if c == 0 {
            if labels[e] == positive { 1.0 } else { -1.0 }
        } else {
            noise
        }
    });
    TrialSet::with_sfreq(data, labels.to_vec(), -0.1, 50.0).unwrap()
}

#[allow(unused)]
/// Pure-noise trials; `data[i, 0, 0]` holds the trial index so selections
/// can be traced back.
pub fn indexed_trials(labels: &[i64], n_ch: usize, n_t: usize, seed: u64) -> TrialSet {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let data = Array3::from_shape_fn((labels.len(), n_ch, n_t), |(e, c, t)| {
        let noise = rng.random::<f64>();
        if c == 0 && t == 0 { e as f64 } else { noise }
    });
    TrialSet::with_sfreq(data, labels.to_vec(), 0.0, 100.0).unwrap()
}

#[allow(unused)]
pub fn repeat_labels(counts: &[(i64, usize)]) -> Vec<i64> {
    counts.iter()
        .flat_map(|&(code, n)| std::iter::repeat(code).take(n))
        .collect()
}

#[allow(unused)]
pub const SFREQ: f64 = 1000.0;

#[allow(unused)]
/// Ten seconds of 1 kHz MEG: two magnetometers, one gradiometer, one EOG
/// and a trigger channel. Events alternate 11 / 12 every second from 1 s to
/// 8 s; magnetometer 0 carries a Gaussian response at +200 ms, positive for
/// 11 and negative for 12.
pub fn synthetic_raw(seed: u64) -> RawRecording {
    let n_t = 10_000;
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut data = Array2::<f64>::zeros((5, n_t));
    for c in 0..4 {
        let scale = if c == 3 { 1e-6 } else { 1e-14 };
        for t in 0..n_t {
            data[[c, t]] = (rng.random::<f64>() - 0.5) * scale;
        }
    }
    for (k, onset) in (1..=8).map(|s| s * 1000).enumerate() {
        let code = if k % 2 == 0 { 11 } else { 12 };
        for t in onset..onset + 10 {
            data[[4, t]] = code as f64;
        }
        let sign = if code == 11 { 1.0 } else { -1.0 };
        for t in onset..onset + 600 {
            let dt = (t - onset) as f64 / SFREQ - 0.2;
            data[[0, t]] += sign * 1e-13 * (-dt * dt / (2.0 * 0.03 * 0.03)).exp();
        }
    }
    RawRecording::new(
        data,
        SFREQ,
        vec!["MEG 0111".into(), "MEG 0121".into(), "MEG 0112".into(), "EOG 061".into(), "STI 101".into()],
        vec![ChannelType::Mag, ChannelType::Mag, ChannelType::Grad, ChannelType::Eog, ChannelType::Stim],
    )
    .unwrap()
}

#[allow(unused)]
pub fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len(), "length mismatch");
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).fold(0.0, f64::max)
}
