//! FIR filter design and application.
//!
//! - [`design`]: Hamming-windowed sinc low-, high- and band-pass design,
//!   matching `mne.filter.create_filter(fir_window='hamming', phase='zero')`.
//! - [`apply`]: FFT convolution with MNE's reflect-limited edge padding.

pub mod apply;
pub mod design;

pub use apply::{apply_fir_zero_phase, filter_1d, reflect_limited_pad};
pub use design::{
    auto_filter_length, design_filter, design_highpass, design_lowpass, firwin_lowpass, hamming,
    highpass_trans_bandwidth, lowpass_trans_bandwidth,
};
