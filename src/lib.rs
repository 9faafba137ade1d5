//! # megdec: time-resolved MEG decoding
//!
//! `megdec` asks, sample by sample, whether the spatial pattern of brain
//! activity tells two (or more) experimental conditions apart better than
//! chance. A linear classifier is cross-validated independently at every
//! time point after the stimulus, and a label-permutation null gives the
//! chance band for each of them.
//!
//! ## Pipeline overview
//!
//! ```text
//! raw.safetensors  (continuous MEG + trigger channel)
//!   │
//!   ├─ preprocess::preprocess_recording()
//!   │    bad channels → crop → FIR band-pass → SSP → ICA exclusion
//!   │    → find_events → epoch → reject → MEG pick → baseline → decimate
//!   │
//!   └─→ Epochs [E, C, T] + trigger codes
//!          │
//!          ├─ decode::labels       keep requested triggers, merge code pairs
//!          ├─ decode::balance      undersample to the smallest class
//!          ├─ decode (per sample)  standardize → stratified k-fold CV
//!          ├─ decode (per sample)  N label permutations → null accuracies
//!          └─ decode::summary      accuracy, null band, p-values
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use megdec::{decode, DecodingConfig, TrialSet};
//! use ndarray::Array3;
//!
//! // 40 trials × 10 channels × 5 samples, two classes.
//! let data = Array3::<f64>::zeros((40, 10, 5));
//! let labels: Vec<i64> = (0..40).map(|i| if i < 20 { 1 } else { 2 }).collect();
//! let trials = TrialSet::with_sfreq(data, labels, 0.0, 100.0).unwrap();
//!
//! let cfg = DecodingConfig { triggers: vec![1, 2], ..DecodingConfig::default() };
//! let outcome = decode::run(&trials, &cfg).unwrap();
//! for t in 0..outcome.summary.len() {
//!     println!(
//!         "{:.3} s  acc {:.2}  null [{:.2}, {:.2}]",
//!         outcome.summary.times[t],
//!         outcome.summary.accuracy[t],
//!         outcome.summary.lower[t],
//!         outcome.summary.upper[t],
//!     );
//! }
//! ```
//!
//! Randomness (balancing, fold shuffling, permutations) comes from streams
//! derived from [`DecodingConfig::seed`]; results do not depend on the
//! number of worker threads.

pub mod conditions;
pub mod config;
pub mod decode;
pub mod epoch;
pub mod error;
pub mod events;
pub mod filter;
pub mod ica;
pub mod io;
pub mod normalize;
pub mod preprocess;
pub mod projection;
pub mod raw;
pub mod reject;
pub mod rng;
pub mod trials;

// ── Crate-root re-exports ─────────────────────────────────────────────────

pub use conditions::{Condition, ConditionTable};
pub use config::{DecodingConfig, IcaExclusions, PreprocessConfig, RejectThresholds};
pub use decode::classifier::{ClassifierConfig, LogisticRegression, Penalty};
pub use decode::{run, DecodingOutcome, DecodingSummary};
pub use error::{DecodeError, DecodingDiagnostics, DegenerateFeature};
pub use events::{find_events, Event};
pub use ica::IcaSolution;
pub use preprocess::{concatenate_epochs, preprocess_recording, Epochs};
pub use raw::{ChannelType, RawRecording};
pub use trials::TrialSet;
