//! Error taxonomy for the decoding pipeline.
//!
//! Fatal conditions are [`DecodeError`] variants. Zero-variance features are
//! not errors; they are collected in [`DecodingDiagnostics`] and returned with
//! the result.
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecodeError {
    /// The analysis request cannot be satisfied by the data; the caller must
    /// change the request (triggers, folds, combine pairs, ...).
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Inputs that must align along an axis do not.
    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl DecodeError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn shape(context: &'static str, expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch {
            context,
            expected,
            actual,
        }
    }
}

/// A channel that had zero variance across trials at one time sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DegenerateFeature {
    pub sample: usize,
    pub channel: usize,
}

/// Non-fatal conditions observed while decoding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodingDiagnostics {
    /// Sorted by `(sample, channel)`.
    pub degenerate: Vec<DegenerateFeature>,
}

impl DecodingDiagnostics {
    pub fn has_degenerate_features(&self) -> bool {
        !self.degenerate.is_empty()
    }

    /// Distinct time-sample indices with at least one constant channel.
    pub fn degenerate_samples(&self) -> Vec<usize> {
        let mut samples: Vec<usize> = self.degenerate.iter().map(|d| d.sample).collect();
        samples.dedup();
        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_mentions_context() {
        let e = DecodeError::shape("label vector", 40, 39);
        assert_eq!(
            e.to_string(),
            "shape mismatch in label vector: expected 40, got 39"
        );
    }

    #[test]
    fn degenerate_samples_are_distinct() {
        let d = DecodingDiagnostics {
            degenerate: vec![
                DegenerateFeature { sample: 0, channel: 1 },
                DegenerateFeature { sample: 0, channel: 3 },
                DegenerateFeature { sample: 4, channel: 1 },
            ],
        };
        assert!(d.has_degenerate_features());
        assert_eq!(d.degenerate_samples(), vec![0, 4]);
    }
}
