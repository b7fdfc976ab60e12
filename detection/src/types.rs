//! Request and response types of the detection contract.

use std::path::{Path, PathBuf};

use crate::ProtectionMark;

/// Inputs of an `embed` call.
#[derive(Clone, Copy, Debug)]
pub struct EmbedRequest<'a> {
    pub cover: &'a Path,
    pub mark: &'a ProtectionMark,
    /// Where the backend must write the marked image.
    pub marked_output: &'a Path,
    /// Where the backend must write the mark-descriptor.
    pub descriptor_output: &'a Path,
}

/// Inputs of a `check` call.
#[derive(Clone, Copy, Debug)]
pub struct CheckRequest<'a> {
    /// The newly submitted content.
    pub probe: &'a Path,
    /// The candidate's original (unmarked) content.
    pub cover: &'a Path,
    pub descriptor: &'a Path,
    pub mark: &'a ProtectionMark,
}

/// Where a successful `embed` left its artifacts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkedArtifacts {
    pub content: PathBuf,
    pub descriptor: PathBuf,
}

/// Outcome of a `check` call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CheckReport {
    pub detected: bool,
    /// Similarity score in `[0.0, 1.0]`.
    pub score: f64,
}

impl CheckReport {
    /// Build a report, clamping the score into `[0.0, 1.0]`.
    /// Returns `None` for a NaN score.
    pub fn new(detected: bool, score: f64) -> Option<Self> {
        if score.is_nan() {
            return None;
        }
        Some(Self {
            detected,
            score: score.clamp(0.0, 1.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_are_clamped() {
        assert_eq!(CheckReport::new(false, -0.3).unwrap().score, 0.0);
        assert_eq!(CheckReport::new(true, 1.7).unwrap().score, 1.0);
        assert_eq!(CheckReport::new(true, 0.9).unwrap().score, 0.9);
    }

    #[test]
    fn nan_score_is_rejected() {
        assert!(CheckReport::new(true, f64::NAN).is_none());
    }
}
