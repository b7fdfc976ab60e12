//! Scan outcomes.

use std::time::Duration;

use shield_types::AssetId;

/// Evidence that a probe carries the mark of an already published asset.
#[derive(Clone, Debug, PartialEq)]
pub struct ConflictEvidence {
    pub asset_id: AssetId,
    pub asset_name: String,
    pub score: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Verdict {
    Clear,
    Conflict(ConflictEvidence),
}

impl Verdict {
    pub fn is_clear(&self) -> bool {
        matches!(self, Verdict::Clear)
    }
}

/// Result of one full or early-terminated scan.
#[derive(Clone, Debug, PartialEq)]
pub struct ScanReport {
    pub verdict: Verdict,
    /// Candidates for which the backend was called.
    pub checked: u32,
    /// Candidates whose backend call failed and were skipped.
    pub inconclusive: u32,
    pub elapsed: Duration,
}
