//! Verification of new content against the protected corpus.
//!
//! The orchestrator walks every mark-bearing asset in ascending id order and
//! asks the detection backend whether the probe carries that asset's mark.
//! The first positive ends the scan (first match, not best match). A failed
//! backend call makes that one candidate inconclusive; the scan moves on.

pub mod error;
pub mod orchestrator;
pub mod scan;
pub mod verdict;

pub use error::VerificationError;
pub use orchestrator::{VerificationOrchestrator, DEFAULT_SCAN_PAGE_SIZE};
pub use scan::CandidateScan;
pub use verdict::{ConflictEvidence, ScanReport, Verdict};
