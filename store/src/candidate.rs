//! Candidate registry: read access to previously published, mark-bearing assets.

use crate::StoreError;
use shield_types::{AssetId, Candidate};

/// Read-only view over assets that carry a mark-descriptor.
///
/// Order is ascending asset id. This order decides which match is reported
/// when several candidates match the same probe.
pub trait CandidateRegistry {
    /// Up to `limit` candidates with id strictly greater than `cursor`
    /// (or from the beginning if `None`), ascending by id.
    fn candidates_after(
        &self,
        cursor: Option<AssetId>,
        limit: usize,
    ) -> Result<Vec<Candidate>, StoreError>;

    fn candidate_count(&self) -> Result<u64, StoreError>;
}
