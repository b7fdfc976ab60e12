//! Download ledger records.

use serde::{Deserialize, Serialize};

use crate::{AssetId, Timestamp, UserId};

/// Proof that `downloader` has paid for `asset`.
///
/// `(downloader, asset)` is unique for all time. A record is never deleted,
/// and its existence means the charge for that pair was applied exactly once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub downloader: UserId,
    pub asset: AssetId,
    pub created_at: Timestamp,
}

impl DownloadRecord {
    /// Composite key: `downloader_be ++ asset_be`.
    pub fn key(downloader: UserId, asset: AssetId) -> [u8; 16] {
        let mut key = [0u8; 16];
        key[..8].copy_from_slice(&downloader.to_be_bytes());
        key[8..].copy_from_slice(&asset.to_be_bytes());
        key
    }
}
