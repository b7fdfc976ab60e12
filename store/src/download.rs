//! Download record storage and the atomic charge.

use crate::StoreError;
use shield_types::{AssetId, DownloadRecord, Points, UserId};

/// The three effects of a paid download, applied as one unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Charge {
    pub record: DownloadRecord,
    /// Asset owner, credited with `price`.
    pub owner: UserId,
    pub price: Points,
}

/// Trait for download ledger storage.
///
/// Records are keyed by `(downloader, asset)`. There is no delete.
pub trait DownloadStore {
    fn get_download(
        &self,
        downloader: UserId,
        asset: AssetId,
    ) -> Result<Option<DownloadRecord>, StoreError>;

    /// Debit the downloader, credit the owner, and insert the record in one
    /// serializable transaction.
    ///
    /// Fails without any effect when:
    /// - a record for the pair already exists ([`StoreError::Duplicate`]),
    /// - the downloader's balance is below the price at commit time
    ///   ([`StoreError::InsufficientBalance`]),
    /// - either account is missing ([`StoreError::NotFound`]).
    fn apply_charge(&self, charge: &Charge) -> Result<(), StoreError>;

    fn downloads_for_user(&self, downloader: UserId) -> Result<Vec<DownloadRecord>, StoreError>;

    fn download_count(&self) -> Result<u64, StoreError>;
}
