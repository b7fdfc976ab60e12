//! LMDB implementation of DownloadStore.
//!
//! Key format: `downloader_be ++ asset_be` (16-byte composite key), so all
//! records of one downloader form a contiguous key range.

use std::ops::Bound;

use shield_store::{Charge, DownloadStore, StoreError};
use shield_types::{AssetId, DownloadRecord, UserId};

use crate::{LmdbEnvironment, LmdbError};

impl DownloadStore for LmdbEnvironment {
    fn get_download(
        &self,
        downloader: UserId,
        asset: AssetId,
    ) -> Result<Option<DownloadRecord>, StoreError> {
        let key = DownloadRecord::key(downloader, asset);
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        let val = self
            .downloads_db
            .get(&rtxn, &key)
            .map_err(LmdbError::from)?;
        match val {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes).map_err(LmdbError::from)?)),
            None => Ok(None),
        }
    }

    fn apply_charge(&self, charge: &Charge) -> Result<(), StoreError> {
        let mut batch = self.write_batch()?;
        batch.insert_download(&charge.record)?;
        batch.debit(charge.record.downloader, charge.price)?;
        batch.credit(charge.owner, charge.price)?;
        batch.commit()
    }

    fn downloads_for_user(&self, downloader: UserId) -> Result<Vec<DownloadRecord>, StoreError> {
        let prefix = downloader.to_be_bytes();
        let next = downloader.get().checked_add(1).map(u64::to_be_bytes);
        let lower: Bound<&[u8]> = Bound::Included(&prefix[..]);
        let upper: Bound<&[u8]> = match &next {
            Some(bytes) => Bound::Excluded(&bytes[..]),
            None => Bound::Unbounded,
        };

        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        let iter = self
            .downloads_db
            .range(&rtxn, &(lower, upper))
            .map_err(LmdbError::from)?;
        let mut results: Vec<DownloadRecord> = Vec::new();
        for result in iter {
            let (_key, val) = result.map_err(LmdbError::from)?;
            results.push(bincode::deserialize(val).map_err(LmdbError::from)?);
        }
        Ok(results)
    }

    fn download_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        let count = self.downloads_db.len(&rtxn).map_err(LmdbError::from)?;
        Ok(count)
    }
}
