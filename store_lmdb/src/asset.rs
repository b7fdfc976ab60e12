//! LMDB implementation of AssetStore and CandidateRegistry.
//!
//! The candidate registry is a separate database keyed by asset id, written
//! in the same transaction as the asset row. A range scan starting just
//! past the cursor yields candidates in ascending id order.

use std::ops::Bound;

use shield_store::{AssetStore, CandidateRegistry, StoreError};
use shield_types::{Asset, AssetId, Candidate, NewAsset};

use crate::{LmdbEnvironment, LmdbError};

impl AssetStore for LmdbEnvironment {
    fn insert_asset(&self, asset: NewAsset) -> Result<Asset, StoreError> {
        let mut batch = self.write_batch()?;
        let id = batch.next_asset_id()?;
        let asset = asset.with_id(id);
        batch.put_asset(&asset)?;
        batch.commit()?;
        tracing::debug!(asset = %id, marked = asset.mark_descriptor.is_some(), "asset committed");
        Ok(asset)
    }

    fn get_asset(&self, id: AssetId) -> Result<Asset, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        let val = self
            .assets_db
            .get(&rtxn, &id.to_be_bytes())
            .map_err(LmdbError::from)?
            .ok_or_else(|| LmdbError::NotFound(format!("asset {id}")))?;
        let asset: Asset = bincode::deserialize(val).map_err(LmdbError::from)?;
        Ok(asset)
    }

    fn asset_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        let count = self.assets_db.len(&rtxn).map_err(LmdbError::from)?;
        Ok(count)
    }
}

impl CandidateRegistry for LmdbEnvironment {
    fn candidates_after(
        &self,
        cursor: Option<AssetId>,
        limit: usize,
    ) -> Result<Vec<Candidate>, StoreError> {
        let start = cursor.map(|c| c.to_be_bytes());
        let lower: Bound<&[u8]> = match &start {
            Some(bytes) => Bound::Excluded(&bytes[..]),
            None => Bound::Unbounded,
        };
        let upper: Bound<&[u8]> = Bound::Unbounded;

        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        let iter = self
            .candidates_db
            .range(&rtxn, &(lower, upper))
            .map_err(LmdbError::from)?;
        let mut results = Vec::with_capacity(limit.min(256));
        for result in iter.take(limit) {
            let (_key, val) = result.map_err(LmdbError::from)?;
            let candidate: Candidate = bincode::deserialize(val).map_err(LmdbError::from)?;
            results.push(candidate);
        }
        Ok(results)
    }

    fn candidate_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        let count = self.candidates_db.len(&rtxn).map_err(LmdbError::from)?;
        Ok(count)
    }
}
