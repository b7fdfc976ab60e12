//! Write batching: groups several store operations into a single LMDB write
//! transaction so they commit together or not at all.
//!
//! # Usage
//!
//! ```ignore
//! let mut batch = env.write_batch()?;
//! batch.insert_download(&record)?;
//! batch.debit(downloader, price)?;
//! batch.credit(owner, price)?;
//! batch.commit()?;
//! ```
//!
//! If the batch is dropped without calling [`WriteBatch::commit`], all
//! operations are rolled back (the underlying LMDB transaction is aborted).

use heed::{PutFlags, RwTxn};

use shield_store::StoreError;
use shield_types::{Asset, AssetId, DownloadRecord, Points, UserId};

use crate::environment::LmdbEnvironment;
use crate::LmdbError;

pub(crate) const NEXT_ASSET_ID_KEY: &[u8] = b"next_asset_id";

/// A write batch that groups multiple store operations into a single LMDB
/// write transaction.
pub struct WriteBatch<'a> {
    txn: RwTxn<'a>,
    env: &'a LmdbEnvironment,
}

impl<'a> WriteBatch<'a> {
    pub(crate) fn new(env: &'a LmdbEnvironment) -> Result<Self, StoreError> {
        let txn = env.env().write_txn().map_err(LmdbError::from)?;
        Ok(Self { txn, env })
    }

    // ── Asset operations ────────────────────────────────────────────────

    /// Reserve the next asset id. Ids start at 1 and never repeat, even if
    /// the batch that reserved one is later aborted and retried.
    pub fn next_asset_id(&mut self) -> Result<AssetId, StoreError> {
        let next = match self
            .env
            .meta_db
            .get(&self.txn, NEXT_ASSET_ID_KEY)
            .map_err(LmdbError::from)?
        {
            Some(bytes) => {
                let arr: [u8; 8] = bytes.try_into().map_err(|_| {
                    StoreError::Corruption("next_asset_id has unexpected byte length".into())
                })?;
                u64::from_be_bytes(arr)
            }
            None => 1,
        };
        let following = next
            .checked_add(1)
            .ok_or_else(|| StoreError::Overflow("asset id counter".into()))?;
        self.env
            .meta_db
            .put(&mut self.txn, NEXT_ASSET_ID_KEY, &following.to_be_bytes())
            .map_err(LmdbError::from)?;
        Ok(AssetId::new(next))
    }

    /// Put an asset row, and its candidate index entry when it carries a mark.
    pub fn put_asset(&mut self, asset: &Asset) -> Result<(), StoreError> {
        let key = asset.id.to_be_bytes();
        let bytes = bincode::serialize(asset).map_err(LmdbError::from)?;
        self.env
            .assets_db
            .put(&mut self.txn, &key, &bytes)
            .map_err(LmdbError::from)?;

        if let Some(candidate) = asset.candidate() {
            let bytes = bincode::serialize(&candidate).map_err(LmdbError::from)?;
            self.env
                .candidates_db
                .put(&mut self.txn, &key, &bytes)
                .map_err(LmdbError::from)?;
        }
        Ok(())
    }

    // ── Balance operations ──────────────────────────────────────────────

    fn read_balance(&self, user: UserId) -> Result<Option<Points>, StoreError> {
        let val = self
            .env
            .balances_db
            .get(&self.txn, &user.to_be_bytes())
            .map_err(LmdbError::from)?;
        match val {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes).map_err(LmdbError::from)?)),
            None => Ok(None),
        }
    }

    /// Create or overwrite a balance row.
    pub fn put_balance(&mut self, user: UserId, points: Points) -> Result<(), StoreError> {
        let bytes = bincode::serialize(&points).map_err(LmdbError::from)?;
        self.env
            .balances_db
            .put(&mut self.txn, &user.to_be_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        Ok(())
    }

    /// Subtract `amount` from an existing balance, refusing to go below zero.
    pub fn debit(&mut self, user: UserId, amount: Points) -> Result<Points, StoreError> {
        let current = self
            .read_balance(user)?
            .ok_or_else(|| StoreError::NotFound(format!("balance for user {user}")))?;
        let updated = current
            .checked_sub(amount)
            .ok_or(StoreError::InsufficientBalance {
                needed: amount.get(),
                available: current.get(),
            })?;
        self.put_balance(user, updated)?;
        Ok(updated)
    }

    /// Add `amount` to an existing balance.
    pub fn credit(&mut self, user: UserId, amount: Points) -> Result<Points, StoreError> {
        let current = self
            .read_balance(user)?
            .ok_or_else(|| StoreError::NotFound(format!("balance for user {user}")))?;
        let updated = current
            .checked_add(amount)
            .ok_or_else(|| StoreError::Overflow(format!("balance for user {user}")))?;
        self.put_balance(user, updated)?;
        Ok(updated)
    }

    // ── Download operations ─────────────────────────────────────────────

    /// Insert a download record unless one already exists for the pair.
    ///
    /// The existence check is LMDB's own `NO_OVERWRITE` put, evaluated inside
    /// the (single-writer) transaction.
    pub fn insert_download(&mut self, record: &DownloadRecord) -> Result<(), StoreError> {
        let key = DownloadRecord::key(record.downloader, record.asset);
        let bytes = bincode::serialize(record).map_err(LmdbError::from)?;
        match self.env.downloads_db.put_with_flags(
            &mut self.txn,
            PutFlags::NO_OVERWRITE,
            &key,
            &bytes,
        ) {
            Ok(()) => Ok(()),
            Err(heed::Error::Mdb(heed::MdbError::KeyExist)) => Err(StoreError::Duplicate(format!(
                "download ({}, {})",
                record.downloader, record.asset
            ))),
            Err(e) => Err(LmdbError::from(e).into()),
        }
    }

    // ── Commit / rollback ───────────────────────────────────────────────

    /// Commit all batched operations in a single write transaction.
    pub fn commit(self) -> Result<(), StoreError> {
        self.txn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LmdbEnvironment;
    use shield_store::AccountStore;

    fn temp_env() -> (tempfile::TempDir, LmdbEnvironment) {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let env = LmdbEnvironment::open(dir.path(), 8, 10 * 1024 * 1024)
            .expect("failed to open env");
        (dir, env)
    }

    #[test]
    fn dropped_batch_does_not_persist() {
        let (_dir, env) = temp_env();
        {
            let mut batch = env.write_batch().expect("write_batch");
            batch
                .put_balance(UserId::new(1), Points::new(10))
                .expect("put_balance");
        }
        assert!(!env.account_exists(UserId::new(1)).unwrap());
    }

    #[test]
    fn asset_ids_start_at_one_and_increase() {
        let (_dir, env) = temp_env();
        let mut batch = env.write_batch().unwrap();
        assert_eq!(batch.next_asset_id().unwrap(), AssetId::new(1));
        assert_eq!(batch.next_asset_id().unwrap(), AssetId::new(2));
        batch.commit().unwrap();

        let mut batch = env.write_batch().unwrap();
        assert_eq!(batch.next_asset_id().unwrap(), AssetId::new(3));
    }

    #[test]
    fn debit_refuses_underflow() {
        let (_dir, env) = temp_env();
        let user = UserId::new(4);
        env.put_balance(user, Points::new(5)).unwrap();

        let mut batch = env.write_batch().unwrap();
        let err = batch.debit(user, Points::new(6)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::InsufficientBalance { needed: 6, available: 5 }
        ));
    }

    #[test]
    fn second_insert_of_same_pair_is_duplicate() {
        let (_dir, env) = temp_env();
        let record = DownloadRecord {
            downloader: UserId::new(2),
            asset: AssetId::new(1),
            created_at: shield_types::Timestamp::EPOCH,
        };
        let mut batch = env.write_batch().unwrap();
        batch.insert_download(&record).unwrap();
        let err = batch.insert_download(&record).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }
}
