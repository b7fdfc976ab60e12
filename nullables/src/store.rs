//! Nullable store: thread-safe in-memory storage for testing.
//!
//! Every table lives behind one mutex, so each trait call is serializable
//! the same way an LMDB write transaction is.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use shield_store::{
    AccountStore, AssetStore, CandidateRegistry, Charge, DownloadStore, MetaStore, StoreError,
};
use shield_types::{Asset, AssetId, Candidate, DownloadRecord, NewAsset, Points, UserId};

#[derive(Default)]
struct Tables {
    assets: BTreeMap<AssetId, Asset>,
    balances: BTreeMap<UserId, Points>,
    downloads: BTreeMap<(UserId, AssetId), DownloadRecord>,
    last_asset_id: u64,
    schema_version: u32,
}

/// An in-memory implementation of every store trait.
/// Thread-safe for use with tokio's multi-threaded runtime.
#[derive(Default)]
pub struct NullStore {
    tables: Mutex<Tables>,
    fail_asset_inserts: AtomicBool,
}

impl NullStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed balances in one call.
    pub fn with_balances(balances: &[(u64, u64)]) -> Self {
        let store = Self::new();
        {
            let mut tables = store.tables.lock().unwrap();
            for &(user, points) in balances {
                tables.balances.insert(UserId::new(user), Points::new(points));
            }
        }
        store
    }

    /// Make every following `insert_asset` fail with a backend error.
    pub fn fail_asset_inserts(&self, fail: bool) {
        self.fail_asset_inserts.store(fail, Ordering::SeqCst);
    }
}

impl AssetStore for NullStore {
    fn insert_asset(&self, asset: NewAsset) -> Result<Asset, StoreError> {
        if self.fail_asset_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("asset insert disabled".into()));
        }
        let mut tables = self.tables.lock().unwrap();
        tables.last_asset_id += 1;
        let asset = asset.with_id(AssetId::new(tables.last_asset_id));
        tables.assets.insert(asset.id, asset.clone());
        Ok(asset)
    }

    fn get_asset(&self, id: AssetId) -> Result<Asset, StoreError> {
        self.tables
            .lock()
            .unwrap()
            .assets
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("asset {id}")))
    }

    fn asset_count(&self) -> Result<u64, StoreError> {
        Ok(self.tables.lock().unwrap().assets.len() as u64)
    }
}

impl CandidateRegistry for NullStore {
    fn candidates_after(
        &self,
        cursor: Option<AssetId>,
        limit: usize,
    ) -> Result<Vec<Candidate>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .assets
            .values()
            .filter(|a| cursor.map_or(true, |c| a.id > c))
            .filter_map(Asset::candidate)
            .take(limit)
            .collect())
    }

    fn candidate_count(&self) -> Result<u64, StoreError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .assets
            .values()
            .filter(|a| a.mark_descriptor.is_some())
            .count() as u64)
    }
}

impl AccountStore for NullStore {
    fn get_balance(&self, user: UserId) -> Result<Points, StoreError> {
        self.tables
            .lock()
            .unwrap()
            .balances
            .get(&user)
            .copied()
            .ok_or_else(|| StoreError::NotFound(format!("balance for user {user}")))
    }

    fn put_balance(&self, user: UserId, points: Points) -> Result<(), StoreError> {
        self.tables.lock().unwrap().balances.insert(user, points);
        Ok(())
    }

    fn credit(&self, user: UserId, points: Points) -> Result<Points, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let balance = tables
            .balances
            .get_mut(&user)
            .ok_or_else(|| StoreError::NotFound(format!("balance for user {user}")))?;
        *balance = balance
            .checked_add(points)
            .ok_or_else(|| StoreError::Overflow(format!("balance for user {user}")))?;
        Ok(*balance)
    }

    fn iter_balances(&self) -> Result<Vec<(UserId, Points)>, StoreError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .balances
            .iter()
            .map(|(u, p)| (*u, *p))
            .collect())
    }
}

impl DownloadStore for NullStore {
    fn get_download(
        &self,
        downloader: UserId,
        asset: AssetId,
    ) -> Result<Option<DownloadRecord>, StoreError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .downloads
            .get(&(downloader, asset))
            .cloned())
    }

    fn apply_charge(&self, charge: &Charge) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let record = &charge.record;
        let key = (record.downloader, record.asset);
        if tables.downloads.contains_key(&key) {
            return Err(StoreError::Duplicate(format!(
                "download ({}, {})",
                record.downloader, record.asset
            )));
        }

        // Validate everything before the first write.
        let buyer = *tables.balances.get(&record.downloader).ok_or_else(|| {
            StoreError::NotFound(format!("balance for user {}", record.downloader))
        })?;
        let debited = buyer
            .checked_sub(charge.price)
            .ok_or(StoreError::InsufficientBalance {
                needed: charge.price.get(),
                available: buyer.get(),
            })?;
        let seller = *tables
            .balances
            .get(&charge.owner)
            .ok_or_else(|| StoreError::NotFound(format!("balance for user {}", charge.owner)))?;
        // Buyer and seller are distinct, so crediting the pre-debit seller
        // balance is correct.
        let credited = seller
            .checked_add(charge.price)
            .ok_or_else(|| StoreError::Overflow(format!("balance for user {}", charge.owner)))?;

        tables.balances.insert(record.downloader, debited);
        tables.balances.insert(charge.owner, credited);
        tables.downloads.insert(key, record.clone());
        Ok(())
    }

    fn downloads_for_user(&self, downloader: UserId) -> Result<Vec<DownloadRecord>, StoreError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .downloads
            .range((downloader, AssetId::new(0))..=(downloader, AssetId::new(u64::MAX)))
            .map(|(_, r)| r.clone())
            .collect())
    }

    fn download_count(&self) -> Result<u64, StoreError> {
        Ok(self.tables.lock().unwrap().downloads.len() as u64)
    }
}

impl MetaStore for NullStore {
    fn get_schema_version(&self) -> Result<u32, StoreError> {
        Ok(self.tables.lock().unwrap().schema_version)
    }

    fn set_schema_version(&self, version: u32) -> Result<(), StoreError> {
        self.tables.lock().unwrap().schema_version = version;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shield_types::{ContentRef, Timestamp};

    fn new_asset(name: &str, marked: bool) -> NewAsset {
        NewAsset {
            content: ContentRef::join("uploads/images", name).unwrap(),
            original: ContentRef::join("uploads/original", name).unwrap(),
            mark_descriptor: marked.then(|| ContentRef::join("uploads/meta", name).unwrap()),
            caption: String::new(),
            category: "misc".into(),
            price: Points::new(1),
            owner: UserId::new(1),
            created_at: Timestamp::EPOCH,
        }
    }

    #[test]
    fn ids_increase_and_candidates_skip_unmarked() {
        let store = NullStore::new();
        let a = store.insert_asset(new_asset("a.png", true)).unwrap();
        store.insert_asset(new_asset("b.png", false)).unwrap();
        let c = store.insert_asset(new_asset("c.png", true)).unwrap();
        assert!(a.id < c.id);

        let page = store.candidates_after(None, 10).unwrap();
        assert_eq!(page.iter().map(|c| c.id).collect::<Vec<_>>(), vec![a.id, c.id]);
        let rest = store.candidates_after(Some(a.id), 10).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(store.candidate_count().unwrap(), 2);
    }

    #[test]
    fn failing_inserts_leave_no_row() {
        let store = NullStore::new();
        store.fail_asset_inserts(true);
        assert!(store.insert_asset(new_asset("a.png", true)).is_err());
        assert_eq!(store.asset_count().unwrap(), 0);
    }

    #[test]
    fn charge_is_all_or_nothing() {
        let store = NullStore::with_balances(&[(2, 10)]);
        let charge = Charge {
            record: DownloadRecord {
                downloader: UserId::new(2),
                asset: AssetId::new(1),
                created_at: Timestamp::EPOCH,
            },
            owner: UserId::new(1),
            price: Points::new(5),
        };
        // Owner has no balance row.
        assert!(matches!(
            store.apply_charge(&charge),
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(store.get_balance(UserId::new(2)).unwrap(), Points::new(10));
        assert_eq!(store.download_count().unwrap(), 0);

        store.put_balance(UserId::new(1), Points::ZERO).unwrap();
        store.apply_charge(&charge).unwrap();
        assert!(matches!(
            store.apply_charge(&charge),
            Err(StoreError::Duplicate(_))
        ));
        assert_eq!(store.total_points().unwrap(), Points::new(10));
    }
}
