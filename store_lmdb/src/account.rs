//! LMDB implementation of AccountStore.

use shield_store::{AccountStore, StoreError};
use shield_types::{Points, UserId};

use crate::{LmdbEnvironment, LmdbError};

impl AccountStore for LmdbEnvironment {
    fn get_balance(&self, user: UserId) -> Result<Points, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        let val = self
            .balances_db
            .get(&rtxn, &user.to_be_bytes())
            .map_err(LmdbError::from)?
            .ok_or_else(|| LmdbError::NotFound(format!("balance for user {user}")))?;
        let points: Points = bincode::deserialize(val).map_err(LmdbError::from)?;
        Ok(points)
    }

    fn put_balance(&self, user: UserId, points: Points) -> Result<(), StoreError> {
        let mut batch = self.write_batch()?;
        batch.put_balance(user, points)?;
        batch.commit()
    }

    fn credit(&self, user: UserId, points: Points) -> Result<Points, StoreError> {
        let mut batch = self.write_batch()?;
        let updated = batch.credit(user, points)?;
        batch.commit()?;
        Ok(updated)
    }

    fn iter_balances(&self) -> Result<Vec<(UserId, Points)>, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        let iter = self.balances_db.iter(&rtxn).map_err(LmdbError::from)?;
        let mut results = Vec::new();
        for result in iter {
            let (key, val) = result.map_err(LmdbError::from)?;
            let key: [u8; 8] = key
                .try_into()
                .map_err(|_| StoreError::Corruption("balance key is not 8 bytes".into()))?;
            let points: Points = bincode::deserialize(val).map_err(LmdbError::from)?;
            results.push((UserId::from_be_bytes(key), points));
        }
        Ok(results)
    }
}
