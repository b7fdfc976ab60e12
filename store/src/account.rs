//! Account balance storage trait.

use crate::StoreError;
use shield_types::{Points, UserId};

/// Per-user point balances.
///
/// A user without a balance row does not exist as far as the ledger is
/// concerned; `get_balance` reports [`StoreError::NotFound`] for them.
pub trait AccountStore {
    fn get_balance(&self, user: UserId) -> Result<Points, StoreError>;

    /// Create or overwrite a balance row.
    fn put_balance(&self, user: UserId, points: Points) -> Result<(), StoreError>;

    /// Add points to an existing balance and return the new balance.
    fn credit(&self, user: UserId, points: Points) -> Result<Points, StoreError>;

    fn account_exists(&self, user: UserId) -> Result<bool, StoreError> {
        match self.get_balance(user) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Every balance row, ordered by user id.
    fn iter_balances(&self) -> Result<Vec<(UserId, Points)>, StoreError>;

    /// Sum of all balances. Unchanged by any download.
    fn total_points(&self) -> Result<Points, StoreError> {
        Ok(self.iter_balances()?.into_iter().map(|(_, p)| p).sum())
    }
}
