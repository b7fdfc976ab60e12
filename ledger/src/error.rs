use shield_store::StoreError;
use shield_types::{AssetId, Points, UserId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("asset {0} not found")]
    AssetNotFound(AssetId),

    #[error("no balance for user {0}")]
    AccountNotFound(UserId),

    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Points, available: Points },

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}
