//! The download ledger.

use std::sync::Arc;

use serde::Serialize;
use shield_store::{Charge, ShieldStore, StoreError};
use shield_types::{AssetId, Clock, ContentRef, DownloadRecord, Points, UserId};

use crate::LedgerError;

/// What a successful download did to the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DownloadOutcome {
    /// The downloader owns the asset. Nothing recorded, nothing charged.
    OwnerFreeAccess,
    /// The pair was charged before. Nothing changed.
    AlreadyDownloaded,
    /// Points moved from downloader to owner and the pair was recorded.
    Charged { price: Points },
}

impl DownloadOutcome {
    /// Points the downloader paid in this call.
    pub fn points_spent(&self) -> Points {
        match self {
            DownloadOutcome::Charged { price } => *price,
            _ => Points::ZERO,
        }
    }
}

/// A granted download: the outcome and where the content lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadGrant {
    pub outcome: DownloadOutcome,
    pub content: ContentRef,
}

pub struct DownloadLedger<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: ShieldStore> DownloadLedger<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Grant `downloader` access to `asset_id`, charging them if needed.
    ///
    /// Checks run in a fixed order: asset exists, owner access, repeat
    /// download, balance. Every error is returned before any mutation.
    pub fn download(
        &self,
        downloader: UserId,
        asset_id: AssetId,
    ) -> Result<DownloadGrant, LedgerError> {
        let asset = self.store.get_asset(asset_id).map_err(|e| match e {
            StoreError::NotFound(_) => LedgerError::AssetNotFound(asset_id),
            other => LedgerError::Storage(other),
        })?;
        let grant = |outcome| DownloadGrant {
            outcome,
            content: asset.content.clone(),
        };

        if downloader == asset.owner {
            tracing::debug!(asset = %asset_id, user = %downloader, "owner download");
            return Ok(grant(DownloadOutcome::OwnerFreeAccess));
        }

        // Fast path only; the storage layer's uniqueness check is what
        // makes concurrent duplicates safe.
        if self.store.get_download(downloader, asset_id)?.is_some() {
            return Ok(grant(DownloadOutcome::AlreadyDownloaded));
        }

        let available = self.balance(downloader)?;
        if available < asset.price {
            return Err(LedgerError::InsufficientBalance {
                needed: asset.price,
                available,
            });
        }
        if !self.store.account_exists(asset.owner)? {
            return Err(LedgerError::AccountNotFound(asset.owner));
        }

        let charge = Charge {
            record: DownloadRecord {
                downloader,
                asset: asset_id,
                created_at: self.clock.now(),
            },
            owner: asset.owner,
            price: asset.price,
        };
        match self.store.apply_charge(&charge) {
            Ok(()) => {
                tracing::info!(
                    asset = %asset_id,
                    downloader = %downloader,
                    owner = %asset.owner,
                    price = %asset.price,
                    "download charged"
                );
                Ok(grant(DownloadOutcome::Charged { price: asset.price }))
            }
            Err(StoreError::Duplicate(_)) => {
                tracing::debug!(asset = %asset_id, downloader = %downloader, "concurrent repeat download");
                Ok(grant(DownloadOutcome::AlreadyDownloaded))
            }
            Err(StoreError::InsufficientBalance { needed, available }) => {
                Err(LedgerError::InsufficientBalance {
                    needed: Points::new(needed),
                    available: Points::new(available),
                })
            }
            Err(StoreError::NotFound(_)) => Err(LedgerError::AccountNotFound(asset.owner)),
            Err(e) => Err(e.into()),
        }
    }

    pub fn balance(&self, user: UserId) -> Result<Points, LedgerError> {
        self.store.get_balance(user).map_err(|e| match e {
            StoreError::NotFound(_) => LedgerError::AccountNotFound(user),
            other => LedgerError::Storage(other),
        })
    }

    /// Create a zero balance for `user` unless one exists.
    pub fn open_account(&self, user: UserId) -> Result<Points, LedgerError> {
        match self.store.get_balance(user) {
            Ok(points) => Ok(points),
            Err(StoreError::NotFound(_)) => {
                self.store.put_balance(user, Points::ZERO)?;
                tracing::info!(user = %user, "account opened");
                Ok(Points::ZERO)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Grant points to an existing account. Returns the new balance.
    pub fn credit(&self, user: UserId, points: Points) -> Result<Points, LedgerError> {
        let balance = self.store.credit(user, points).map_err(|e| match e {
            StoreError::NotFound(_) => LedgerError::AccountNotFound(user),
            other => LedgerError::Storage(other),
        })?;
        tracing::info!(user = %user, points = %points, balance = %balance, "account credited");
        Ok(balance)
    }

    /// Sum of every balance.
    pub fn total_points(&self) -> Result<Points, LedgerError> {
        Ok(self.store.total_points()?)
    }

    pub fn downloads_for_user(&self, user: UserId) -> Result<Vec<DownloadRecord>, LedgerError> {
        Ok(self.store.downloads_for_user(user)?)
    }
}
