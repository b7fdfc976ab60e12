//! Asset storage trait.

use crate::StoreError;
use shield_types::{Asset, AssetId, NewAsset};

/// Trait for asset metadata storage.
pub trait AssetStore {
    /// Allocate the next asset id and persist the row in one atomic unit.
    ///
    /// Backends that keep a candidate index must write it in the same unit,
    /// so a marked asset is never visible without its candidate entry.
    fn insert_asset(&self, asset: NewAsset) -> Result<Asset, StoreError>;

    fn get_asset(&self, id: AssetId) -> Result<Asset, StoreError>;

    fn asset_exists(&self, id: AssetId) -> Result<bool, StoreError> {
        match self.get_asset(id) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn asset_count(&self) -> Result<u64, StoreError>;
}
