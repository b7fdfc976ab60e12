//! Metadata storage trait.

use crate::StoreError;

/// Database bookkeeping that doesn't belong in any domain-specific store.
pub trait MetaStore {
    /// Get the current database schema version (0 for a fresh database).
    fn get_schema_version(&self) -> Result<u32, StoreError>;

    fn set_schema_version(&self, version: u32) -> Result<(), StoreError>;
}
