//! Abstract storage traits for the Photo Shield core.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The orchestrator, pipeline, and ledger depend only on the traits.

pub mod account;
pub mod asset;
pub mod candidate;
pub mod download;
pub mod error;
pub mod meta;

pub use account::AccountStore;
pub use asset::AssetStore;
pub use candidate::CandidateRegistry;
pub use download::{Charge, DownloadStore};
pub use error::StoreError;
pub use meta::MetaStore;

/// Everything the core needs from one storage backend.
///
/// Blanket-implemented, so a backend only implements the individual traits.
pub trait ShieldStore:
    AssetStore + CandidateRegistry + AccountStore + DownloadStore + Send + Sync + 'static
{
}

impl<T> ShieldStore for T where
    T: AssetStore + CandidateRegistry + AccountStore + DownloadStore + Send + Sync + 'static
{
}
