//! Point-based download ledger.
//!
//! A download by anyone other than the owner charges the asset's price to
//! the downloader and credits it to the owner, exactly once per
//! (downloader, asset) pair. The charge and its record commit as one unit
//! in the storage layer; a concurrent duplicate is detected by the storage
//! layer's uniqueness check and reported as a repeat download.

pub mod error;
pub mod ledger;

pub use error::LedgerError;
pub use ledger::{DownloadGrant, DownloadLedger, DownloadOutcome};
