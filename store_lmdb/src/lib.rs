//! LMDB storage backend for the Photo Shield core.
//!
//! Implements all storage traits from `shield-store` using the `heed` LMDB
//! bindings. Each logical store maps to one or more LMDB databases within a
//! single environment, so multi-store updates share one write transaction.
//!
//! LMDB admits a single writer at a time, which makes every write
//! transaction serializable. The download charge relies on that plus a
//! no-overwrite insert on the `(downloader, asset)` key.

pub mod account;
pub mod asset;
pub mod download;
pub mod environment;
pub mod error;
pub mod integrity;
pub mod meta;
pub mod migration;
pub mod write_batch;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use integrity::{check_data_dir, check_integrity, IntegrityReport};
pub use write_batch::WriteBatch;
