//! LMDB environment setup.

use std::path::Path;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use shield_store::StoreError;

use crate::migration::Migrator;
use crate::write_batch::WriteBatch;
use crate::LmdbError;

/// Names of every database the environment creates.
pub(crate) const DATABASE_NAMES: &[&str] = &["assets", "candidates", "balances", "downloads", "meta"];

/// Wraps the LMDB environment and all database handles.
///
/// Key layout (all integers big-endian so byte order is numeric order):
/// - `assets`:     `asset_id` → bincode `Asset`
/// - `candidates`: `asset_id` → bincode `Candidate` (marked assets only)
/// - `balances`:   `user_id` → bincode `Points`
/// - `downloads`:  `user_id ++ asset_id` → bincode `DownloadRecord`
/// - `meta`:       string keys → raw bytes
pub struct LmdbEnvironment {
    env: Env,
    pub(crate) assets_db: Database<Bytes, Bytes>,
    pub(crate) candidates_db: Database<Bytes, Bytes>,
    pub(crate) balances_db: Database<Bytes, Bytes>,
    pub(crate) downloads_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path, then bring its
    /// schema up to date.
    pub fn open(path: &Path, max_dbs: u32, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment directory is owned by this process; no other
        // handle to the same path is opened with different flags.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(max_dbs.max(DATABASE_NAMES.len() as u32))
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let assets_db = env.create_database(&mut wtxn, Some("assets"))?;
        let candidates_db = env.create_database(&mut wtxn, Some("candidates"))?;
        let balances_db = env.create_database(&mut wtxn, Some("balances"))?;
        let downloads_db = env.create_database(&mut wtxn, Some("downloads"))?;
        let meta_db = env.create_database(&mut wtxn, Some("meta"))?;
        wtxn.commit()?;

        let environment = Self {
            env,
            assets_db,
            candidates_db,
            balances_db,
            downloads_db,
            meta_db,
        };
        Migrator::run(&environment)?;

        tracing::info!(path = %path.display(), map_size, "LMDB environment open");
        Ok(environment)
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    /// Begin a write batch. Dropping it without `commit` aborts every
    /// operation in it.
    pub fn write_batch(&self) -> Result<WriteBatch<'_>, StoreError> {
        WriteBatch::new(self)
    }
}
