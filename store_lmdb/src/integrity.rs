//! LMDB database integrity checks.
//!
//! Run on startup to detect corruption early, before the service accepts
//! uploads or downloads.

use std::path::Path;

use heed::types::Bytes;
use shield_types::{Asset, Candidate};

use crate::environment::DATABASE_NAMES;
use crate::{LmdbEnvironment, LmdbError};

/// Summary of an integrity check run.
#[derive(Debug)]
pub struct IntegrityReport {
    pub databases_checked: u32,
    pub total_entries: u64,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    /// Returns `true` if no errors were detected.
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check LMDB database integrity.
///
/// Counts the entries of every database, then cross-checks the candidate
/// index against the asset table: every marked asset must have exactly one
/// candidate entry and every candidate must point at a marked asset. Read
/// failures are recorded in the report rather than causing a hard error.
pub fn check_integrity(env: &LmdbEnvironment) -> Result<IntegrityReport, LmdbError> {
    let mut report = IntegrityReport {
        databases_checked: 0,
        total_entries: 0,
        errors: Vec::new(),
    };

    let rtxn = env.env().read_txn()?;

    for &db_name in DATABASE_NAMES {
        match env.env().open_database::<Bytes, Bytes>(&rtxn, Some(db_name)) {
            Ok(Some(db)) => {
                report.databases_checked += 1;
                match db.len(&rtxn) {
                    Ok(count) => report.total_entries += count,
                    Err(e) => report
                        .errors
                        .push(format!("failed to read database '{}': {}", db_name, e)),
                }
            }
            Ok(None) => report
                .errors
                .push(format!("database '{}' is missing", db_name)),
            Err(e) => report
                .errors
                .push(format!("failed to open database '{}': {}", db_name, e)),
        }
    }

    let mut marked = 0u64;
    for result in env.assets_db.iter(&rtxn)? {
        let (key, val) = result?;
        let asset: Asset = match bincode::deserialize(val) {
            Ok(asset) => asset,
            Err(e) => {
                report.errors.push(format!("undecodable asset row: {e}"));
                continue;
            }
        };
        if asset.id.to_be_bytes().as_slice() != key {
            report
                .errors
                .push(format!("asset {} stored under a foreign key", asset.id));
        }
        if asset.mark_descriptor.is_some() {
            marked += 1;
            if env.candidates_db.get(&rtxn, key)?.is_none() {
                report
                    .errors
                    .push(format!("marked asset {} has no candidate entry", asset.id));
            }
        }
    }

    for result in env.candidates_db.iter(&rtxn)? {
        let (key, val) = result?;
        let candidate: Candidate = match bincode::deserialize(val) {
            Ok(candidate) => candidate,
            Err(e) => {
                report.errors.push(format!("undecodable candidate row: {e}"));
                continue;
            }
        };
        let backed = env
            .assets_db
            .get(&rtxn, key)?
            .and_then(|bytes| bincode::deserialize::<Asset>(bytes).ok())
            .is_some_and(|asset| asset.mark_descriptor.is_some());
        if !backed {
            report.errors.push(format!(
                "candidate {} has no marked asset behind it",
                candidate.id
            ));
        }
    }

    let candidates = env.candidates_db.len(&rtxn)?;
    if candidates != marked {
        report.errors.push(format!(
            "candidate index holds {candidates} entries for {marked} marked assets"
        ));
    }

    Ok(report)
}

/// Check if the LMDB data directory looks valid before opening.
///
/// Returns `Ok(())` for a fresh (nonexistent) directory. Returns an error
/// if the directory exists but `data.mdb` is missing, which suggests
/// corruption or misconfiguration.
pub fn check_data_dir(path: &Path) -> Result<(), String> {
    if !path.exists() {
        return Ok(());
    }
    let data_file = path.join("data.mdb");
    if !data_file.exists() {
        return Err(format!(
            "LMDB directory exists but data.mdb is missing at {}",
            path.display()
        ));
    }
    Ok(())
}
