//! The canonical protection mark.

use std::path::{Path, PathBuf};

use crate::DetectionError;

/// The fixed, process-wide reference image embedded into every published
/// asset. Never user-supplied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtectionMark {
    path: PathBuf,
}

impl ProtectionMark {
    /// Load the mark location, checking that it is a readable, non-empty file.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, DetectionError> {
        let path = path.into();
        let meta = std::fs::metadata(&path).map_err(|e| {
            DetectionError::MarkUnavailable(format!("{}: {e}", path.display()))
        })?;
        if !meta.is_file() || meta.len() == 0 {
            return Err(DetectionError::MarkUnavailable(format!(
                "{} is not a non-empty file",
                path.display()
            )));
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
