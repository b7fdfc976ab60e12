//! Upload filtering and staged file naming.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use shield_types::Clock;

use crate::IngestError;

/// Extensions an upload's original file name may carry.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Return the lower-cased extension (with its dot) of an acceptable upload
/// file name.
pub fn accepted_extension(file_name: &str) -> Result<String, IngestError> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| IngestError::InvalidUpload(format!("{file_name:?} has no extension")))?;
    if ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(format!(".{ext}"))
    } else {
        Err(IngestError::InvalidUpload(format!(
            "only JPG, JPEG and PNG are accepted, got .{ext}"
        )))
    }
}

/// Generates `image-<unix-millis>-<sequence><ext>` names.
///
/// The sequence is shared by every upload in the process, so two uploads in
/// the same millisecond still get distinct names.
pub struct StagedNamer {
    clock: Arc<dyn Clock>,
    sequence: AtomicU64,
}

impl StagedNamer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn next_name(&self, ext: &str) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("image-{}-{seq}{ext}", self.clock.now().as_millis())
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}
