//! Where ingestion artifacts live under the public content root.

use std::path::{Path, PathBuf};

use shield_types::{ContentRef, TypeError};

pub const STAGING_DIR: &str = "uploads/tmp";
pub const ORIGINAL_DIR: &str = "uploads/original";
pub const MARKED_DIR: &str = "uploads/images";
pub const DESCRIPTOR_DIR: &str = "uploads/meta";

/// Directory layout of the public content root.
///
/// ```text
/// <root>/uploads/tmp/<name>               staged upload
/// <root>/uploads/original/<name>          byte-identical original
/// <root>/uploads/images/<name>            marked content
/// <root>/uploads/meta/meta-<stem>.pkl     mark-descriptor
/// ```
#[derive(Clone, Debug)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the layout under `root` and return it anchored at the
    /// canonical absolute root, so paths handed to other processes do not
    /// depend on the working directory.
    pub fn create(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let layout = Self::new(root.as_ref());
        layout.ensure_dirs()?;
        Ok(Self::new(std::fs::canonicalize(root)?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create every directory of the layout.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [STAGING_DIR, ORIGINAL_DIR, MARKED_DIR, DESCRIPTOR_DIR] {
            std::fs::create_dir_all(self.dir(dir))?;
        }
        Ok(())
    }

    fn dir(&self, rel: &str) -> PathBuf {
        rel.split('/').fold(self.root.clone(), |acc, seg| acc.join(seg))
    }

    pub fn staging_path(&self, name: &str) -> PathBuf {
        self.dir(STAGING_DIR).join(name)
    }

    pub fn original_ref(&self, name: &str) -> Result<ContentRef, TypeError> {
        ContentRef::join(ORIGINAL_DIR, name)
    }

    pub fn marked_ref(&self, name: &str) -> Result<ContentRef, TypeError> {
        ContentRef::join(MARKED_DIR, name)
    }

    pub fn descriptor_ref(&self, name: &str) -> Result<ContentRef, TypeError> {
        ContentRef::join(DESCRIPTOR_DIR, &descriptor_name(name))
    }

    pub fn resolve(&self, content: &ContentRef) -> PathBuf {
        content.resolve(&self.root)
    }
}

/// `image-1-2.png` → `meta-image-1-2.pkl`.
pub fn descriptor_name(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    format!("meta-{stem}.pkl")
}
