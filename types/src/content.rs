//! Pointers to stored content.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::TypeError;

/// A relative, forward-slash path under the public content root,
/// e.g. `uploads/images/image-1700000000000-1.png`.
///
/// Never absolute and never contains `..`, so resolving it against the
/// content root cannot escape that root.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentRef(String);

impl ContentRef {
    pub fn new(path: impl Into<String>) -> Result<Self, TypeError> {
        let path = path.into();
        let valid = !path.is_empty()
            && !path.starts_with('/')
            && !path.contains('\\')
            && path.split('/').all(|seg| !seg.is_empty() && seg != "." && seg != "..");
        if valid {
            Ok(Self(path))
        } else {
            Err(TypeError::InvalidContentRef(path))
        }
    }

    /// Join a directory ref (`uploads/images`) and a file name.
    pub fn join(dir: &str, file_name: &str) -> Result<Self, TypeError> {
        Self::new(format!("{}/{}", dir.trim_end_matches('/'), file_name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Absolute location of this content under `root`.
    pub fn resolve(&self, root: &Path) -> PathBuf {
        self.0.split('/').fold(root.to_path_buf(), |acc, seg| acc.join(seg))
    }
}

impl TryFrom<String> for ContentRef {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ContentRef> for String {
    fn from(value: ContentRef) -> Self {
        value.0
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
