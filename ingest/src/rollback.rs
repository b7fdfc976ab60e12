//! Compensating cleanup for a multi-stage ingestion run.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// When a registered removal runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scope {
    /// On every exit path, including success (scratch files).
    Always,
    /// Only if the run does not complete (permanent artifacts).
    OnFailure,
}

#[derive(Debug)]
enum RollbackAction {
    RemoveFile { path: PathBuf, scope: Scope },
}

/// Accumulates cleanup actions as pipeline stages complete.
///
/// Dropping the guard without [`complete`](Self::complete) runs every
/// action in reverse registration order. Files that are already gone are
/// ignored; other removal errors are logged.
#[derive(Debug, Default)]
pub struct RollbackGuard {
    actions: Vec<RollbackAction>,
}

impl RollbackGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove `path` however the run ends.
    pub fn remove_always(&mut self, path: impl Into<PathBuf>) {
        self.actions.push(RollbackAction::RemoveFile {
            path: path.into(),
            scope: Scope::Always,
        });
    }

    /// Remove `path` unless the run completes.
    pub fn remove_on_failure(&mut self, path: impl Into<PathBuf>) {
        self.actions.push(RollbackAction::RemoveFile {
            path: path.into(),
            scope: Scope::OnFailure,
        });
    }

    pub fn pending(&self) -> usize {
        self.actions.len()
    }

    /// The run succeeded: keep permanent artifacts, clear scratch files.
    pub fn complete(mut self) {
        self.actions
            .retain(|RollbackAction::RemoveFile { scope, .. }| *scope == Scope::Always);
        // Drop runs what remains.
    }

    fn run(&mut self) {
        let rolled_back = self
            .actions
            .iter()
            .any(|RollbackAction::RemoveFile { scope, .. }| *scope == Scope::OnFailure);
        while let Some(RollbackAction::RemoveFile { path, scope }) = self.actions.pop() {
            remove_file(&path);
            if scope == Scope::OnFailure {
                tracing::debug!(path = %path.display(), "rolled back artifact");
            }
        }
        if rolled_back {
            tracing::info!("ingestion rolled back");
        }
    }
}

impl Drop for RollbackGuard {
    fn drop(&mut self) {
        self.run();
    }
}

fn remove_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "failed to remove artifact during cleanup");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"x").unwrap();
        path
    }

    #[test]
    fn drop_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let tmp = touch(dir.path(), "tmp.png");
        let original = touch(dir.path(), "original.png");
        {
            let mut guard = RollbackGuard::new();
            guard.remove_always(&tmp);
            guard.remove_on_failure(&original);
            // Registered but never created.
            guard.remove_on_failure(dir.path().join("marked.png"));
            assert_eq!(guard.pending(), 3);
        }
        assert!(!tmp.exists());
        assert!(!original.exists());
    }

    #[test]
    fn complete_keeps_permanent_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let tmp = touch(dir.path(), "tmp.png");
        let original = touch(dir.path(), "original.png");
        let mut guard = RollbackGuard::new();
        guard.remove_always(&tmp);
        guard.remove_on_failure(&original);
        guard.complete();

        assert!(!tmp.exists());
        assert!(original.exists());
    }
}
