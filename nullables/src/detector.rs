//! Nullable detection backend: scripted verdicts, no network.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use shield_detection::{
    CheckReport, CheckRequest, DetectionBackend, DetectionError, EmbedRequest, MarkedArtifacts,
};

/// Scripted answer to a `check` call for one cover.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CheckScript {
    Detect(f64),
    Miss(f64),
    /// Fail the call as if the backend were unreachable.
    Fail,
}

/// How `embed` behaves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EmbedMode {
    /// Copy the cover to the marked output and write a descriptor.
    #[default]
    WriteArtifacts,
    /// Report `success=false`.
    Reject,
    /// Write the marked image, then fail the call.
    PartialThenFail,
    /// Report success without writing anything.
    NoArtifacts,
}

/// A deterministic [`DetectionBackend`] for testing.
///
/// `check` verdicts are scripted per cover file name; unscripted covers
/// are a miss with score 0.0. Every call is recorded.
#[derive(Default)]
pub struct NullDetector {
    scripts: Mutex<HashMap<String, CheckScript>>,
    embed_mode: Mutex<EmbedMode>,
    checked_covers: Mutex<Vec<PathBuf>>,
    embed_calls: Mutex<u32>,
    embed_outputs: Mutex<Vec<PathBuf>>,
}

impl NullDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the verdict for any cover whose file name is `cover_name`.
    pub fn script(&self, cover_name: &str, script: CheckScript) {
        self.scripts
            .lock()
            .unwrap()
            .insert(cover_name.to_string(), script);
    }

    pub fn set_embed_mode(&self, mode: EmbedMode) {
        *self.embed_mode.lock().unwrap() = mode;
    }

    /// Covers passed to `check`, in call order.
    pub fn checked_covers(&self) -> Vec<PathBuf> {
        self.checked_covers.lock().unwrap().clone()
    }

    /// File names of the covers passed to `check`, in call order.
    pub fn checked_names(&self) -> Vec<String> {
        self.checked_covers()
            .iter()
            .map(|p| file_name(p))
            .collect()
    }

    pub fn embed_calls(&self) -> u32 {
        *self.embed_calls.lock().unwrap()
    }

    /// Marked and descriptor output paths of every `embed` call, in order.
    pub fn embed_outputs(&self) -> Vec<PathBuf> {
        self.embed_outputs.lock().unwrap().clone()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[async_trait]
impl DetectionBackend for NullDetector {
    async fn embed(&self, request: EmbedRequest<'_>) -> Result<MarkedArtifacts, DetectionError> {
        *self.embed_calls.lock().unwrap() += 1;
        self.embed_outputs.lock().unwrap().extend([
            request.marked_output.to_path_buf(),
            request.descriptor_output.to_path_buf(),
        ]);
        let mode = *self.embed_mode.lock().unwrap();
        match mode {
            EmbedMode::WriteArtifacts => {
                std::fs::copy(request.cover, request.marked_output)?;
                std::fs::write(request.descriptor_output, b"descriptor")?;
            }
            EmbedMode::Reject => {
                return Err(DetectionError::EmbedRejected("scripted rejection".into()));
            }
            EmbedMode::PartialThenFail => {
                std::fs::copy(request.cover, request.marked_output)?;
                return Err(DetectionError::Unreachable("scripted failure".into()));
            }
            EmbedMode::NoArtifacts => {}
        }
        Ok(MarkedArtifacts {
            content: request.marked_output.to_path_buf(),
            descriptor: request.descriptor_output.to_path_buf(),
        })
    }

    async fn check(&self, request: CheckRequest<'_>) -> Result<CheckReport, DetectionError> {
        self.checked_covers
            .lock()
            .unwrap()
            .push(request.cover.to_path_buf());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&file_name(request.cover))
            .copied()
            .unwrap_or(CheckScript::Miss(0.0));
        match script {
            CheckScript::Detect(score) => Ok(CheckReport::new(true, score)
                .ok_or_else(|| DetectionError::InvalidResponse("NaN score".into()))?),
            CheckScript::Miss(score) => Ok(CheckReport::new(false, score)
                .ok_or_else(|| DetectionError::InvalidResponse("NaN score".into()))?),
            CheckScript::Fail => Err(DetectionError::Unreachable("scripted failure".into())),
        }
    }

    fn name(&self) -> &str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shield_detection::ProtectionMark;

    #[tokio::test]
    async fn scripted_verdicts_are_returned_and_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let mark_path = dir.path().join("logo.png");
        std::fs::write(&mark_path, b"mark").unwrap();
        let mark = ProtectionMark::load(&mark_path).unwrap();
        let probe = dir.path().join("probe.png");
        let hit = dir.path().join("hit.png");
        let miss = dir.path().join("other.png");

        let detector = NullDetector::new();
        detector.script("hit.png", CheckScript::Detect(0.9));

        let report = detector
            .check(CheckRequest { probe: &probe, cover: &hit, descriptor: &hit, mark: &mark })
            .await
            .unwrap();
        assert!(report.detected);
        assert_eq!(report.score, 0.9);

        let report = detector
            .check(CheckRequest { probe: &probe, cover: &miss, descriptor: &miss, mark: &mark })
            .await
            .unwrap();
        assert!(!report.detected);
        assert_eq!(detector.checked_names(), vec!["hit.png", "other.png"]);
    }

    #[tokio::test]
    async fn embed_writes_both_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let cover = dir.path().join("cover.png");
        std::fs::write(&cover, b"pixels").unwrap();
        let mark = ProtectionMark::load(&cover).unwrap();
        let marked = dir.path().join("marked.png");
        let meta = dir.path().join("meta.pkl");

        let detector = NullDetector::new();
        let artifacts = detector
            .embed(EmbedRequest {
                cover: &cover,
                mark: &mark,
                marked_output: &marked,
                descriptor_output: &meta,
            })
            .await
            .unwrap();
        assert!(artifacts.content.exists());
        assert!(artifacts.descriptor.exists());
        assert_eq!(detector.embed_calls(), 1);
        assert_eq!(detector.embed_outputs(), vec![marked, meta]);
    }
}
