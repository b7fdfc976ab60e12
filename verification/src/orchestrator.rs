//! Verification orchestrator: connects the candidate registry and the
//! detection backend into a single first-match scan.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use shield_detection::{CheckRequest, DetectionBackend, ProtectionMark};
use shield_store::CandidateRegistry;

use crate::error::VerificationError;
use crate::scan::CandidateScan;
use crate::verdict::{ConflictEvidence, ScanReport, Verdict};

/// Candidates fetched per registry read.
pub const DEFAULT_SCAN_PAGE_SIZE: usize = 64;

pub struct VerificationOrchestrator<R: ?Sized> {
    registry: Arc<R>,
    backend: Arc<dyn DetectionBackend>,
    mark: ProtectionMark,
    /// Root that candidate content refs are resolved against.
    content_root: PathBuf,
    page_size: usize,
}

impl<R: CandidateRegistry + Send + Sync + ?Sized + 'static> VerificationOrchestrator<R> {
    pub fn new(
        registry: Arc<R>,
        backend: Arc<dyn DetectionBackend>,
        mark: ProtectionMark,
        content_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry,
            backend,
            mark,
            content_root: content_root.into(),
            page_size: DEFAULT_SCAN_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn mark(&self) -> &ProtectionMark {
        &self.mark
    }

    pub fn backend(&self) -> &Arc<dyn DetectionBackend> {
        &self.backend
    }

    /// Check `probe` against every marked asset, stopping at the first one
    /// the backend detects.
    ///
    /// Backend failures are logged and counted, never returned. Registry
    /// failures abort the scan.
    pub async fn verify(&self, probe: &Path) -> Result<ScanReport, VerificationError> {
        tokio::fs::metadata(probe).await.map_err(|source| VerificationError::ProbeUnreadable {
            path: probe.display().to_string(),
            source,
        })?;

        let started = Instant::now();
        let mut checked = 0u32;
        let mut inconclusive = 0u32;
        let mut verdict = Verdict::Clear;

        let mut scan = CandidateScan::new(Arc::clone(&self.registry), self.page_size);
        while let Some(candidate) = scan.next_candidate().await {
            let candidate = candidate?;
            let cover = candidate.original.resolve(&self.content_root);
            let descriptor = candidate.mark_descriptor.resolve(&self.content_root);
            checked += 1;

            let result = self
                .backend
                .check(CheckRequest {
                    probe,
                    cover: &cover,
                    descriptor: &descriptor,
                    mark: &self.mark,
                })
                .await;

            match result {
                Ok(report) if report.detected => {
                    tracing::info!(
                        candidate = %candidate.id,
                        score = report.score,
                        "probe carries the mark of a published asset"
                    );
                    verdict = Verdict::Conflict(ConflictEvidence {
                        asset_id: candidate.id,
                        asset_name: candidate.content.as_str().to_string(),
                        score: report.score,
                    });
                    break;
                }
                Ok(report) => {
                    tracing::trace!(candidate = %candidate.id, score = report.score, "no match");
                }
                Err(e) => {
                    inconclusive += 1;
                    tracing::warn!(
                        candidate = %candidate.id,
                        backend = self.backend.name(),
                        error = %e,
                        "candidate check inconclusive, continuing scan"
                    );
                }
            }
        }

        let elapsed = started.elapsed();
        tracing::debug!(
            checked,
            inconclusive,
            elapsed_ms = elapsed.as_millis() as u64,
            clear = verdict.is_clear(),
            "verification scan finished"
        );
        Ok(ScanReport {
            verdict,
            checked,
            inconclusive,
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shield_nullables::{CheckScript, NullDetector, NullStore};
    use shield_store::AssetStore;
    use shield_types::{AssetId, ContentRef, NewAsset, Points, Timestamp, UserId};

    struct Fixture {
        _dir: tempfile::TempDir,
        store: Arc<NullStore>,
        detector: Arc<NullDetector>,
        probe: PathBuf,
        orchestrator: VerificationOrchestrator<NullStore>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mark_path = dir.path().join("logo.png");
        std::fs::write(&mark_path, b"mark").unwrap();
        let probe = dir.path().join("probe.png");
        std::fs::write(&probe, b"probe").unwrap();

        let store = Arc::new(NullStore::new());
        let detector = Arc::new(NullDetector::new());
        let orchestrator = VerificationOrchestrator::new(
            store.clone(),
            detector.clone() as Arc<dyn DetectionBackend>,
            ProtectionMark::load(&mark_path).unwrap(),
            dir.path(),
        )
        .with_page_size(2);
        Fixture { _dir: dir, store, detector, probe, orchestrator }
    }

    fn publish(store: &NullStore, name: &str, marked: bool) -> AssetId {
        store
            .insert_asset(NewAsset {
                content: ContentRef::join("uploads/images", name).unwrap(),
                original: ContentRef::join("uploads/original", name).unwrap(),
                mark_descriptor: marked
                    .then(|| ContentRef::join("uploads/meta", &format!("meta-{name}.pkl")).unwrap()),
                caption: String::new(),
                category: "nature".into(),
                price: Points::new(10),
                owner: UserId::new(1),
                created_at: Timestamp::EPOCH,
            })
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn single_marked_candidate_detected() {
        let f = fixture();
        let c1 = publish(&f.store, "c1.png", true);
        f.detector.script("c1.png", CheckScript::Detect(0.9));

        let report = f.orchestrator.verify(&f.probe).await.unwrap();
        assert_eq!(
            report.verdict,
            Verdict::Conflict(ConflictEvidence {
                asset_id: c1,
                asset_name: "uploads/images/c1.png".into(),
                score: 0.9,
            })
        );
        assert_eq!(report.checked, 1);
    }

    #[tokio::test]
    async fn first_match_wins_over_better_later_match() {
        let f = fixture();
        let c1 = publish(&f.store, "c1.png", true);
        publish(&f.store, "c2.png", true);
        f.detector.script("c1.png", CheckScript::Detect(0.9));
        f.detector.script("c2.png", CheckScript::Detect(0.95));

        let report = f.orchestrator.verify(&f.probe).await.unwrap();
        match report.verdict {
            Verdict::Conflict(evidence) => {
                assert_eq!(evidence.asset_id, c1);
                assert_eq!(evidence.score, 0.9);
            }
            Verdict::Clear => panic!("expected a conflict"),
        }
        // c2 was never checked.
        assert_eq!(f.detector.checked_names(), vec!["c1.png"]);
    }

    #[tokio::test]
    async fn unmarked_assets_are_never_checked() {
        let f = fixture();
        publish(&f.store, "plain.png", false);
        publish(&f.store, "marked.png", true);
        publish(&f.store, "plain2.png", false);

        let report = f.orchestrator.verify(&f.probe).await.unwrap();
        assert!(report.verdict.is_clear());
        assert_eq!(f.detector.checked_names(), vec!["marked.png"]);
    }

    #[tokio::test]
    async fn backend_failure_is_skipped_not_raised() {
        let f = fixture();
        publish(&f.store, "a.png", true);
        let b = publish(&f.store, "b.png", true);
        publish(&f.store, "c.png", true);
        f.detector.script("a.png", CheckScript::Fail);
        f.detector.script("b.png", CheckScript::Detect(0.8));

        let report = f.orchestrator.verify(&f.probe).await.unwrap();
        assert_eq!(report.inconclusive, 1);
        assert_eq!(report.checked, 2);
        assert!(matches!(report.verdict, Verdict::Conflict(ref e) if e.asset_id == b));
    }

    #[tokio::test]
    async fn all_failures_still_clear() {
        let f = fixture();
        for name in ["a.png", "b.png", "c.png"] {
            publish(&f.store, name, true);
            f.detector.script(name, CheckScript::Fail);
        }
        let report = f.orchestrator.verify(&f.probe).await.unwrap();
        assert!(report.verdict.is_clear());
        assert_eq!(report.inconclusive, 3);
    }

    #[tokio::test]
    async fn empty_corpus_is_clear() {
        let f = fixture();
        let report = f.orchestrator.verify(&f.probe).await.unwrap();
        assert!(report.verdict.is_clear());
        assert_eq!(report.checked, 0);
    }

    #[tokio::test]
    async fn missing_probe_is_an_error() {
        let f = fixture();
        publish(&f.store, "a.png", true);
        let err = f
            .orchestrator
            .verify(Path::new("/nonexistent/probe.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, VerificationError::ProbeUnreadable { .. }));
        assert!(f.detector.checked_names().is_empty());
    }

    #[tokio::test]
    async fn covers_resolve_to_original_content() {
        let f = fixture();
        publish(&f.store, "a.png", true);
        f.orchestrator.verify(&f.probe).await.unwrap();
        let covers = f.detector.checked_covers();
        assert!(covers[0].ends_with("uploads/original/a.png"));
    }
}
