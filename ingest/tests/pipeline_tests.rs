//! Ingestion pipeline behaviour against in-memory storage and a scripted
//! detection backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use shield_detection::{DetectionBackend, ProtectionMark};
use shield_ingest::{IngestError, IngestPipeline, IngestStage, PipelineFailure, StorageLayout, Upload};
use shield_nullables::{CheckScript, EmbedMode, NullClock, NullDetector, NullStore};
use shield_store::{AssetStore, CandidateRegistry};
use shield_types::{Points, UserId};
use shield_verification::VerificationOrchestrator;

struct Harness {
    dir: tempfile::TempDir,
    store: Arc<NullStore>,
    detector: Arc<NullDetector>,
    orchestrator: Arc<VerificationOrchestrator<NullStore>>,
    pipeline: IngestPipeline<NullStore>,
}

const NOW_MILLIS: u64 = 1_700_000_000_000;

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mark_path = dir.path().join("logo.png");
        std::fs::write(&mark_path, b"canonical mark").unwrap();
        let public = dir.path().join("public");
        let layout = StorageLayout::new(&public);
        layout.ensure_dirs().unwrap();

        let store = Arc::new(NullStore::new());
        let detector = Arc::new(NullDetector::new());
        let orchestrator = Arc::new(VerificationOrchestrator::new(
            store.clone(),
            detector.clone() as Arc<dyn DetectionBackend>,
            ProtectionMark::load(&mark_path).unwrap(),
            &public,
        ));
        let pipeline = IngestPipeline::new(
            store.clone(),
            orchestrator.clone(),
            layout,
            Arc::new(NullClock::new(NOW_MILLIS)),
        );
        Self { dir, store, detector, orchestrator, pipeline }
    }

    /// A pipeline over the same store and content root whose name
    /// sequence starts over, as after a process restart.
    fn restarted(&self) -> IngestPipeline<NullStore> {
        IngestPipeline::new(
            self.store.clone(),
            self.orchestrator.clone(),
            StorageLayout::new(self.public()),
            Arc::new(NullClock::new(NOW_MILLIS)),
        )
    }

    fn public(&self) -> PathBuf {
        self.dir.path().join("public")
    }

    fn files_in(&self, rel: &str) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.public().join(rel))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn assert_no_residue(&self) {
        for rel in ["uploads/tmp", "uploads/original", "uploads/images", "uploads/meta"] {
            assert!(self.files_in(rel).is_empty(), "{rel} should be empty");
        }
    }
}

fn upload(file_name: &str) -> Upload {
    Upload {
        file_name: file_name.into(),
        bytes: b"\x89PNG fake pixels".to_vec(),
        caption: "harbour at dawn".into(),
        category: "city".into(),
        price: Points::new(50),
        owner: UserId::new(1),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

#[tokio::test]
async fn clear_upload_is_committed_with_all_artifacts() {
    let h = Harness::new();
    let ingested = h.pipeline.ingest(upload("harbour.PNG")).await.unwrap();
    let asset = ingested.asset;

    assert!(asset.mark_descriptor.is_some());
    assert_eq!(asset.price, Points::new(50));
    assert_eq!(asset.owner, UserId::new(1));
    assert!(asset.content.as_str().starts_with("uploads/images/image-1700000000000-"));
    assert!(asset.content.as_str().ends_with(".png"));

    let layout = h.pipeline.layout();
    assert_eq!(
        std::fs::read(layout.resolve(&asset.original)).unwrap(),
        b"\x89PNG fake pixels"
    );
    assert!(layout.resolve(&asset.content).exists());
    assert!(layout.resolve(asset.mark_descriptor.as_ref().unwrap()).exists());
    assert!(h.files_in("uploads/tmp").is_empty());

    assert_eq!(h.store.get_asset(asset.id).unwrap(), asset);
    assert_eq!(h.store.candidate_count().unwrap(), 1);
}

#[tokio::test]
async fn conflict_rejects_without_residue() {
    let h = Harness::new();
    let first = h.pipeline.ingest(upload("a.png")).await.unwrap().asset;
    let before = h.files_in("uploads/original");

    h.detector
        .script(first.original.file_name(), CheckScript::Detect(0.91));
    let err = h.pipeline.ingest(upload("copy.png")).await.unwrap_err();
    match err {
        IngestError::Conflict { evidence, inconclusive, .. } => {
            assert_eq!(evidence.asset_id, first.id);
            assert_eq!(evidence.asset_name, first.content.as_str());
            assert_eq!(evidence.score, 0.91);
            assert_eq!(inconclusive, 0);
        }
        other => panic!("expected conflict, got {other:?}"),
    }

    assert_eq!(h.files_in("uploads/original"), before);
    assert!(h.files_in("uploads/tmp").is_empty());
    assert_eq!(h.store.asset_count().unwrap(), 1);
    assert_eq!(h.detector.embed_calls(), 1);
}

#[tokio::test]
async fn embed_failure_rolls_back_original_and_temp() {
    let h = Harness::new();
    h.detector.set_embed_mode(EmbedMode::Reject);

    let err = h.pipeline.ingest(upload("a.jpg")).await.unwrap_err();
    assert!(matches!(
        err,
        IngestError::Pipeline {
            stage: IngestStage::Verified,
            source: PipelineFailure::Detection(_),
        }
    ));
    h.assert_no_residue();
    assert_eq!(h.store.asset_count().unwrap(), 0);
}

#[tokio::test]
async fn partial_embed_output_is_removed() {
    let h = Harness::new();
    h.detector.set_embed_mode(EmbedMode::PartialThenFail);

    assert!(h.pipeline.ingest(upload("a.png")).await.is_err());
    h.assert_no_residue();
}

#[tokio::test]
async fn embed_without_artifacts_is_a_failure() {
    let h = Harness::new();
    h.detector.set_embed_mode(EmbedMode::NoArtifacts);

    let err = h.pipeline.ingest(upload("a.png")).await.unwrap_err();
    assert!(matches!(
        err,
        IngestError::Pipeline {
            source: PipelineFailure::MissingArtifact(_),
            ..
        }
    ));
    h.assert_no_residue();
    assert_eq!(h.store.asset_count().unwrap(), 0);
}

#[tokio::test]
async fn commit_failure_removes_marked_artifacts() {
    let h = Harness::new();
    h.store.fail_asset_inserts(true);

    let err = h.pipeline.ingest(upload("a.png")).await.unwrap_err();
    assert!(matches!(
        err,
        IngestError::Pipeline {
            stage: IngestStage::Embedded,
            source: PipelineFailure::Store(_),
        }
    ));
    h.assert_no_residue();
}

#[tokio::test]
async fn rejected_file_types_touch_nothing() {
    let h = Harness::new();
    let err = h.pipeline.ingest(upload("notes.pdf")).await.unwrap_err();
    assert!(matches!(err, IngestError::InvalidUpload(_)));

    let mut empty = upload("a.png");
    empty.bytes.clear();
    let err = h.pipeline.ingest(empty).await.unwrap_err();
    assert!(matches!(err, IngestError::InvalidUpload(_)));

    h.assert_no_residue();
    assert_eq!(h.detector.embed_calls(), 0);
}

#[tokio::test]
async fn inconclusive_candidates_do_not_block_publication() {
    let h = Harness::new();
    let first = h.pipeline.ingest(upload("a.png")).await.unwrap().asset;
    h.detector.script(first.original.file_name(), CheckScript::Fail);

    let ingested = h.pipeline.ingest(upload("b.png")).await.unwrap();
    assert_eq!(ingested.report.inconclusive, 1);
    assert_eq!(h.store.asset_count().unwrap(), 2);
}

#[tokio::test]
async fn check_only_never_publishes() {
    let h = Harness::new();
    let first = h.pipeline.ingest(upload("a.png")).await.unwrap().asset;

    let report = h.pipeline.check("probe.jpeg", b"probe").await.unwrap();
    assert!(report.verdict.is_clear());
    assert_eq!(report.checked, 1);

    h.detector
        .script(first.original.file_name(), CheckScript::Detect(0.7));
    let err = h.pipeline.check("probe.jpeg", b"probe").await.unwrap_err();
    assert!(matches!(err, IngestError::Conflict { .. }));

    assert!(h.files_in("uploads/tmp").is_empty());
    assert_eq!(h.store.asset_count().unwrap(), 1);
}

#[tokio::test]
async fn verification_runs_on_the_staged_copy() {
    let h = Harness::new();
    h.pipeline.ingest(upload("a.png")).await.unwrap();
    h.pipeline.ingest(upload("b.png")).await.unwrap();

    // The second run checked exactly the first asset's original.
    let covers = h.detector.checked_covers();
    assert_eq!(covers.len(), 1);
    assert!(file_name(&covers[0]).starts_with("image-1700000000000-0"));
    assert!(covers[0].starts_with(h.public().join("uploads").join("original")));
}

#[tokio::test]
async fn restarted_sequence_never_reuses_a_committed_name() {
    let h = Harness::new();
    let first = h.pipeline.ingest(upload("a.png")).await.unwrap().asset;
    let original = h.public().join(first.original.as_str());
    let content = h.public().join(first.content.as_str());
    let descriptor = h
        .public()
        .join(first.mark_descriptor.as_ref().unwrap().as_str());
    let original_bytes = std::fs::read(&original).unwrap();

    let second = h.restarted();
    h.detector.set_embed_mode(EmbedMode::Reject);
    let err = second.ingest(upload("b.png")).await.unwrap_err();
    assert!(matches!(
        err,
        IngestError::Pipeline { stage: IngestStage::Verified, .. }
    ));
    for path in [&original, &content, &descriptor] {
        assert!(path.exists(), "{} was removed", path.display());
    }
    assert_eq!(std::fs::read(&original).unwrap(), original_bytes);
    assert_eq!(h.files_in("uploads/original").len(), 1);
    assert!(h.files_in("uploads/tmp").is_empty());

    h.detector.set_embed_mode(EmbedMode::WriteArtifacts);
    let next = second.ingest(upload("c.png")).await.unwrap().asset;
    assert_ne!(next.original, first.original);
    assert_ne!(next.content, first.content);
    assert!(original.exists() && content.exists() && descriptor.exists());
    assert_eq!(h.files_in("uploads/original").len(), 2);
}
