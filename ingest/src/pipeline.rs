//! The ingestion pipeline.

use std::io::{self, ErrorKind};
use std::path::Path;
use std::sync::Arc;

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use shield_detection::{DetectionBackend, EmbedRequest};
use shield_store::ShieldStore;
use shield_types::{Asset, Clock, NewAsset, Points, UserId};
use shield_verification::{ScanReport, Verdict, VerificationOrchestrator};

use crate::error::{IngestError, IngestStage, PipelineFailure};
use crate::layout::StorageLayout;
use crate::rollback::RollbackGuard;
use crate::staging::{accepted_extension, StagedNamer};

/// An upload as received from the caller.
#[derive(Clone, Debug)]
pub struct Upload {
    /// Client-side file name; only its extension is used.
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub caption: String,
    pub category: String,
    pub price: Points,
    pub owner: UserId,
}

/// A committed asset and the scan that cleared it.
#[derive(Clone, Debug)]
pub struct Ingested {
    pub asset: Asset,
    pub report: ScanReport,
}

/// Fresh names tried before staging gives up.
const NAME_ATTEMPTS: usize = 64;

pub struct IngestPipeline<S> {
    store: Arc<S>,
    orchestrator: Arc<VerificationOrchestrator<S>>,
    layout: StorageLayout,
    namer: StagedNamer,
}

impl<S: ShieldStore> IngestPipeline<S> {
    pub fn new(
        store: Arc<S>,
        orchestrator: Arc<VerificationOrchestrator<S>>,
        layout: StorageLayout,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            orchestrator,
            layout,
            namer: StagedNamer::new(clock),
        }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    fn backend(&self) -> &Arc<dyn DetectionBackend> {
        self.orchestrator.backend()
    }

    /// Stage `bytes` under a fresh name and register the staged file for
    /// removal on every exit path.
    ///
    /// A name is only taken if no staged file or published artifact uses
    /// it yet; the staged file is created exclusively, so concurrent runs
    /// never share one.
    async fn stage(
        &self,
        file_name: &str,
        bytes: &[u8],
        guard: &mut RollbackGuard,
    ) -> Result<String, IngestError> {
        let ext = accepted_extension(file_name)?;
        if bytes.is_empty() {
            return Err(IngestError::InvalidUpload("upload is empty".into()));
        }
        let fail = |e: PipelineFailure| IngestError::pipeline(IngestStage::Received, e);

        for _ in 0..NAME_ATTEMPTS {
            let name = self.namer.next_name(&ext);
            if self.published(&name).await.map_err(fail)? {
                tracing::debug!(name = %name, "name already published, skipping");
                continue;
            }
            let staged = self.layout.staging_path(&name);
            let mut file = match create_new(&staged).await {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(fail(PipelineFailure::Io(e))),
            };
            guard.remove_always(&staged);
            write_all(&mut file, bytes)
                .await
                .map_err(|e| fail(e.into()))?;
            return Ok(name);
        }
        Err(fail(PipelineFailure::Io(io::Error::new(
            ErrorKind::AlreadyExists,
            format!("no free upload name after {NAME_ATTEMPTS} attempts"),
        ))))
    }

    /// Whether any permanent artifact already exists for `name`.
    async fn published(&self, name: &str) -> Result<bool, PipelineFailure> {
        let refs = [
            self.layout.original_ref(name),
            self.layout.marked_ref(name),
            self.layout.descriptor_ref(name),
        ];
        for content in refs {
            let content = content.map_err(|e| PipelineFailure::InvalidPointer(e.to_string()))?;
            if exists(&self.layout.resolve(&content)).await {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Run the full pipeline on one upload.
    ///
    /// On conflict or failure every artifact written so far is removed
    /// before the error is returned, and no asset row exists.
    pub async fn ingest(&self, upload: Upload) -> Result<Ingested, IngestError> {
        let mut guard = RollbackGuard::new();
        let name = self.stage(&upload.file_name, &upload.bytes, &mut guard).await?;
        let staged = self.layout.staging_path(&name);
        let mut stage = IngestStage::Staged;
        tracing::debug!(name = %name, owner = %upload.owner, "upload staged");

        // Original copy, before anything can alter the pixels.
        let original_ref = self
            .layout
            .original_ref(&name)
            .map_err(|e| IngestError::pipeline(stage, PipelineFailure::InvalidPointer(e.to_string())))?;
        let original = self.layout.resolve(&original_ref);
        // Never overwrite: an existing original belongs to another asset
        // and must not be registered for removal.
        {
            let mut file = create_new(&original)
                .await
                .map_err(|e| IngestError::pipeline(stage, e))?;
            guard.remove_on_failure(&original);
            write_all(&mut file, &upload.bytes)
                .await
                .map_err(|e| IngestError::pipeline(stage, e))?;
        }
        stage = IngestStage::OriginalCopied;

        let report = self
            .orchestrator
            .verify(&staged)
            .await
            .map_err(|e| IngestError::pipeline(stage, e))?;
        if let Verdict::Conflict(evidence) = &report.verdict {
            tracing::info!(
                name = %name,
                matched = %evidence.asset_id,
                score = evidence.score,
                "upload rejected"
            );
            return Err(IngestError::Conflict {
                evidence: evidence.clone(),
                inconclusive: report.inconclusive,
                elapsed: report.elapsed,
            });
        }
        stage = IngestStage::Verified;

        let marked_ref = self
            .layout
            .marked_ref(&name)
            .map_err(|e| IngestError::pipeline(stage, PipelineFailure::InvalidPointer(e.to_string())))?;
        let descriptor_ref = self
            .layout
            .descriptor_ref(&name)
            .map_err(|e| IngestError::pipeline(stage, PipelineFailure::InvalidPointer(e.to_string())))?;
        let marked = self.layout.resolve(&marked_ref);
        let descriptor = self.layout.resolve(&descriptor_ref);
        for path in [&marked, &descriptor] {
            if exists(path).await {
                return Err(IngestError::pipeline(
                    stage,
                    io::Error::new(
                        ErrorKind::AlreadyExists,
                        format!("{} already exists", path.display()),
                    ),
                ));
            }
        }
        // The backend may write either file before failing.
        guard.remove_on_failure(&marked);
        guard.remove_on_failure(&descriptor);
        let artifacts = self
            .backend()
            .embed(EmbedRequest {
                cover: &staged,
                mark: self.orchestrator.mark(),
                marked_output: &marked,
                descriptor_output: &descriptor,
            })
            .await
            .map_err(|e| IngestError::pipeline(stage, e))?;
        for path in [&artifacts.content, &artifacts.descriptor] {
            if !exists(path).await {
                return Err(IngestError::pipeline(
                    stage,
                    PipelineFailure::MissingArtifact(path.clone()),
                ));
            }
        }
        stage = IngestStage::Embedded;

        let row = NewAsset {
            content: marked_ref,
            original: original_ref,
            mark_descriptor: Some(descriptor_ref),
            caption: upload.caption,
            category: upload.category,
            price: upload.price,
            owner: upload.owner,
            created_at: self.namer.clock().now(),
        };
        let store = Arc::clone(&self.store);
        let asset = tokio::task::spawn_blocking(move || store.insert_asset(row))
            .await
            .map_err(|e| {
                IngestError::pipeline(stage, io::Error::other(format!("insert task failed: {e}")))
            })?
            .map_err(|e| IngestError::pipeline(stage, e))?;

        guard.complete();
        tracing::info!(
            asset = %asset.id,
            owner = %asset.owner,
            price = %asset.price,
            checked = report.checked,
            inconclusive = report.inconclusive,
            "asset committed"
        );
        Ok(Ingested { asset, report })
    }

    /// Verify content without publishing it. The staged copy is always
    /// removed.
    pub async fn check(&self, file_name: &str, bytes: &[u8]) -> Result<ScanReport, IngestError> {
        let mut guard = RollbackGuard::new();
        let name = self.stage(file_name, bytes, &mut guard).await?;
        let staged = self.layout.staging_path(&name);

        let report = self
            .orchestrator
            .verify(&staged)
            .await
            .map_err(|e| IngestError::pipeline(IngestStage::Staged, e))?;
        match report.verdict {
            Verdict::Conflict(evidence) => Err(IngestError::Conflict {
                evidence,
                inconclusive: report.inconclusive,
                elapsed: report.elapsed,
            }),
            Verdict::Clear => Ok(report),
        }
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok()
}

/// Create `path`, failing with `AlreadyExists` if anything is there.
async fn create_new(path: &Path) -> io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path).await
}

async fn write_all(file: &mut File, bytes: &[u8]) -> io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await
}
