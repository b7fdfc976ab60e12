use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use shield_detection::DetectionError;
use shield_store::StoreError;
use shield_verification::{ConflictEvidence, VerificationError};
use thiserror::Error;

/// Last stage an ingestion run completed before it stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngestStage {
    /// Upload accepted, nothing written yet.
    Received,
    Staged,
    OriginalCopied,
    Verified,
    Embedded,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IngestStage::Received => "received",
            IngestStage::Staged => "staged",
            IngestStage::OriginalCopied => "original_copied",
            IngestStage::Verified => "verified",
            IngestStage::Embedded => "embedded",
        };
        f.write_str(name)
    }
}

/// Unexpected failure inside the pipeline. Always reported after rollback.
#[derive(Debug, Error)]
pub enum PipelineFailure {
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error(transparent)]
    Detection(#[from] DetectionError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("embed reported success but {} is missing", .0.display())]
    MissingArtifact(PathBuf),

    #[error("invalid content pointer: {0}")]
    InvalidPointer(String),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid upload: {0}")]
    InvalidUpload(String),

    #[error(
        "upload carries the mark of asset {} ({}, score {:.3})",
        evidence.asset_id,
        evidence.asset_name,
        evidence.score
    )]
    Conflict {
        evidence: ConflictEvidence,
        /// Candidates skipped because the backend failed on them.
        inconclusive: u32,
        /// How long the scan ran before the match.
        elapsed: Duration,
    },

    #[error("ingestion failed after stage {stage}: {source}")]
    Pipeline {
        stage: IngestStage,
        #[source]
        source: PipelineFailure,
    },
}

impl IngestError {
    pub(crate) fn pipeline(stage: IngestStage, source: impl Into<PipelineFailure>) -> Self {
        IngestError::Pipeline {
            stage,
            source: source.into(),
        }
    }
}
