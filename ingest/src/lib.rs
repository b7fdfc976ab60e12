//! Ingestion pipeline.
//!
//! An upload moves through `Staged → OriginalCopied → Verified → Embedded`
//! and is committed as an asset row only at the very end. Every exit path
//! leaves the content root in one of two states: all artifacts of a
//! committed asset, or nothing at all.

pub mod error;
pub mod layout;
pub mod pipeline;
pub mod rollback;
pub mod staging;

pub use error::{IngestError, IngestStage, PipelineFailure};
pub use layout::StorageLayout;
pub use pipeline::{Ingested, IngestPipeline, Upload};
pub use rollback::RollbackGuard;
pub use staging::{accepted_extension, StagedNamer, ACCEPTED_EXTENSIONS};
