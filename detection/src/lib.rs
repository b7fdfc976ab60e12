//! Detection backend: the external oracle that embeds protection marks into
//! images and tests probes for their presence.
//!
//! The backend is consumed as an injected capability ([`DetectionBackend`]),
//! so the orchestrator and pipeline never depend on a live network service.
//! [`HttpDetectionBackend`] talks to the detection server over HTTP; tests
//! use a scripted fake from `shield-nullables`.
//!
//! Contract:
//! - `embed(cover, mark)` writes a marked image and a mark-descriptor to the
//!   requested locations, or fails.
//! - `check(probe, cover, descriptor, mark)` reports `{detected, score}`
//!   with `score` in `[0.0, 1.0]`.

pub mod client;
pub mod error;
pub mod mark;
pub mod types;

pub use client::HttpDetectionBackend;
pub use error::DetectionError;
pub use mark::ProtectionMark;
pub use types::{CheckReport, CheckRequest, EmbedRequest, MarkedArtifacts};

use async_trait::async_trait;

/// Capability interface over the detection oracle.
#[async_trait]
pub trait DetectionBackend: Send + Sync {
    /// Embed `request.mark` into `request.cover`, producing the marked image
    /// and the mark-descriptor at the requested output locations.
    async fn embed(&self, request: EmbedRequest<'_>) -> Result<MarkedArtifacts, DetectionError>;

    /// Test whether `request.probe` carries the mark embedded in
    /// `request.cover`.
    async fn check(&self, request: CheckRequest<'_>) -> Result<CheckReport, DetectionError>;

    /// Human-readable name of this backend.
    fn name(&self) -> &str;
}
