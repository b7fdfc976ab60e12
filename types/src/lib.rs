//! Fundamental types for the Photo Shield content-protection core.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! identifiers, point amounts, timestamps, content pointers, and the asset and
//! download records persisted by the storage layer.

pub mod asset;
pub mod content;
pub mod download;
pub mod error;
pub mod ids;
pub mod points;
pub mod time;

pub use asset::{Asset, Candidate, NewAsset};
pub use content::ContentRef;
pub use download::DownloadRecord;
pub use error::TypeError;
pub use ids::{AssetId, UserId};
pub use points::Points;
pub use time::{Clock, SystemClock, Timestamp};
