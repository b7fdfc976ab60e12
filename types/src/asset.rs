//! Published assets and their candidate projection.

use serde::{Deserialize, Serialize};

use crate::{AssetId, ContentRef, Points, Timestamp, UserId};

/// A published asset.
///
/// `mark_descriptor` is present iff the asset passed verification and mark
/// embedding succeeded. Assets without one are exempt from verification scans.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    /// Marked content served to downloaders.
    pub content: ContentRef,
    /// Byte-identical copy of the upload, kept as evidence.
    pub original: ContentRef,
    pub mark_descriptor: Option<ContentRef>,
    pub caption: String,
    pub category: String,
    pub price: Points,
    pub owner: UserId,
    pub created_at: Timestamp,
}

impl Asset {
    /// Display name of the asset: its primary content pointer.
    pub fn name(&self) -> &str {
        self.content.as_str()
    }

    /// Project this asset onto a scan candidate, if it carries a mark.
    pub fn candidate(&self) -> Option<Candidate> {
        self.mark_descriptor.as_ref().map(|mark| Candidate {
            id: self.id,
            content: self.content.clone(),
            original: self.original.clone(),
            mark_descriptor: mark.clone(),
        })
    }
}

/// An asset row before the storage layer has assigned its id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewAsset {
    pub content: ContentRef,
    pub original: ContentRef,
    pub mark_descriptor: Option<ContentRef>,
    pub caption: String,
    pub category: String,
    pub price: Points,
    pub owner: UserId,
    pub created_at: Timestamp,
}

impl NewAsset {
    pub fn with_id(self, id: AssetId) -> Asset {
        Asset {
            id,
            content: self.content,
            original: self.original,
            mark_descriptor: self.mark_descriptor,
            caption: self.caption,
            category: self.category,
            price: self.price,
            owner: self.owner,
            created_at: self.created_at,
        }
    }
}

/// A previously published, mark-bearing asset eligible to be matched
/// against a probe.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: AssetId,
    pub content: ContentRef,
    pub original: ContentRef,
    pub mark_descriptor: ContentRef,
}
