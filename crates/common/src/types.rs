// Document and version shapes returned by the editor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hash::ContentHash;
use crate::patch::ParseTier;

/// Current state of a document, as returned by a read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentView {
    pub id: String,
    pub content: String,
    pub content_hash: ContentHash,
    /// Length in chars.
    pub content_length: usize,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of a committed mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EditSummary {
    pub id: String,
    pub content_hash: ContentHash,
    pub content_length: usize,
    pub version: i64,
    pub patches_applied: usize,
    /// Objects dropped by payload recovery; zero unless the manual scan ran.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub patches_skipped: usize,
    /// Which parser tier produced the patches, for raw `patch` payloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_tier: Option<ParseTier>,
}

/// Immutable copy of a document taken just before a mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionSnapshot {
    pub document_id: String,
    pub version: i64,
    pub content: String,
    pub content_hash: ContentHash,
    pub content_length: usize,
    pub created_by: String,
    pub request_id: String,
    pub created_at: DateTime<Utc>,
}

/// History entry without the content body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionSummary {
    pub version: i64,
    pub content_hash: ContentHash,
    pub content_length: usize,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

fn is_zero(value: &usize) -> bool {
    *value == 0
}
