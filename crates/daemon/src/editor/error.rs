use folio_common::patch::{PatchParseError, RangeError, SpecError};
use serde_json::{json, Value};
use thiserror::Error;

/// Stable machine-readable failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NotFound,
    Forbidden,
    HashMismatch,
    OutOfBounds,
    InvalidRange,
    Overlap,
    ParseError,
    EncodingError,
    StorageError,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::Forbidden => "FORBIDDEN",
            Self::HashMismatch => "HASH_MISMATCH",
            Self::OutOfBounds => "OUT_OF_BOUNDS",
            Self::InvalidRange => "INVALID_RANGE",
            Self::Overlap => "OVERLAP",
            Self::ParseError => "PARSE_ERROR",
            Self::EncodingError => "ENCODING_ERROR",
            Self::StorageError => "STORAGE_ERROR",
        }
    }

    pub const fn retryable(self) -> bool {
        matches!(self, Self::HashMismatch | Self::StorageError)
    }

    pub const fn hint(self) -> &'static str {
        match self {
            Self::NotFound => "check the document id; documents are never created implicitly",
            Self::Forbidden => "this actor may read but not modify documents",
            Self::HashMismatch => {
                "re-read the document to obtain a fresh fingerprint and resubmit"
            }
            Self::OutOfBounds | Self::InvalidRange => {
                "re-read the document and recompute offsets against its current content"
            }
            Self::Overlap => "merge overlapping patches into one or split them into separate calls",
            Self::ParseError => folio_common::patch::parse::BASE64_HINT,
            Self::EncodingError => {
                "`content_base64` must be standard padded base64 of utf-8 text"
            }
            Self::StorageError => "retry shortly; the document store was unavailable",
        }
    }
}

/// Every way an editor operation can fail. A failed mutation never leaves
/// partial state behind.
#[derive(Debug, Error)]
pub enum EditError {
    #[error("{}", not_found_message(.id, .version))]
    NotFound { id: String, version: Option<i64> },
    #[error("actor `{actor}` may not modify document `{id}`")]
    Forbidden { actor: String, id: String },
    #[error("content hash mismatch for document `{id}`: document is at version {current_version}")]
    HashMismatch { id: String, presented: String, current_hash: String, current_version: i64 },
    #[error("patch {index}: `{field}` = {value} is beyond the content length {content_length}")]
    OutOfBounds { index: usize, field: &'static str, value: usize, content_length: usize },
    #[error("patch {index}: end ({end}) is before start ({start})")]
    InvalidRange { index: usize, start: usize, end: usize },
    #[error("patches {first} and {second} overlap")]
    Overlap {
        first: usize,
        first_range: (usize, usize),
        second: usize,
        second_range: (usize, usize),
    },
    #[error("could not parse patch payload: {reason}")]
    Parse { reason: String, head: String, tail: String },
    #[error("patch {index}: invalid content_base64: {reason}")]
    Encoding { index: usize, reason: String },
    #[error("storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}

fn not_found_message(id: &str, version: &Option<i64>) -> String {
    match version {
        Some(version) => format!("document `{id}` has no snapshot for version {version}"),
        None => format!("document `{id}` not found"),
    }
}

impl EditError {
    pub fn not_found(id: &str) -> Self {
        Self::NotFound { id: id.to_string(), version: None }
    }

    pub(crate) fn empty_batch() -> Self {
        Self::parse_reason("patch list is empty".into())
    }

    fn parse_reason(reason: String) -> Self {
        Self::Parse { reason, head: String::new(), tail: String::new() }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::Forbidden { .. } => ErrorCode::Forbidden,
            Self::HashMismatch { .. } => ErrorCode::HashMismatch,
            Self::OutOfBounds { .. } => ErrorCode::OutOfBounds,
            Self::InvalidRange { .. } => ErrorCode::InvalidRange,
            Self::Overlap { .. } => ErrorCode::Overlap,
            Self::Parse { .. } => ErrorCode::ParseError,
            Self::Encoding { .. } => ErrorCode::EncodingError,
            Self::Storage(_) => ErrorCode::StorageError,
        }
    }

    pub fn retryable(&self) -> bool {
        self.code().retryable()
    }

    pub fn hint(&self) -> &'static str {
        self.code().hint()
    }

    /// Machine-readable fields for the failure, safe to return to callers.
    pub fn details(&self) -> Value {
        match self {
            Self::NotFound { id, version } => json!({ "id": id, "version": version }),
            Self::Forbidden { actor, id } => json!({ "actor": actor, "id": id }),
            Self::HashMismatch { id, presented, current_hash, current_version } => json!({
                "id": id,
                "presented_hash": presented,
                "current_hash": current_hash,
                "current_version": current_version,
            }),
            Self::OutOfBounds { index, field, value, content_length } => json!({
                "index": index,
                "field": field,
                "value": value,
                "content_length": content_length,
            }),
            Self::InvalidRange { index, start, end } => {
                json!({ "index": index, "start": start, "end": end })
            }
            Self::Overlap { first, first_range, second, second_range } => json!({
                "first": { "index": first, "start": first_range.0, "end": first_range.1 },
                "second": { "index": second, "start": second_range.0, "end": second_range.1 },
            }),
            Self::Parse { reason, head, tail } => {
                json!({ "reason": reason, "payload_head": head, "payload_tail": tail })
            }
            Self::Encoding { index, reason } => json!({ "index": index, "reason": reason }),
            Self::Storage(_) => json!({}),
        }
    }
}

impl From<RangeError> for EditError {
    fn from(error: RangeError) -> Self {
        match error {
            RangeError::OutOfBounds { index, field, value, content_length } => {
                Self::OutOfBounds { index, field, value, content_length }
            }
            RangeError::InvalidRange { index, start, end } => {
                Self::InvalidRange { index, start, end }
            }
            RangeError::Overlap {
                first,
                first_start,
                first_end,
                second,
                second_start,
                second_end,
            } => Self::Overlap {
                first,
                first_range: (first_start, first_end),
                second,
                second_range: (second_start, second_end),
            },
        }
    }
}

impl From<SpecError> for EditError {
    fn from(error: SpecError) -> Self {
        match error {
            SpecError::Encoding { index, reason } => Self::Encoding { index, reason },
            content @ SpecError::Content { .. } => Self::parse_reason(content.to_string()),
        }
    }
}

impl From<PatchParseError> for EditError {
    fn from(error: PatchParseError) -> Self {
        match error {
            PatchParseError::Unparseable { reason, head, tail } => {
                Self::Parse { reason, head, tail }
            }
            PatchParseError::Encoding { index, reason } => Self::Encoding { index, reason },
        }
    }
}
