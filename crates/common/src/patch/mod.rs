// Position-addressed text patches.
//
// Offsets are Unicode scalar value (char) offsets into the pre-mutation
// content, never byte offsets.

pub mod apply;
pub mod parse;
pub mod range;

use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use apply::{apply_patches, char_len};
pub use parse::{ParseTier, ParsedPatches, PatchParseError, PatchParser};
pub use range::{validate_ranges, RangeError};

/// Replace the char range `[start, end)` with `content`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    pub start: usize,
    pub end: usize,
    pub content: String,
}

impl Patch {
    pub fn new(start: usize, end: usize, content: impl Into<String>) -> Self {
        Self { start, end, content: content.into() }
    }

    /// Pure insertion at `position`.
    pub fn insert(position: usize, content: impl Into<String>) -> Self {
        Self::new(position, position, content)
    }

    /// Insertion at the end of a document of `content_length` chars.
    pub fn append(content_length: usize, content: impl Into<String>) -> Self {
        Self::insert(content_length, content)
    }
}

/// Wire form of a patch as supplied by a caller.
///
/// Exactly one of `content` and `content_base64` must be present.
/// `content_base64` sidesteps JSON escaping entirely. A deletion is spelled
/// `"content": ""`; an object without either field is rejected rather than
/// read as an empty replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatchSpec {
    pub start: usize,
    pub end: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_base64: Option<String>,
}

impl PatchSpec {
    pub fn text(start: usize, end: usize, content: impl Into<String>) -> Self {
        Self { start, end, content: Some(content.into()), content_base64: None }
    }

    pub fn base64(start: usize, end: usize, encoded: impl Into<String>) -> Self {
        Self { start, end, content: None, content_base64: Some(encoded.into()) }
    }

    /// Why the content fields are unusable, if they are.
    pub fn content_problem(&self) -> Option<&'static str> {
        match (&self.content, &self.content_base64) {
            (Some(_), None) | (None, Some(_)) => None,
            (None, None) => Some("missing `content` (use \"\" to delete the range)"),
            (Some(_), Some(_)) => Some("both `content` and `content_base64` given"),
        }
    }

    /// Resolve the replacement text, decoding `content_base64` when supplied.
    ///
    /// `index` is the patch's position in the caller's batch and is carried
    /// into the error.
    pub fn decode(self, index: usize) -> Result<Patch, SpecError> {
        if let Some(problem) = self.content_problem() {
            return Err(SpecError::Content { index, problem });
        }
        let content = match self.content_base64 {
            Some(encoded) => decode_base64_text(&encoded)
                .map_err(|reason| SpecError::Encoding { index, reason })?,
            None => self.content.unwrap_or_default(),
        };
        Ok(Patch { start: self.start, end: self.end, content })
    }
}

/// Decode a batch of wire patches, failing on the first bad one.
pub fn decode_specs(specs: Vec<PatchSpec>) -> Result<Vec<Patch>, SpecError> {
    specs.into_iter().enumerate().map(|(index, spec)| spec.decode(index)).collect()
}

/// One wire patch could not be turned into a [`Patch`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    #[error("patch {index}: {problem}")]
    Content { index: usize, problem: &'static str },
    #[error("patch {index}: invalid content_base64: {reason}")]
    Encoding { index: usize, reason: String },
}

fn decode_base64_text(encoded: &str) -> Result<String, String> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|error| error.to_string())?;
    String::from_utf8(bytes).map_err(|error| format!("decoded bytes are not utf-8: {error}"))
}
