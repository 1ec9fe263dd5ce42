// Optimistic lock check: the caller must present the fingerprint of the
// content it last read. Nothing is held between that read and this check.

use folio_common::hash::fingerprints_match;

use super::error::EditError;
use crate::store::documents::DocumentRecord;

pub struct ConcurrencyGuard;

impl ConcurrencyGuard {
    pub fn check(document: &DocumentRecord, presented_hash: &str) -> Result<(), EditError> {
        if fingerprints_match(presented_hash, &document.content_hash) {
            return Ok(());
        }
        Err(EditError::HashMismatch {
            id: document.id.clone(),
            presented: presented_hash.to_string(),
            current_hash: document.content_hash.clone(),
            current_version: document.version,
        })
    }
}
