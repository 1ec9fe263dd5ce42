// Multi-range text replacement over char offsets.

use super::range::{validate_ranges, RangeError};
use super::Patch;

/// Number of Unicode scalar values in `content`.
pub fn char_len(content: &str) -> usize {
    content.chars().count()
}

/// Apply a batch of patches to `content`.
///
/// Every `start`/`end` addresses the original `content`, so offset drift
/// from earlier replacements never has to be tracked by the caller. The
/// batch is validated first; on error nothing is produced.
///
/// A non-empty range replaced by empty or whitespace-only content is a
/// deletion. Insertions keep their content verbatim.
pub fn apply_patches(content: &str, patches: &[Patch]) -> Result<String, RangeError> {
    let boundaries = char_boundaries(content);
    let content_length = boundaries.len() - 1;
    let order = validate_ranges(content_length, patches)?;

    let inserted: usize = patches.iter().map(|patch| patch.content.len()).sum();
    let mut out = String::with_capacity(content.len() + inserted);
    let mut cursor = 0usize;

    for index in order {
        let patch = &patches[index];
        let start = boundaries[patch.start];
        let end = boundaries[patch.end];

        out.push_str(&content[cursor..start]);
        if !is_deletion(patch) {
            out.push_str(&patch.content);
        }
        cursor = end;
    }
    out.push_str(&content[cursor..]);

    Ok(out)
}

fn is_deletion(patch: &Patch) -> bool {
    patch.start < patch.end && patch.content.trim().is_empty()
}

/// Byte offset of every char boundary, including the end of the string.
///
/// `boundaries[n]` is the byte offset of char offset `n`.
fn char_boundaries(content: &str) -> Vec<usize> {
    let mut boundaries: Vec<usize> = content.char_indices().map(|(offset, _)| offset).collect();
    boundaries.push(content.len());
    boundaries
}
