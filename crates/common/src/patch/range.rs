// Bounds and overlap validation for a batch of patches.
//
// All offsets are coordinates into the pre-mutation content. Indices in
// errors refer to the caller's original batch order.

use thiserror::Error;

use super::Patch;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error(
        "patch {index}: `{field}` = {value} is beyond the content length {content_length}"
    )]
    OutOfBounds { index: usize, field: &'static str, value: usize, content_length: usize },
    #[error("patch {index}: end ({end}) is before start ({start})")]
    InvalidRange { index: usize, start: usize, end: usize },
    #[error(
        "patches {first} [{first_start}, {first_end}) and \
         {second} [{second_start}, {second_end}) overlap"
    )]
    Overlap {
        first: usize,
        first_start: usize,
        first_end: usize,
        second: usize,
        second_start: usize,
        second_end: usize,
    },
}

/// Check every patch against `content_length` and against each other.
///
/// Returns the caller-order indices of `patches` in canonical application
/// order: ascending `start`, ties broken by ascending `end`, remaining ties
/// by caller order. Two insertions at the same offset are not an overlap;
/// they are applied in caller order.
pub fn validate_ranges(content_length: usize, patches: &[Patch]) -> Result<Vec<usize>, RangeError> {
    for (index, patch) in patches.iter().enumerate() {
        if patch.start > content_length {
            return Err(RangeError::OutOfBounds {
                index,
                field: "start",
                value: patch.start,
                content_length,
            });
        }
        if patch.end > content_length {
            return Err(RangeError::OutOfBounds {
                index,
                field: "end",
                value: patch.end,
                content_length,
            });
        }
        if patch.end < patch.start {
            return Err(RangeError::InvalidRange { index, start: patch.start, end: patch.end });
        }
    }

    let order = canonical_order(patches);
    for pair in order.windows(2) {
        let (a, b) = (&patches[pair[0]], &patches[pair[1]]);
        if a.end > b.start {
            return Err(RangeError::Overlap {
                first: pair[0],
                first_start: a.start,
                first_end: a.end,
                second: pair[1],
                second_start: b.start,
                second_end: b.end,
            });
        }
    }

    Ok(order)
}

fn canonical_order(patches: &[Patch]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..patches.len()).collect();
    // Stable sort keeps caller order for identical ranges.
    order.sort_by_key(|&index| (patches[index].start, patches[index].end));
    order
}
