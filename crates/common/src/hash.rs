// Content fingerprinting for optimistic locking.
//
// A document's fingerprint is the SHA-256 of its UTF-8 content, rendered as
// lowercase hex. Readers receive it alongside the content; writers present it
// back so a stale view can be detected at commit time.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 hash of document content.
pub type ContentHash = String;

const PREFIX: &str = "sha256:";

/// Compute the fingerprint of a document's content.
pub fn fingerprint(content: &str) -> ContentHash {
    sha256_hex(content.as_bytes())
}

/// Compute the SHA-256 hash of the given bytes, returned as a lowercase hex string.
pub fn sha256_hex(content: &[u8]) -> ContentHash {
    let digest = Sha256::digest(content);
    hex_encode(&digest)
}

/// Canonical form of a caller-presented fingerprint.
///
/// Strips surrounding whitespace and double quotes (etag style), an optional
/// `sha256:` prefix, and lowercases the hex digits.
pub fn normalize_presented(value: &str) -> String {
    let trimmed = value.trim();
    let unquoted =
        trimmed.strip_prefix('"').and_then(|v| v.strip_suffix('"')).unwrap_or(trimmed).trim();
    let bare = match unquoted.get(..PREFIX.len()) {
        Some(head) if head.eq_ignore_ascii_case(PREFIX) => &unquoted[PREFIX.len()..],
        _ => unquoted,
    };
    bare.to_ascii_lowercase()
}

/// Whether a presented fingerprint refers to the same content as `current`.
pub fn fingerprints_match(presented: &str, current: &str) -> bool {
    normalize_presented(presented) == normalize_presented(current)
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    s
}
