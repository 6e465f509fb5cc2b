// Content hashing for echo detection.
//
// The watcher compares the SHA-256 of what it is about to emit against the
// last content known to be on disk, so a save that outlives the suppression
// window is still recognised as our own.

use std::fmt::Write as _;

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of file content.
pub type ContentHash = String;

/// SHA-256 of the given bytes as a lowercase hex string.
pub fn sha256_hex(content: &[u8]) -> ContentHash {
    let digest = Sha256::digest(content);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
