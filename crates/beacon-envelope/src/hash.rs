//! Deterministic hashing for sensitivity transforms.
//!
//! Uses an unkeyed SHA-256 digest: identical inputs hash identically
//! within and across processes, so the backend can correlate hashed
//! fields between sessions without ever seeing the raw value.

use sha2::{Digest, Sha256};

/// SHA-256 of the input, hex-encoded (64 lowercase hex characters).
pub fn sha256_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(digest)
}
