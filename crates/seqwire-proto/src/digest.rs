//! End-to-end series digest.
//!
//! Both ends compute the same function: each element rendered as 4 bytes
//! big-endian, concatenated in index order, hashed with SHA-1. The digest is
//! order-sensitive, so a permuted or corrupted series is detected even when
//! every element was individually delivered.

use sha1::{Digest, Sha1};

/// Width of the series digest in bytes (SHA-1, 160 bits).
pub const DIGEST_LEN: usize = 20;

/// Digest of an ordered series.
///
/// Pure and deterministic: identical input series always yield identical
/// bytes.
pub fn series_digest(series: &[u32]) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha1::new();
    for value in series {
        hasher.update(value.to_be_bytes());
    }
    hasher.finalize().into()
}
