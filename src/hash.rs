//! Content identity and file digests.
//!
//! [`content_hash`] is the single producer of an item's `content_hash`: the
//! converter stamps it, and the importer recomputes it to check incoming
//! records. It covers the fields that define "the same question" and
//! leaves out `asset_refs` and `metadata`: re-pointing an image or
//! appending provenance never changes identity.
//!
//! File digests in the manifest use the `sha256:<hex>` form produced by
//! [`prefixed_digest`].

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::models::{Alternatives, Area, CanonicalItem, Letter};

/// Algorithm prefix on manifest checksums.
pub const DIGEST_PREFIX: &str = "sha256:";

/// The fields that make up an item's identity, in hashing order.
#[derive(Debug, Serialize)]
pub struct ContentIdentity<'a> {
    pub text: &'a str,
    pub alternatives: &'a Alternatives,
    pub correct_answer: Letter,
    pub area: Area,
    pub year: i32,
    pub sequence: u32,
}

impl<'a> ContentIdentity<'a> {
    /// Identity of a parsed record. `sequence` comes from the record's
    /// item id, which the caller has already decoded.
    pub fn of(item: &'a CanonicalItem, sequence: u32) -> Self {
        Self {
            text: &item.text,
            alternatives: &item.alternatives,
            correct_answer: item.correct_answer,
            area: item.area,
            year: item.year,
            sequence,
        }
    }
}

/// SHA-256 over the compact JSON form of `identity`, lowercase hex.
pub fn content_hash(identity: &ContentIdentity<'_>) -> String {
    // Struct field order is fixed, so the JSON byte stream is stable.
    let canonical = serde_json::to_vec(identity).unwrap_or_default();
    sha256_hex(&canonical)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// `sha256:<hex>` digest of `bytes`, as stored in manifest checksums.
pub fn prefixed_digest(bytes: &[u8]) -> String {
    format!("{}{}", DIGEST_PREFIX, sha256_hex(bytes))
}

/// Strips the algorithm prefix from a manifest checksum.
///
/// Returns `None` for any other algorithm or a malformed hex body.
pub fn strip_digest_prefix(digest: &str) -> Option<&str> {
    let hex_part = digest.strip_prefix(DIGEST_PREFIX)?;
    if hex_part.len() == 64 && hex_part.bytes().all(|b| b.is_ascii_hexdigit()) {
        Some(hex_part)
    } else {
        None
    }
}
