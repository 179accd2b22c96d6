//! Snapshot fingerprints.
//!
//! A fingerprint is the SHA-256 of a snapshot's JSON encoding. Snapshots
//! contain no timestamps, so recompiling unchanged inputs yields the same
//! fingerprint. The API hands it out as an `ETag` and accepts it back in
//! `If-Match` so an approver signs off on exactly the figures they saw.

use sha2::{Digest, Sha256};

use crate::{Result, result::ResultSnapshot};

/// Quoted hex fingerprint of `snapshot`.
pub fn compute_etag(snapshot: &ResultSnapshot) -> Result<String> {
  let bytes = serde_json::to_vec(snapshot)?;
  let hash = Sha256::digest(&bytes);
  Ok(format!("\"{}\"", hex::encode(hash)))
}

/// Compare two ETags, accepting either with or without surrounding quotes.
pub fn etags_match(a: &str, b: &str) -> bool { strip_etag_quotes(a) == strip_etag_quotes(b) }

fn strip_etag_quotes(s: &str) -> &str { s.trim().trim_matches('"') }
