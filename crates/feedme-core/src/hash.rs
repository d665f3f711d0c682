//! Feed data integrity hash
//!
//! The `FeedMd5` field of an ActionRevelation is the base64-encoded MD5 of
//! the canonical JSON encoding of the post-delta feed data. Canonicality
//! relies on serde_json's default sorted object keys; the `preserve_order`
//! feature must stay off.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use md5::{Digest, Md5};
use serde_json::Value;

/// Compute the integrity hash for a feed data object.
pub fn feed_data_hash(feed_data: &Value) -> String {
    // Encoding a Value cannot fail.
    let canonical = serde_json::to_string(feed_data).unwrap_or_default();
    let digest = Md5::digest(canonical.as_bytes());
    BASE64.encode(digest)
}
