//! Content-fingerprint deduplication of raw items.

use std::collections::HashSet;

use sentirag_core::{truncate_chars, RawItem, Source, FINGERPRINT_BODY_CHARS};
use sha2::{Digest, Sha256};

/// Hex SHA-256 over `title|url|first 200 chars of body`.
#[must_use]
pub fn fingerprint(item: &RawItem) -> String {
    let mut hasher = Sha256::new();
    hasher.update(item.title.as_bytes());
    hasher.update(b"|");
    hasher.update(item.url.as_bytes());
    hasher.update(b"|");
    hasher.update(truncate_chars(&item.text, FINGERPRINT_BODY_CHARS).as_bytes());
    hex::encode(hasher.finalize())
}

/// Drop items whose fingerprint was already seen. The first occurrence wins
/// and input order is preserved.
#[must_use]
pub fn deduplicate(items: Vec<RawItem>) -> Vec<RawItem> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(fingerprint(item)))
        .collect()
}

/// Split an already-deduplicated batch by source, in [`Source::ALL`] order.
///
/// Sources with no items are omitted. Within a group, input order is kept.
#[must_use]
pub fn group_by_source(items: Vec<RawItem>) -> Vec<(Source, Vec<RawItem>)> {
    let mut groups: Vec<(Source, Vec<RawItem>)> =
        Source::ALL.iter().map(|s| (*s, Vec::new())).collect();
    for item in items {
        if let Some((_, bucket)) = groups.iter_mut().find(|(s, _)| *s == item.source) {
            bucket.push(item);
        }
    }
    groups.retain(|(_, bucket)| !bucket.is_empty());
    groups
}
