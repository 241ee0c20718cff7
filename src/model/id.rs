// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use sha2::{Digest, Sha256};

/// Number of digest bytes kept in an identifier (hex encoded to twice as many chars)
const ID_BYTES: usize = 16;

/// Create the stable podcast identifier for a feed URI
///
/// The URI is trimmed and lowercased before hashing, so two URIs that only
/// differ by casing or surrounding whitespace map to the same podcast.
pub fn create_id(feed_uri: &str) -> String {
    hash_hex(&[feed_uri.trim().to_lowercase().as_bytes()])
}

/// Derive an episode identifier
///
/// Uses the feed item's guid when it carries one, otherwise a hash over the
/// feed URI and the media URL.
pub fn episode_id(feed_uri: &str, guid: Option<&str>, media_url: &str) -> String {
    match guid.map(str::trim).filter(|g| !g.is_empty()) {
        Some(guid) => guid.to_string(),
        None => hash_hex(&[
            feed_uri.trim().to_lowercase().as_bytes(),
            b"\n",
            media_url.trim().as_bytes(),
        ]),
    }
}

fn hash_hex(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize()[..ID_BYTES]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
