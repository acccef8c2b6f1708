//! Content hashing for tags.
//!
//! The hash covers everything that ends up in the document (kind, position,
//! attributes, body) and nothing that only affects bookkeeping (entry,
//! sequence, priority). Two renderers that resolve the same tag therefore
//! agree on its hash without sharing memory.

use super::{AttrValue, HeadTag};
use std::fmt;

/// Number of hex characters kept from the blake3 digest.
const HASH_LEN: usize = 16;

/// Short hex digest of a tag's rendered shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(String);

impl ContentHash {
    /// Hash a tag's rendered shape.
    pub fn of_tag(tag: &HeadTag) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(tag.kind.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(tag.position.as_str().as_bytes());
        hasher.update(&[0]);
        for (name, value) in &tag.props {
            hasher.update(name.as_bytes());
            match value {
                AttrValue::Text(text) => {
                    hasher.update(&[1]);
                    hasher.update(text.as_bytes());
                }
                AttrValue::Flag => {
                    hasher.update(&[2]);
                }
            }
            hasher.update(&[0]);
        }
        hash_opt(&mut hasher, tag.text_content.as_deref());
        hash_opt(&mut hasher, tag.inner_html.as_deref());
        Self::from_digest(hasher.finalize())
    }

    /// Hash a list of tag hashes in order (whole-document fingerprint).
    pub fn of_set<'a>(hashes: impl IntoIterator<Item = &'a ContentHash>) -> Self {
        let mut hasher = blake3::Hasher::new();
        for hash in hashes {
            hasher.update(hash.0.as_bytes());
            hasher.update(b",");
        }
        Self::from_digest(hasher.finalize())
    }

    fn from_digest(digest: blake3::Hash) -> Self {
        let mut hex = hex::encode(digest.as_bytes());
        hex.truncate(HASH_LEN);
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ContentHash {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn hash_opt(hasher: &mut blake3::Hasher, value: Option<&str>) {
    match value {
        Some(text) => {
            hasher.update(&[1]);
            hasher.update(text.as_bytes());
        }
        None => {
            hasher.update(&[0]);
        }
    }
}
