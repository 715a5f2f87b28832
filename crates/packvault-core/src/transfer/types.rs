//! Core transfer identifiers and data structures.
//!
//! Items are assembled by the caller (pack membership is resolved upstream)
//! and are read-only to the engine for the lifetime of an operation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Content-addressed identity of a blob (checkpoint, LoRA, preview bundle).
///
/// The key is the blob's hash as produced by the pack store. The engine
/// treats it as an opaque string; it carries no path or URL semantics.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobKey(String);

impl BlobKey {
    /// Create a key from its string form.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlobKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for BlobKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// One unit of transfer work.
///
/// Uniqueness of `key` within a batch is a caller contract, not enforced
/// here; duplicate keys are executed independently.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferItem {
    /// Content-addressed key; identity within one operation.
    pub key: BlobKey,
    /// Human-readable label; never used for identity.
    pub display_name: String,
    /// Expected size. Drives aggregate byte and rate math only; a wrong
    /// size skews the ETA but never correctness.
    pub size_bytes: u64,
}

impl TransferItem {
    /// Create a new transfer item.
    pub fn new(key: impl Into<BlobKey>, display_name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            key: key.into(),
            display_name: display_name.into(),
            size_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_key_display() {
        let key = BlobKey::new("sha256:ab12");
        assert_eq!(key.to_string(), "sha256:ab12");
        assert_eq!(key.as_str(), "sha256:ab12");
    }

    #[test]
    fn test_blob_key_serializes_transparently() {
        let key = BlobKey::new("cafe01");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"cafe01\"");
    }

    #[test]
    fn test_item_construction() {
        let item = TransferItem::new("abc", "model.safetensors", 4096);
        assert_eq!(item.key.as_str(), "abc");
        assert_eq!(item.display_name, "model.safetensors");
        assert_eq!(item.size_bytes, 4096);
    }
}
