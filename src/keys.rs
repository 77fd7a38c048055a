//! Derived storage addressing.
//!
//! Physical addressing never uses the raw url: both key types are
//! lowercase-hex SHA-256 digests, safe for file names and flat
//! key/value namespaces alike. The derivation scheme is versioned ("v1"
//! below); changing it invalidates every existing cache directory, so
//! any change must bump the scheme and is effectively a new format.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

/// Stable identifier for a request url.
///
/// v1 scheme: `hex(sha256(url))` over the canonical url string.
/// Deterministic across processes and platforms, total over any string
/// input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn derive(url: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        Self(to_hex(&hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable identifier for a set of vary keys.
///
/// v1 scheme: entries are serialized in sorted-by-name order as
/// `name 0x1f value 0x1e` frames and the concatenation is SHA-256
/// hashed. The separator bytes cannot occur in header names or values,
/// which makes the framing injective; sorting makes the digest
/// independent of map iteration order. The empty map hashes the empty
/// string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariantKey(String);

impl VariantKey {
    pub fn derive(vary_keys: &BTreeMap<String, String>) -> Self {
        let mut hasher = Sha256::new();
        for (name, value) in vary_keys {
            hasher.update(name.as_bytes());
            hasher.update([0x1f]);
            hasher.update(value.as_bytes());
            hasher.update([0x1e]);
        }
        Self(to_hex(&hasher.finalize()))
    }

    /// Wrap an already-derived key read back from the physical medium
    /// (a directory listing, a composite-key suffix). Backends need
    /// this; it performs no validation.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VariantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn to_hex(digest: &[u8]) -> String {
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
