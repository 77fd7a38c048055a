use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One persisted response variant.
///
/// Everything the client caching layer needs to rebuild a response:
/// status line data, timing metadata, the full header multimap and the
/// body bytes. `vary_keys` holds the negotiated header values that
/// distinguish this variant from its siblings under the same url.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Canonical url string of the cached request.
    pub url: String,
    /// HTTP response status code.
    pub status_code: u16,
    /// Protocol version as sent, e.g. "HTTP/1.1".
    pub version: String,
    /// When the request was sent, epoch milliseconds.
    pub request_time: i64,
    /// When the response was received, epoch milliseconds.
    pub response_time: i64,
    /// Expiration instant, epoch milliseconds.
    pub expires: i64,
    /// Response headers, insertion-ordered, duplicate names allowed.
    pub headers: IndexMap<String, Vec<String>>,
    /// Negotiated header name -> value pairs this variant was selected by.
    /// Sorted map, so its canonical form is independent of insertion order.
    pub vary_keys: BTreeMap<String, String>,
    /// Response body, byte-exact.
    pub body: Vec<u8>,
}

// Two entries with the same url and vary keys are the same logical
// variant; the newer one replaces the older on store.
impl PartialEq for CacheEntry {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url && self.vary_keys == other.vary_keys
    }
}

impl Eq for CacheEntry {}

impl Hash for CacheEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.url.hash(state);
        self.vary_keys.hash(state);
    }
}

impl CacheEntry {
    /// Field-by-field comparison, unlike `==` which only checks variant
    /// identity. Mostly useful in tests.
    pub fn same_payload(&self, other: &Self) -> bool {
        self.url == other.url
            && self.status_code == other.status_code
            && self.version == other.version
            && self.request_time == other.request_time
            && self.response_time == other.response_time
            && self.expires == other.expires
            && self.headers == other.headers
            && self.vary_keys == other.vary_keys
            && self.body == other.body
    }
}
