use crate::{CacheEntry, CacheError};

/// Codec between in-memory entries and the bytes a backend persists.
///
/// Implementations must round-trip every `CacheEntry` field exactly,
/// including duplicate header names and the raw body bytes.
pub trait EntrySerializer: Send + Sync {
    fn serialize_entry(entry: &CacheEntry) -> Result<Vec<u8>, CacheError>;

    fn deserialize_entry(data: &[u8]) -> Result<CacheEntry, CacheError>;
}

#[derive(Debug, Clone, Copy)]
pub struct JsonSerializer;

impl EntrySerializer for JsonSerializer {
    fn serialize_entry(entry: &CacheEntry) -> Result<Vec<u8>, CacheError> {
        serde_json::to_vec(entry)
            .map_err(|e| CacheError::Serialization(e.to_string()))
    }

    fn deserialize_entry(data: &[u8]) -> Result<CacheEntry, CacheError> {
        serde_json::from_slice(data)
            .map_err(|e| CacheError::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use std::collections::BTreeMap;

    #[test]
    fn round_trip_preserves_every_field() {
        let mut headers = IndexMap::new();
        headers.insert(
            "set-cookie".to_string(),
            vec!["a=1".to_string(), "b=2".to_string()],
        );
        headers.insert("content-type".to_string(), vec!["text/html".to_string()]);

        let mut vary_keys = BTreeMap::new();
        vary_keys.insert("accept-language".to_string(), "fr".to_string());

        let entry = CacheEntry {
            url: "https://example.com/page?q=1".to_string(),
            status_code: 203,
            version: "HTTP/2.0".to_string(),
            request_time: 1_700_000_000_000,
            response_time: 1_700_000_000_250,
            expires: 1_700_003_600_000,
            headers,
            vary_keys,
            body: vec![0, 159, 146, 150, 255, 10, 13],
        };

        let bytes = JsonSerializer::serialize_entry(&entry).unwrap();
        let decoded = JsonSerializer::deserialize_entry(&bytes).unwrap();

        assert!(decoded.same_payload(&entry));
        // Header order must survive as well.
        assert_eq!(
            decoded.headers.keys().collect::<Vec<_>>(),
            entry.headers.keys().collect::<Vec<_>>()
        );
    }

    #[test]
    fn garbage_fails_to_deserialize() {
        let result = JsonSerializer::deserialize_entry(b"{not json");
        assert!(matches!(result, Err(CacheError::Deserialization(_))));
    }

    #[test]
    fn truncated_record_fails_to_deserialize() {
        let entry = CacheEntry {
            url: "https://example.com/".to_string(),
            status_code: 200,
            version: "HTTP/1.1".to_string(),
            request_time: 0,
            response_time: 0,
            expires: 0,
            headers: IndexMap::new(),
            vary_keys: BTreeMap::new(),
            body: b"abc".to_vec(),
        };
        let mut bytes = JsonSerializer::serialize_entry(&entry).unwrap();
        bytes.truncate(bytes.len() / 2);
        assert!(JsonSerializer::deserialize_entry(&bytes).is_err());
    }
}
