//! In-memory backend. The substitutable fake the backend contract
//! calls for in tests, also usable as a non-durable cache medium.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{CacheBackend, CacheError, StorageKey, VariantKey};

#[derive(Default)]
pub struct InMemoryBackend {
    entries: Mutex<HashMap<StorageKey, HashMap<VariantKey, Vec<u8>>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheBackend for InMemoryBackend {
    async fn exists(
        &self,
        key: &StorageKey,
        variant: Option<&VariantKey>,
    ) -> Result<bool, CacheError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| CacheError::Store(e.to_string()))?;
        Ok(match (entries.get(key), variant) {
            (Some(variants), Some(variant)) => variants.contains_key(variant),
            (Some(variants), None) => !variants.is_empty(),
            (None, _) => false,
        })
    }

    async fn write(
        &self,
        key: &StorageKey,
        variant: &VariantKey,
        data: &[u8],
    ) -> Result<(), CacheError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| CacheError::Store(e.to_string()))?;
        entries
            .entry(key.clone())
            .or_default()
            .insert(variant.clone(), data.to_vec());
        Ok(())
    }

    async fn list_variants(
        &self,
        key: &StorageKey,
    ) -> Result<HashSet<VariantKey>, CacheError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| CacheError::Store(e.to_string()))?;
        Ok(entries
            .get(key)
            .map(|variants| variants.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn read(
        &self,
        key: &StorageKey,
        variant: &VariantKey,
    ) -> Result<Option<Vec<u8>>, CacheError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| CacheError::Store(e.to_string()))?;
        Ok(entries
            .get(key)
            .and_then(|variants| variants.get(variant))
            .cloned())
    }

    async fn purge(&self, key: Option<&StorageKey>) -> Result<(), CacheError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| CacheError::Store(e.to_string()))?;
        match key {
            Some(key) => {
                entries.remove(key);
            }
            None => entries.clear(),
        }
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.lock().unwrap();
        f.debug_struct("InMemoryBackend")
            .field("storage_keys", &entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn keys(url: &str) -> (StorageKey, VariantKey) {
        (StorageKey::derive(url), VariantKey::derive(&BTreeMap::new()))
    }

    #[tokio::test]
    async fn write_read_overwrite() {
        let backend = InMemoryBackend::new();
        let (key, variant) = keys("https://example.com/");

        assert_eq!(backend.read(&key, &variant).await.unwrap(), None);
        backend.write(&key, &variant, b"one").await.unwrap();
        backend.write(&key, &variant, b"two").await.unwrap();
        assert_eq!(
            backend.read(&key, &variant).await.unwrap().as_deref(),
            Some(&b"two"[..])
        );
        assert_eq!(backend.list_variants(&key).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn purge_variants_is_idempotent() {
        let backend = InMemoryBackend::new();
        let (key, variant) = keys("https://example.com/");

        backend.write(&key, &variant, b"x").await.unwrap();
        backend.purge(Some(&key)).await.unwrap();
        backend.purge(Some(&key)).await.unwrap();
        assert!(!backend.exists(&key, None).await.unwrap());
        backend.purge(None).await.unwrap();
        backend.purge(None).await.unwrap();
    }
}
