//! Flat key/value backend for media with a single string namespace and
//! no native enumeration (browser-style local storage, simple embedded
//! stores).
//!
//! A (storage key, variant key) pair becomes one composite key,
//! `<prefix>_<storage>_<variant>`. Because the medium cannot list its
//! keys, an auxiliary index of every composite key ever written is
//! persisted under `<prefix>_index` and kept in sync with each write
//! and removal, so it survives process restarts. The index is cached
//! per backend instance, never process-wide.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::warn;

use crate::{CacheBackend, CacheError, StorageKey, VariantKey};

/// Default composite-key prefix. Contains no underscore, so splitting
/// composite keys on `_` is unambiguous.
pub const DEFAULT_KEY_PREFIX: &str = "httpcachestore";

/// Minimal contract of the underlying flat medium: string keys, string
/// values, no enumeration.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set_item(&self, key: &str, value: &str) -> Result<(), CacheError>;

    /// Removing an absent key is a no-op.
    async fn remove_item(&self, key: &str) -> Result<(), CacheError>;
}

#[async_trait]
impl<K: KvStore + ?Sized> KvStore for Arc<K> {
    async fn get_item(&self, key: &str) -> Result<Option<String>, CacheError> {
        (**self).get_item(key).await
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), CacheError> {
        (**self).set_item(key, value).await
    }

    async fn remove_item(&self, key: &str) -> Result<(), CacheError> {
        (**self).remove_item(key).await
    }
}

/// In-memory [`KvStore`], for tests and non-durable embedding. Share
/// one store between backend instances via `Arc` to model a persistent
/// medium outliving its backend.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    items: std::sync::Mutex<HashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, CacheError> {
        let items = self
            .items
            .lock()
            .map_err(|e| CacheError::Store(e.to_string()))?;
        Ok(items.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut items = self
            .items
            .lock()
            .map_err(|e| CacheError::Store(e.to_string()))?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), CacheError> {
        let mut items = self
            .items
            .lock()
            .map_err(|e| CacheError::Store(e.to_string()))?;
        items.remove(key);
        Ok(())
    }
}

pub struct FlatKvBackend<K: KvStore> {
    store: K,
    prefix: String,
    // Lazily-loaded copy of the persisted index; owned by this
    // instance so separate backends over separate stores cannot
    // interfere.
    index: Mutex<Option<HashSet<String>>>,
}

impl<K: KvStore> FlatKvBackend<K> {
    pub fn new(store: K) -> Self {
        Self::with_prefix(store, DEFAULT_KEY_PREFIX)
    }

    pub fn with_prefix(store: K, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            index: Mutex::new(None),
        }
    }

    fn index_key(&self) -> String {
        format!("{}_index", self.prefix)
    }

    fn data_key(&self, key: &StorageKey, variant: &VariantKey) -> String {
        format!("{}_{}_{}", self.prefix, key, variant)
    }

    /// Composite-key prefix shared by every variant of one storage key.
    fn key_scope(&self, key: &StorageKey) -> String {
        format!("{}_{}_", self.prefix, key)
    }

    async fn load_index<'a>(
        &self,
        cached: &'a mut Option<HashSet<String>>,
    ) -> Result<&'a mut HashSet<String>, CacheError> {
        if cached.is_none() {
            let loaded = match self.store.get_item(&self.index_key()).await? {
                Some(raw) => match serde_json::from_str::<HashSet<String>>(&raw)
                {
                    Ok(set) => set,
                    Err(e) => {
                        warn!(error = %e, "flat cache index unreadable, starting empty");
                        HashSet::new()
                    }
                },
                None => HashSet::new(),
            };
            *cached = Some(loaded);
        }
        Ok(cached.get_or_insert_with(HashSet::new))
    }

    async fn save_index(&self, index: &HashSet<String>) -> Result<(), CacheError> {
        let raw = serde_json::to_string(index)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.store.set_item(&self.index_key(), &raw).await
    }
}

#[async_trait]
impl<K: KvStore> CacheBackend for FlatKvBackend<K> {
    async fn exists(
        &self,
        key: &StorageKey,
        variant: Option<&VariantKey>,
    ) -> Result<bool, CacheError> {
        let mut cached = self.index.lock().await;
        let index = self.load_index(&mut *cached).await?;
        Ok(match variant {
            Some(variant) => index.contains(&self.data_key(key, variant)),
            None => {
                let scope = self.key_scope(key);
                index.iter().any(|item| item.starts_with(&scope))
            }
        })
    }

    async fn write(
        &self,
        key: &StorageKey,
        variant: &VariantKey,
        data: &[u8],
    ) -> Result<(), CacheError> {
        let mut cached = self.index.lock().await;
        let index = self.load_index(&mut *cached).await?;
        let data_key = self.data_key(key, variant);
        // Index first: a dangling index entry reads back as absent,
        // while an unindexed record would be unreachable forever.
        if index.insert(data_key.clone()) {
            self.save_index(index).await?;
        }
        self.store.set_item(&data_key, &hex_encode(data)).await
    }

    async fn list_variants(
        &self,
        key: &StorageKey,
    ) -> Result<HashSet<VariantKey>, CacheError> {
        let mut cached = self.index.lock().await;
        let index = self.load_index(&mut *cached).await?;
        let scope = self.key_scope(key);
        Ok(index
            .iter()
            .filter_map(|item| item.strip_prefix(&scope))
            .map(VariantKey::from_raw)
            .collect())
    }

    async fn read(
        &self,
        key: &StorageKey,
        variant: &VariantKey,
    ) -> Result<Option<Vec<u8>>, CacheError> {
        match self.store.get_item(&self.data_key(key, variant)).await? {
            Some(raw) => Ok(Some(hex_decode(&raw)?)),
            None => Ok(None),
        }
    }

    async fn purge(&self, key: Option<&StorageKey>) -> Result<(), CacheError> {
        let mut cached = self.index.lock().await;
        let index = self.load_index(&mut *cached).await?;
        match key {
            Some(key) => {
                let scope = self.key_scope(key);
                let doomed: Vec<String> = index
                    .iter()
                    .filter(|item| item.starts_with(&scope))
                    .cloned()
                    .collect();
                if doomed.is_empty() {
                    return Ok(());
                }
                for item in &doomed {
                    self.store.remove_item(item).await?;
                    index.remove(item);
                }
                self.save_index(index).await
            }
            None => {
                // Remove from the set only after the medium confirms,
                // so a mid-loop failure leaves the cached index still
                // listing every surviving record. A later save_index
                // then persists exactly the survivors instead of
                // disowning them.
                let doomed: Vec<String> = index.iter().cloned().collect();
                for item in &doomed {
                    self.store.remove_item(item).await?;
                    index.remove(item);
                }
                self.store.remove_item(&self.index_key()).await
            }
        }
    }
}

impl<K: KvStore> std::fmt::Debug for FlatKvBackend<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlatKvBackend")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

fn hex_encode(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02x}", b)).collect()
}

fn hex_decode(raw: &str) -> Result<Vec<u8>, CacheError> {
    fn nibble(b: u8) -> Option<u8> {
        match b {
            b'0'..=b'9' => Some(b - b'0'),
            b'a'..=b'f' => Some(b - b'a' + 10),
            b'A'..=b'F' => Some(b - b'A' + 10),
            _ => None,
        }
    }

    let bytes = raw.as_bytes();
    if bytes.len() % 2 != 0 {
        return Err(CacheError::Deserialization(
            "hex value has odd length".to_string(),
        ));
    }
    bytes
        .chunks_exact(2)
        .map(|pair| match (nibble(pair[0]), nibble(pair[1])) {
            (Some(hi), Some(lo)) => Ok(hi << 4 | lo),
            _ => Err(CacheError::Deserialization(
                "hex value has non-hex characters".to_string(),
            )),
        })
        .collect()
}
