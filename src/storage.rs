//! The cache engine: url-addressed find/store/purge over a pluggable
//! backend, with an in-memory variant index as the lookup fast path.

use std::collections::{BTreeMap, HashSet};
use std::marker::PhantomData;
use std::path::PathBuf;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::backend::FilesystemBackend;
use crate::index::VariantIndex;
use crate::{
    CacheBackend, CacheEntry, CacheError, EntrySerializer, JsonSerializer,
    StorageKey, VariantKey,
};

/// Durable response-variant store behind an HTTP client's caching
/// layer.
///
/// The caller decides what is cacheable; this engine only persists,
/// finds, enumerates and purges entries. All public operations are
/// fail-open: backend failures are logged and surface as cache misses
/// or no-ops, never as errors, because a broken cache must cost no
/// more than a cold one.
///
/// One `tokio` mutex serializes every operation end-to-end, so the
/// index and the backend never observe a half-completed sibling call.
/// The lock is per engine instance; pointing two engines in separate
/// processes at the same writable medium is not supported.
pub struct CacheStorage<B, S = JsonSerializer>
where
    B: CacheBackend,
    S: EntrySerializer,
{
    backend: B,
    index: Mutex<VariantIndex>,
    _marker: PhantomData<S>,
}

impl<B: CacheBackend> CacheStorage<B> {
    /// Engine over `backend` with the default JSON codec.
    pub fn new(backend: B) -> Self {
        Self::with_serializer(backend)
    }
}

impl CacheStorage<FilesystemBackend> {
    /// File-backed engine rooted at `root`, or at a directory under
    /// the system temp dir when `root` is `None`.
    pub async fn file_backed(root: Option<PathBuf>) -> Result<Self, CacheError> {
        let backend = match root {
            Some(root) => FilesystemBackend::new(root).await?,
            None => FilesystemBackend::in_temp_dir().await?,
        };
        Ok(Self::new(backend))
    }
}

impl<B, S> CacheStorage<B, S>
where
    B: CacheBackend,
    S: EntrySerializer,
{
    pub fn with_serializer(backend: B) -> Self {
        Self {
            backend,
            index: Mutex::new(VariantIndex::default()),
            _marker: PhantomData,
        }
    }

    /// Look up the variant of `url` addressed by exactly these vary
    /// keys. Absence and backend failure both come back as `None`.
    pub async fn find(
        &self,
        url: &str,
        vary_keys: &BTreeMap<String, String>,
    ) -> Option<CacheEntry> {
        match self.try_find(url, vary_keys).await {
            Ok(found) => found,
            Err(e) => {
                warn!(url, error = %e, "cache lookup failed, treating as miss");
                None
            }
        }
    }

    /// Every variant stored for `url`. Corrupt records are skipped;
    /// backend failure yields an empty list.
    pub async fn find_all(&self, url: &str) -> Vec<CacheEntry> {
        match self.try_find_all(url).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(url, error = %e, "cache enumeration failed, treating as empty");
                Vec::new()
            }
        }
    }

    /// Persist `entry` as the variant of `url` addressed by its vary
    /// keys, replacing any previous entry with the same identity.
    /// Failures are logged and swallowed.
    pub async fn store(&self, url: &str, entry: CacheEntry) {
        if let Err(e) = self.try_store(url, entry).await {
            warn!(url, error = %e, "cache store failed, response not cached");
        }
    }

    /// Remove every variant of `url`, or the entire cache when `url`
    /// is `None`. Idempotent; failures are logged and swallowed.
    pub async fn purge(&self, url: Option<&str>) {
        if let Err(e) = self.try_purge(url).await {
            warn!(url, error = %e, "cache purge failed");
        }
    }

    async fn try_find(
        &self,
        url: &str,
        vary_keys: &BTreeMap<String, String>,
    ) -> Result<Option<CacheEntry>, CacheError> {
        let storage_key = StorageKey::derive(url);
        let variant_key = VariantKey::derive(vary_keys);

        let _guard = self.index.lock().await;
        let Some(bytes) = self.backend.read(&storage_key, &variant_key).await?
        else {
            return Ok(None);
        };
        match S::deserialize_entry(&bytes) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!(url, error = %e, "corrupt cache record, treating as miss");
                Ok(None)
            }
        }
    }

    async fn try_find_all(
        &self,
        url: &str,
    ) -> Result<Vec<CacheEntry>, CacheError> {
        let storage_key = StorageKey::derive(url);

        let mut index = self.index.lock().await;
        // Fast path: nothing persisted means nothing to enumerate and
        // nothing worth loading into the index.
        if !self.backend.exists(&storage_key, None).await? {
            return Ok(Vec::new());
        }
        let variants = self.ensure_loaded(&mut *index, &storage_key).await?;

        let mut entries = Vec::with_capacity(variants.len());
        for variant in &variants {
            let Some(bytes) = self.backend.read(&storage_key, variant).await?
            else {
                continue;
            };
            match S::deserialize_entry(&bytes) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!(url, variant = %variant, error = %e, "skipping corrupt cache record");
                }
            }
        }
        Ok(entries)
    }

    async fn try_store(
        &self,
        url: &str,
        entry: CacheEntry,
    ) -> Result<(), CacheError> {
        let storage_key = StorageKey::derive(url);
        let variant_key = VariantKey::derive(&entry.vary_keys);

        let mut index = self.index.lock().await;
        // Load siblings written by earlier sessions before mutating,
        // so the index keeps tracking them.
        self.ensure_loaded(&mut *index, &storage_key).await?;

        let bytes = S::serialize_entry(&entry)?;
        self.backend.write(&storage_key, &variant_key, &bytes).await?;
        index.insert_variant(storage_key, variant_key);
        debug!(url, "cached response variant");
        Ok(())
    }

    async fn try_purge(&self, url: Option<&str>) -> Result<(), CacheError> {
        let mut index = self.index.lock().await;
        match url {
            Some(url) => {
                let storage_key = StorageKey::derive(url);
                self.backend.purge(Some(&storage_key)).await?;
                index.remove(&storage_key);
                debug!(url, "purged cached variants");
            }
            None => {
                self.backend.purge(None).await?;
                index.clear();
                debug!("purged entire cache");
            }
        }
        Ok(())
    }

    /// Variant set for `key`, from the index if already loaded this
    /// session, otherwise enumerated from the backend and cached.
    async fn ensure_loaded(
        &self,
        index: &mut VariantIndex,
        key: &StorageKey,
    ) -> Result<HashSet<VariantKey>, CacheError> {
        if let Some(variants) = index.get(key) {
            return Ok(variants.clone());
        }
        let variants = self.backend.list_variants(key).await?;
        index.replace(key.clone(), variants.clone());
        Ok(variants)
    }
}
