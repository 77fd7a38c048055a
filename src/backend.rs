//! Physical persistence behind the cache engine.
//!
//! A backend is a dumb key/value medium addressed by
//! (storage key, variant key). It knows nothing about urls, vary
//! headers or the serialization format; the engine owns all of that.
//! Any implementation honoring these semantics can be plugged in.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::{CacheError, StorageKey, VariantKey};

pub mod filesystem;
pub mod keyvalue;
pub mod memory;

pub use filesystem::FilesystemBackend;
pub use keyvalue::{FlatKvBackend, KvStore, MemoryKvStore};
pub use memory::InMemoryBackend;

#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// With a variant key: does that exact record exist. Without one:
    /// does any variant exist under the storage key.
    async fn exists(
        &self,
        key: &StorageKey,
        variant: Option<&VariantKey>,
    ) -> Result<bool, CacheError>;

    /// Full overwrite. Creates parent structure as needed.
    async fn write(
        &self,
        key: &StorageKey,
        variant: &VariantKey,
        data: &[u8],
    ) -> Result<(), CacheError>;

    /// Every variant currently persisted under the storage key. Total:
    /// an unknown key yields an empty set, never an error.
    async fn list_variants(
        &self,
        key: &StorageKey,
    ) -> Result<HashSet<VariantKey>, CacheError>;

    async fn read(
        &self,
        key: &StorageKey,
        variant: &VariantKey,
    ) -> Result<Option<Vec<u8>>, CacheError>;

    /// With a key: drop all its variants. Without: drop everything
    /// under the cache root. Idempotent; purging an absent target is a
    /// no-op.
    async fn purge(&self, key: Option<&StorageKey>) -> Result<(), CacheError>;
}
