//! Durable, url-addressed storage for HTTP response caching.
//!
//! This crate is the persistence half of a response cache: a client
//! layer decides *whether* a response is cacheable, and hands accepted
//! entries to a [`CacheStorage`] engine that decides how they are
//! persisted, found, enumerated and purged. Entries are addressed by
//! a stable SHA-256 key derived from the url, with one record per
//! negotiated variant (vary keys) under each url.
//!
//! Persistence is pluggable through the [`CacheBackend`] trait:
//! - [`FilesystemBackend`]: a directory per url key, a file per
//!   variant;
//! - [`FlatKvBackend`]: composite keys over any flat string
//!   key/value medium (see [`KvStore`]), with a persisted index for
//!   enumeration;
//! - [`InMemoryBackend`]: non-durable, for tests.
//!
//! The engine is fail-open by design: storage failures are logged and
//! degrade to cache misses, so the cache can never be worse than not
//! having one. Concurrent use from many tasks against one engine
//! instance is supported; concurrent writers in separate processes
//! against the same medium are not.

pub mod backend;
pub mod entry;
pub mod error;
mod index;
pub mod keys;
pub mod serializers;
pub mod storage;

pub use crate::backend::{
    CacheBackend, FilesystemBackend, FlatKvBackend, InMemoryBackend, KvStore,
    MemoryKvStore,
};
pub use crate::entry::CacheEntry;
pub use crate::error::CacheError;
pub use crate::keys::{StorageKey, VariantKey};
pub use crate::serializers::{EntrySerializer, JsonSerializer};
pub use crate::storage::CacheStorage;
