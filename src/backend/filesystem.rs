//! Hierarchical filesystem backend: one directory per storage key, one
//! file per variant inside it.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::{CacheBackend, CacheError, StorageKey, VariantKey};

/// Directory name used by [`FilesystemBackend::in_temp_dir`].
pub const DEFAULT_CACHE_DIR: &str = "http-cache-store";

#[derive(Debug, Clone)]
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    /// Open a backend rooted at `root`, creating the directory if
    /// needed.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        debug!(root = %root.display(), "opened filesystem cache backend");
        Ok(Self { root })
    }

    /// Open a backend under the system temp directory, the default
    /// location when the caller does not care where the cache lives.
    pub async fn in_temp_dir() -> Result<Self, CacheError> {
        Self::new(std::env::temp_dir().join(DEFAULT_CACHE_DIR)).await
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    fn key_dir(&self, key: &StorageKey) -> PathBuf {
        self.root.join(key.as_str())
    }

    fn variant_path(&self, key: &StorageKey, variant: &VariantKey) -> PathBuf {
        self.key_dir(key).join(variant.as_str())
    }
}

#[async_trait]
impl CacheBackend for FilesystemBackend {
    async fn exists(
        &self,
        key: &StorageKey,
        variant: Option<&VariantKey>,
    ) -> Result<bool, CacheError> {
        let path = match variant {
            Some(variant) => self.variant_path(key, variant),
            None => self.key_dir(key),
        };
        Ok(fs::try_exists(&path).await?)
    }

    async fn write(
        &self,
        key: &StorageKey,
        variant: &VariantKey,
        data: &[u8],
    ) -> Result<(), CacheError> {
        fs::create_dir_all(self.key_dir(key)).await?;
        fs::write(self.variant_path(key, variant), data).await?;
        Ok(())
    }

    async fn list_variants(
        &self,
        key: &StorageKey,
    ) -> Result<HashSet<VariantKey>, CacheError> {
        let mut variants = HashSet::new();
        let mut dir = match fs::read_dir(self.key_dir(key)).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(variants),
            Err(e) => return Err(e.into()),
        };
        while let Some(item) = dir.next_entry().await? {
            if let Some(name) = item.file_name().to_str() {
                variants.insert(VariantKey::from_raw(name));
            }
        }
        Ok(variants)
    }

    async fn read(
        &self,
        key: &StorageKey,
        variant: &VariantKey,
    ) -> Result<Option<Vec<u8>>, CacheError> {
        match fs::read(self.variant_path(key, variant)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn purge(&self, key: Option<&StorageKey>) -> Result<(), CacheError> {
        match key {
            Some(key) => match fs::remove_dir_all(self.key_dir(key)).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            },
            None => {
                // Drop the root's children but keep the root itself.
                let mut dir = match fs::read_dir(&self.root).await {
                    Ok(dir) => dir,
                    Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
                    Err(e) => return Err(e.into()),
                };
                while let Some(item) = dir.next_entry().await? {
                    let path = item.path();
                    let removed = if item.file_type().await?.is_dir() {
                        fs::remove_dir_all(&path).await
                    } else {
                        fs::remove_file(&path).await
                    };
                    match removed {
                        Ok(()) => {}
                        Err(e) if e.kind() == ErrorKind::NotFound => {}
                        Err(e) => return Err(e.into()),
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    async fn backend() -> (tempfile::TempDir, FilesystemBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path().join("cache"))
            .await
            .unwrap();
        (dir, backend)
    }

    fn keys(url: &str) -> (StorageKey, VariantKey) {
        (StorageKey::derive(url), VariantKey::derive(&BTreeMap::new()))
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let (_dir, backend) = backend().await;
        let (key, variant) = keys("https://example.com/");

        backend.write(&key, &variant, b"payload").await.unwrap();
        let read = backend.read(&key, &variant).await.unwrap();
        assert_eq!(read.as_deref(), Some(&b"payload"[..]));
    }

    #[tokio::test]
    async fn read_of_absent_variant_is_none() {
        let (_dir, backend) = backend().await;
        let (key, variant) = keys("https://example.com/");
        assert_eq!(backend.read(&key, &variant).await.unwrap(), None);
    }

    #[tokio::test]
    async fn write_overwrites_in_place() {
        let (_dir, backend) = backend().await;
        let (key, variant) = keys("https://example.com/");

        backend.write(&key, &variant, b"old").await.unwrap();
        backend.write(&key, &variant, b"new").await.unwrap();
        assert_eq!(
            backend.read(&key, &variant).await.unwrap().as_deref(),
            Some(&b"new"[..])
        );
        assert_eq!(backend.list_variants(&key).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_variants_of_unknown_key_is_empty() {
        let (_dir, backend) = backend().await;
        let (key, _) = keys("https://example.com/");
        assert!(backend.list_variants(&key).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn exists_with_and_without_variant() {
        let (_dir, backend) = backend().await;
        let (key, variant) = keys("https://example.com/");

        assert!(!backend.exists(&key, None).await.unwrap());
        backend.write(&key, &variant, b"x").await.unwrap();
        assert!(backend.exists(&key, None).await.unwrap());
        assert!(backend.exists(&key, Some(&variant)).await.unwrap());

        let other = VariantKey::from_raw("deadbeef");
        assert!(!backend.exists(&key, Some(&other)).await.unwrap());
    }

    #[tokio::test]
    async fn purge_is_idempotent() {
        let (_dir, backend) = backend().await;
        let (key, variant) = keys("https://example.com/");

        backend.write(&key, &variant, b"x").await.unwrap();
        backend.purge(Some(&key)).await.unwrap();
        backend.purge(Some(&key)).await.unwrap();
        assert!(!backend.exists(&key, None).await.unwrap());

        backend.purge(None).await.unwrap();
        backend.purge(None).await.unwrap();
    }

    #[tokio::test]
    async fn full_purge_keeps_the_root() {
        let (_dir, backend) = backend().await;
        let (key, variant) = keys("https://example.com/");

        backend.write(&key, &variant, b"x").await.unwrap();
        backend.purge(None).await.unwrap();

        assert!(!backend.exists(&key, None).await.unwrap());
        assert!(backend.root().exists());
        // Still writable after a full purge.
        backend.write(&key, &variant, b"y").await.unwrap();
        assert!(backend.exists(&key, Some(&variant)).await.unwrap());
    }
}
