//! Directory-backed object store.
//!
//! Objects are plain files under a root directory. Transfers go through a
//! temp file that is fsynced and then atomically renamed, so readers never
//! observe a half-written object.

use super::traits::ObjectStore;
use crate::config::CacheDefaults;
use crate::error::{Result, TierCacheError};
use crate::fs::{ensure_dir, remove_if_exists, sync_dir, temp_sibling};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tracing::{debug, warn};

/// Object store rooted at a local (or mounted) directory.
#[derive(Debug)]
pub struct LocalDirStore {
    root: PathBuf,
    /// Distinguishes concurrent uploads of the same object.
    upload_seq: AtomicU64,
}

impl LocalDirStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| TierCacheError::Io {
            message: format!("Failed to create store root {}", root.display()),
            path: Some(root.clone()),
            source: Some(e),
        })?;
        Ok(Self {
            root,
            upload_seq: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of object `name` inside the store.
    pub fn object_path(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name);
        let valid = !name.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !valid {
            return Err(TierCacheError::InvalidId {
                id: name.to_string(),
                reason: "object name must be a relative path without '..'".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }

    /// Whether object `name` currently exists in the store.
    pub async fn contains(&self, name: &str) -> Result<bool> {
        crate::fs::file_exists(&self.object_path(name)?).await
    }

    /// Copy `src` to `dest` through `temp`, fsync, then rename.
    async fn copy_atomic(src: &Path, temp: &Path, dest: &Path) -> Result<u64> {
        let result = async {
            let bytes = fs::copy(src, temp).await?;
            let file = fs::OpenOptions::new().write(true).open(temp).await?;
            file.sync_all().await?;
            fs::rename(temp, dest).await?;
            Ok::<u64, std::io::Error>(bytes)
        }
        .await;

        match result {
            Ok(bytes) => {
                if let Some(parent) = dest.parent() {
                    sync_dir(parent).await;
                }
                Ok(bytes)
            }
            Err(e) => {
                if let Err(cleanup) = remove_if_exists(temp).await {
                    warn!("Failed to clean up {}: {}", temp.display(), cleanup);
                }
                Err(TierCacheError::Io {
                    message: format!(
                        "Failed to copy {} to {}: {}",
                        src.display(),
                        dest.display(),
                        e
                    ),
                    path: Some(dest.to_path_buf()),
                    source: Some(e),
                })
            }
        }
    }
}

#[async_trait]
impl ObjectStore for LocalDirStore {
    async fn get(&self, name: &str, dest: &Path) -> Result<()> {
        let object = self.object_path(name)?;
        if !crate::fs::file_exists(&object).await? {
            return Err(TierCacheError::ObjectNotFound {
                object: name.to_string(),
            });
        }

        let temp = temp_sibling(dest, CacheDefaults::DOWNLOAD_TEMP_SUFFIX);
        let bytes = Self::copy_atomic(&object, &temp, dest).await?;
        debug!("Fetched {} ({} bytes) to {}", name, bytes, dest.display());
        Ok(())
    }

    async fn put(&self, name: &str, src: &Path) -> Result<()> {
        let object = self.object_path(name)?;
        if let Some(parent) = object.parent() {
            ensure_dir(parent).await?;
        }

        let seq = self.upload_seq.fetch_add(1, Ordering::Relaxed);
        let temp = temp_sibling(&object, &format!(".{}.{}.tmp", process::id(), seq));
        let bytes = Self::copy_atomic(src, &temp, &object).await?;
        debug!("Stored {} ({} bytes) from {}", name, bytes, src.display());
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        let object = self.object_path(name)?;
        match fs::remove_file(&object).await {
            Ok(()) => {
                debug!("Deleted object {}", name);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Object {} already absent", name);
                Ok(())
            }
            Err(e) => Err(TierCacheError::io_with_path(e, object)),
        }
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        self.contains(name).await
    }

    fn describe(&self) -> String {
        format!("dir:{}", self.root.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_get_remove() {
        let bucket = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let store = LocalDirStore::new(bucket.path()).unwrap();

        let src = work.path().join("seg-1");
        std::fs::write(&src, b"payload").unwrap();
        store.put("seg-1", &src).await.unwrap();
        assert!(store.contains("seg-1").await.unwrap());
        assert!(store.exists("seg-1").await.unwrap());

        let dest = work.path().join("seg-1.copy");
        store.get("seg-1", &dest).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
        assert!(!temp_sibling(&dest, CacheDefaults::DOWNLOAD_TEMP_SUFFIX).exists());

        store.remove("seg-1").await.unwrap();
        assert!(!store.exists("seg-1").await.unwrap());
        // Removing again is not an error
        store.remove("seg-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_get_missing_object_leaves_no_file() {
        let bucket = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let store = LocalDirStore::new(bucket.path()).unwrap();

        let dest = work.path().join("missing");
        let err = store.get("missing", &dest).await.unwrap_err();
        assert!(matches!(err, TierCacheError::ObjectNotFound { .. }));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_put_missing_source_fails_without_object() {
        let bucket = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let store = LocalDirStore::new(bucket.path()).unwrap();

        let err = store
            .put("seg-9", &work.path().join("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, TierCacheError::Io { .. }));
        assert!(!store.contains("seg-9").await.unwrap());
        assert_eq!(std::fs::read_dir(bucket.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_object_path_rejects_traversal() {
        let bucket = TempDir::new().unwrap();
        let store = LocalDirStore::new(bucket.path()).unwrap();
        assert!(store.object_path("../escape").is_err());
        assert!(store.object_path("/abs").is_err());
        assert!(store.object_path("").is_err());
        assert!(store.object_path("nested/seg-1").is_ok());
    }
}
