//! Local filesystem helpers used by the cache manager and the object stores.
//!
//! Every helper maps IO failures to [`TierCacheError::Io`] carrying the path
//! that failed, so errors bubble up with enough context to act on.

use crate::error::{Result, TierCacheError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Check whether a file exists.
///
/// A missing file is `Ok(false)`; any other stat failure is an error.
pub async fn file_exists(path: &Path) -> Result<bool> {
    match fs::metadata(path).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(TierCacheError::Io {
            message: format!("Failed to stat {}", path.display()),
            path: Some(path.to_path_buf()),
            source: Some(e),
        }),
    }
}

/// Remove a file, returning whether it existed.
pub async fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => {
            debug!("Removed {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(TierCacheError::Io {
            message: format!("Failed to remove {}", path.display()),
            path: Some(path.to_path_buf()),
            source: Some(e),
        }),
    }
}

/// Create (or truncate) an empty file and fsync it.
pub async fn create_synced_file(path: &Path) -> Result<()> {
    let file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .await
        .map_err(|e| TierCacheError::Io {
            message: format!("Failed to create {}", path.display()),
            path: Some(path.to_path_buf()),
            source: Some(e),
        })?;

    file.sync_all().await.map_err(|e| TierCacheError::Io {
        message: format!("Failed to sync {}", path.display()),
        path: Some(path.to_path_buf()),
        source: Some(e),
    })?;

    if let Some(parent) = path.parent() {
        sync_dir(parent).await;
    }
    Ok(())
}

/// Fsync a directory so entries created or renamed in it survive a crash.
///
/// Best effort: platforms that cannot open directories for sync only log.
pub async fn sync_dir(dir: &Path) {
    #[cfg(unix)]
    {
        match fs::File::open(dir).await {
            Ok(handle) => {
                if let Err(e) = handle.sync_all().await {
                    warn!("Failed to sync directory {}: {}", dir.display(), e);
                }
            }
            Err(e) => warn!("Failed to open directory {} for sync: {}", dir.display(), e),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = dir;
    }
}

/// Path next to `path` with `suffix` appended to the file name.
pub fn temp_sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Ensure a directory exists, creating parents as needed.
pub async fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .await
        .map_err(|e| TierCacheError::Io {
            message: format!("Failed to create directory {}", dir.display()),
            path: Some(dir.to_path_buf()),
            source: Some(e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_exists_and_remove() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("seg-1");

        assert!(!file_exists(&path).await.unwrap());
        std::fs::write(&path, b"x").unwrap();
        assert!(file_exists(&path).await.unwrap());

        assert!(remove_if_exists(&path).await.unwrap());
        assert!(!remove_if_exists(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_synced_file_truncates() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("seg-1.uploading");
        std::fs::write(&path, b"stale contents").unwrap();

        create_synced_file(&path).await.unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_temp_sibling() {
        let path = Path::new("/cache/seg-1");
        assert_eq!(temp_sibling(path, ".part"), PathBuf::from("/cache/seg-1.part"));
    }

    #[tokio::test]
    async fn test_ensure_dir_nested() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("a").join("b");
        ensure_dir(&dir).await.unwrap();
        assert!(dir.is_dir());
    }
}
