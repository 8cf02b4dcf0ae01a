//! Centralized configuration for the tiered cache.
//!
//! Holds the on-disk naming constants shared by the manager and the object
//! store implementations, plus the JSON configuration file read by the CLI.

use crate::error::{Result, TierCacheError};
use crate::store::{DynObjectStore, HttpObjectStore, LocalDirStore};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Cache-wide defaults and file naming.
pub struct CacheDefaults;

impl CacheDefaults {
    /// Suffix of the marker file present while an upload is in flight.
    pub const UPLOADING_SUFFIX: &'static str = ".uploading";
    /// Suffix of the temp file an object is downloaded into before rename.
    pub const DOWNLOAD_TEMP_SUFFIX: &'static str = ".part";
    pub const DEFAULT_MAX_SIZE_BYTES: u64 = 4_294_967_296; // 4GB
    /// Read size for streamed uploads.
    pub const UPLOAD_CHUNK_SIZE: usize = 256 * 1024;
    pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
    pub const USER_AGENT: &'static str = "tiercache/0.1";
}

/// Where the durable copy of cached objects lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    /// A local or mounted directory acting as the bucket.
    LocalDir { root: PathBuf },
    /// An HTTP endpoint serving `GET`/`PUT`/`DELETE` on `<base_url>/<name>`.
    Http {
        base_url: String,
        #[serde(default)]
        timeout_secs: Option<u64>,
    },
}

impl StoreConfig {
    /// Build the object store client described by this config.
    pub fn build(&self) -> Result<DynObjectStore> {
        match self {
            StoreConfig::LocalDir { root } => Ok(Arc::new(LocalDirStore::new(root)?)),
            StoreConfig::Http {
                base_url,
                timeout_secs,
            } => {
                let timeout = timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(CacheDefaults::HTTP_REQUEST_TIMEOUT);
                Ok(Arc::new(HttpObjectStore::with_timeout(base_url, timeout)?))
            }
        }
    }
}

/// Configuration file for a cache manager instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TierCacheConfig {
    /// Directory holding `<id>` content files and `<id>.uploading` sentinels.
    pub cache_dir: PathBuf,
    /// Local capacity budget in bytes.
    #[serde(default = "default_max_size")]
    pub max_size_bytes: u64,
    pub store: StoreConfig,
}

fn default_max_size() -> u64 {
    CacheDefaults::DEFAULT_MAX_SIZE_BYTES
}

impl TierCacheConfig {
    /// Read and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| TierCacheError::Io {
            message: format!("Failed to read config {}", path.display()),
            path: Some(path.to_path_buf()),
            source: Some(e),
        })?;

        let config: TierCacheConfig =
            serde_json::from_str(&contents).map_err(|e| TierCacheError::Json {
                message: format!("Failed to parse {}: {}", path.display(), e),
                source: Some(e),
            })?;

        config.validate()?;
        debug!("Loaded cache config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_size_bytes == 0 {
            return Err(TierCacheError::Config {
                message: "max_size_bytes must be greater than zero".to_string(),
            });
        }
        if let StoreConfig::Http { base_url, .. } = &self.store {
            url::Url::parse(base_url).map_err(|e| TierCacheError::Config {
                message: format!("Invalid store base_url {}: {}", base_url, e),
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_local_dir_config() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tiercache.json");
        fs::write(
            &path,
            r#"{
                "cache_dir": "/var/cache/segments",
                "max_size_bytes": 1024,
                "store": { "kind": "local_dir", "root": "/mnt/bucket" }
            }"#,
        )
        .unwrap();

        let config = TierCacheConfig::load(&path).unwrap();
        assert_eq!(config.max_size_bytes, 1024);
        assert_eq!(
            config.store,
            StoreConfig::LocalDir {
                root: PathBuf::from("/mnt/bucket")
            }
        );
    }

    #[test]
    fn test_default_capacity_and_http_store() {
        let config: TierCacheConfig = serde_json::from_str(
            r#"{
                "cache_dir": "/tmp/c",
                "store": { "kind": "http", "base_url": "http://127.0.0.1:9000/bucket" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.max_size_bytes, CacheDefaults::DEFAULT_MAX_SIZE_BYTES);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero = TierCacheConfig {
            cache_dir: PathBuf::from("/tmp/c"),
            max_size_bytes: 0,
            store: StoreConfig::LocalDir {
                root: PathBuf::from("/tmp/b"),
            },
        };
        assert!(matches!(zero.validate(), Err(TierCacheError::Config { .. })));

        let bad_url = TierCacheConfig {
            cache_dir: PathBuf::from("/tmp/c"),
            max_size_bytes: 10,
            store: StoreConfig::Http {
                base_url: "not a url".to_string(),
                timeout_secs: None,
            },
        };
        assert!(matches!(bad_url.validate(), Err(TierCacheError::Config { .. })));
    }

    #[test]
    fn test_load_missing_file() {
        let tmp = TempDir::new().unwrap();
        let result = TierCacheConfig::load(&tmp.path().join("missing.json"));
        assert!(matches!(result, Err(TierCacheError::Io { .. })));
    }
}
