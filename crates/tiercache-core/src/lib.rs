//! Tiercache - a size-bounded local cache over a durable object store.
//!
//! Content lives durably in a remote object store and is kept resident in a
//! local directory while there is room for it. Callers pin an entry to make
//! sure it is local and stays local while in use; unpinned entries are
//! evicted least-recently-used first when space is needed, and downloaded
//! again on the next pin.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tiercache::{CacheEntry, CacheManager, LocalDirStore};
//!
//! #[tokio::main]
//! async fn main() -> tiercache::Result<()> {
//!     let store = Arc::new(LocalDirStore::new("/mnt/bucket")?);
//!     let cache = CacheManager::open("/var/cache/segments", 1 << 30, store).await?;
//!
//!     // Content already written to /var/cache/segments/seg-0001
//!     cache.add(CacheEntry::new("seg-0001", 4096, true), true).await?;
//!
//!     cache.pin("seg-0001").await?;
//!     // ... read /var/cache/segments/seg-0001 ...
//!     cache.release("seg-0001").await?;
//!
//!     cache.free("seg-0001").await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod fs;
pub mod store;

// Re-export commonly used types
pub use cache::{
    acquire_content, relinquish_content, CacheContent, CacheEntry, CacheManager,
    CacheManagerBuilder, CacheStats, RecencyIndex, RecoveryReport,
};
pub use config::{CacheDefaults, StoreConfig, TierCacheConfig};
pub use error::{Result, TierCacheError};
pub use store::{DynObjectStore, HttpObjectStore, LocalDirStore, ObjectStore};
