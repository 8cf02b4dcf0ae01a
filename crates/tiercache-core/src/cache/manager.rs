//! Cache manager: residency, pinning and tiering over an object store.
//!
//! The manager owns the recency index and the local byte budget behind a
//! single async mutex. Every state transition (admission bookkeeping,
//! eviction, pin, release, free) runs with that lock held, including the
//! remote transfers issued by `pin` and `free`. The only transfer made
//! without the lock is the admission upload in [`CacheManager::add`], which
//! runs against a reserved id that no other operation can touch.
//!
//! # On-disk layout
//!
//! ```text
//! <cache_dir>/<id>              content file, present while the entry is local
//! <cache_dir>/<id>.uploading    sentinel, present while an upload is in flight
//! ```
//!
//! A sentinel left behind by a crash is found by [`CacheManagerBuilder::open`]
//! and the upload is replayed before the manager is handed out.

use super::entry::CacheEntry;
use super::recency::RecencyIndex;
use crate::config::{CacheDefaults, TierCacheConfig};
use crate::error::{Result, TierCacheError};
use crate::fs::{create_synced_file, ensure_dir, file_exists, remove_if_exists};
use crate::store::DynObjectStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{MutexGuard, PoisonError};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Check that `id` can serve as both a local file name and an object name.
pub fn validate_id(id: &str) -> Result<()> {
    let reason = if id.is_empty() {
        Some("id is empty")
    } else if id == "." || id == ".." {
        Some("id is a relative path component")
    } else if id.contains(['/', '\\', '\0']) {
        Some("id contains a path separator or NUL")
    } else if id.ends_with(CacheDefaults::UPLOADING_SUFFIX) {
        Some("id ends with the upload sentinel suffix")
    } else if id.ends_with(CacheDefaults::DOWNLOAD_TEMP_SUFFIX) {
        Some("id ends with the download temp suffix")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(TierCacheError::InvalidId {
            id: id.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// Snapshot of cache occupancy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Entries in the index, local or remote-only.
    pub entries: usize,
    /// Entries with a local copy.
    pub local_entries: usize,
    /// Entries with at least one active pin.
    pub pinned_entries: usize,
    /// Bytes charged against the local budget.
    pub local_size: u64,
    pub max_size: u64,
    /// Admissions whose upload is still running.
    pub pending_admissions: usize,
}

/// Outcome of the startup scan for interrupted uploads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryReport {
    /// Ids whose upload was replayed.
    pub recovered: Vec<String>,
    /// Ids whose sentinel was dropped because the content file is gone.
    pub discarded: Vec<String>,
}

/// State guarded by the manager lock.
#[derive(Debug, Default)]
struct CacheState {
    index: RecencyIndex<CacheEntry>,
    /// Sum of sizes of entries with a local copy.
    local_size: u64,
}

/// Ids held by admission uploads that have not finished yet.
///
/// Kept under a plain mutex so a [`Reservation`] can release its id from
/// `Drop`, including when the `add` future is dropped mid-upload. Inserts
/// happen only while the manager lock is held.
#[derive(Debug, Default)]
struct Reservations {
    ids: std::sync::Mutex<HashSet<String>>,
}

impl Reservations {
    fn ids(&self) -> MutexGuard<'_, HashSet<String>> {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn contains(&self, id: &str) -> bool {
        self.ids().contains(id)
    }

    fn len(&self) -> usize {
        self.ids().len()
    }

    fn reserve(&self, id: &str) -> Reservation<'_> {
        self.ids().insert(id.to_string());
        Reservation {
            owner: self,
            id: id.to_string(),
        }
    }
}

/// Reservation of one id, released on drop.
struct Reservation<'a> {
    owner: &'a Reservations,
    id: String,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.owner.ids().remove(&self.id);
    }
}

impl CacheState {
    fn entry_mut(&mut self, id: &str) -> &mut CacheEntry {
        match self.index.peek_mut(id) {
            Some(entry) => entry,
            None => panic!("cache index lost entry {} while the lock was held", id),
        }
    }
}

/// Builder for [`CacheManager`].
pub struct CacheManagerBuilder {
    cache_dir: PathBuf,
    max_size: u64,
    store: Option<DynObjectStore>,
}

impl CacheManagerBuilder {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            max_size: CacheDefaults::DEFAULT_MAX_SIZE_BYTES,
            store: None,
        }
    }

    /// Local capacity budget in bytes.
    pub fn max_size(mut self, bytes: u64) -> Self {
        self.max_size = bytes;
        self
    }

    pub fn store(mut self, store: DynObjectStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Create the cache directory if needed, replay interrupted uploads and
    /// return a ready manager.
    pub async fn open(self) -> Result<CacheManager> {
        let store = self.store.ok_or_else(|| TierCacheError::Config {
            message: "an object store is required".to_string(),
        })?;
        if self.max_size == 0 {
            return Err(TierCacheError::Config {
                message: "cache capacity must be greater than zero".to_string(),
            });
        }

        ensure_dir(&self.cache_dir).await?;

        let mut manager = CacheManager {
            cache_dir: self.cache_dir,
            max_size: self.max_size,
            store,
            state: Mutex::new(CacheState::default()),
            reserved: Reservations::default(),
            recovery: RecoveryReport::default(),
        };
        manager.recovery = manager.recover_uploads().await?;

        info!(
            "Opened cache at {} ({} bytes, store {}, {} uploads recovered)",
            manager.cache_dir.display(),
            manager.max_size,
            manager.store.describe(),
            manager.recovery.recovered.len()
        );
        Ok(manager)
    }
}

/// Size-bounded local cache whose durable copies live in an object store.
pub struct CacheManager {
    cache_dir: PathBuf,
    max_size: u64,
    store: DynObjectStore,
    state: Mutex<CacheState>,
    reserved: Reservations,
    recovery: RecoveryReport,
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("cache_dir", &self.cache_dir)
            .field("max_size", &self.max_size)
            .field("store", &self.store.describe())
            .finish_non_exhaustive()
    }
}

impl CacheManager {
    pub fn builder(cache_dir: impl Into<PathBuf>) -> CacheManagerBuilder {
        CacheManagerBuilder::new(cache_dir)
    }

    /// Open a manager over `cache_dir` with `max_size` bytes of local capacity.
    pub async fn open(
        cache_dir: impl Into<PathBuf>,
        max_size: u64,
        store: DynObjectStore,
    ) -> Result<Self> {
        CacheManagerBuilder::new(cache_dir)
            .max_size(max_size)
            .store(store)
            .open()
            .await
    }

    /// Open a manager described by a config file.
    pub async fn from_config(config: &TierCacheConfig) -> Result<Self> {
        config.validate()?;
        let store = config.store.build()?;
        Self::open(config.cache_dir.clone(), config.max_size_bytes, store).await
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Uploads replayed while opening.
    pub fn recovery_report(&self) -> &RecoveryReport {
        &self.recovery
    }

    /// Local content path for `id`.
    pub fn local_path(&self, id: &str) -> PathBuf {
        self.cache_dir.join(id)
    }

    fn sentinel_path(&self, id: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}{}", id, CacheDefaults::UPLOADING_SUFFIX))
    }

    /// Scan the cache directory for sentinels and replay their uploads.
    async fn recover_uploads(&self) -> Result<RecoveryReport> {
        let mut pending = Vec::new();
        let mut dir = fs::read_dir(&self.cache_dir).await.map_err(|e| TierCacheError::Io {
            message: "Failed to scan cache directory for interrupted uploads".to_string(),
            path: Some(self.cache_dir.clone()),
            source: Some(e),
        })?;

        while let Some(dir_entry) = dir
            .next_entry()
            .await
            .map_err(|e| TierCacheError::io_with_path(e, &self.cache_dir))?
        {
            let file_name = dir_entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if let Some(id) = name.strip_suffix(CacheDefaults::UPLOADING_SUFFIX) {
                pending.push(id.to_string());
            }
        }
        pending.sort();

        let mut report = RecoveryReport::default();
        for id in pending {
            if let Err(e) = validate_id(&id) {
                warn!("Discarding upload sentinel for unusable id {:?}: {}", id, e);
                remove_if_exists(&self.sentinel_path(&id)).await?;
                report.discarded.push(id);
                continue;
            }
            if !file_exists(&self.local_path(&id)).await? {
                warn!(
                    "Discarding upload sentinel for {}: content file is gone",
                    id
                );
                remove_if_exists(&self.sentinel_path(&id)).await?;
                report.discarded.push(id);
                continue;
            }

            info!("Recovering interrupted upload: {}", id);
            self.upload_object(&id).await?;
            report.recovered.push(id);
        }

        Ok(report)
    }

    /// Upload the local file for `id`, bracketed by its sentinel.
    ///
    /// The sentinel is created (fsynced) before the transfer and removed only
    /// after it succeeds, so a crash or failure in between leaves it for the
    /// next recovery pass.
    async fn upload_object(&self, id: &str) -> Result<()> {
        let sentinel = self.sentinel_path(id);
        remove_if_exists(&sentinel).await?;
        create_synced_file(&sentinel).await?;

        debug!("Uploading {} to {}", id, self.store.describe());
        self.store.put(id, &self.local_path(id)).await?;

        if let Err(e) = remove_if_exists(&sentinel).await {
            // Harmless: recovery would upload the same content again
            warn!("Upload of {} finished but its sentinel remains: {}", id, e);
        }
        Ok(())
    }

    /// Evict least recently used unpinned local entries until `extra` more
    /// bytes fit in the budget.
    ///
    /// Evicted entries stay indexed and remote-resident.
    async fn ensure_capacity(&self, state: &mut CacheState, extra: u64) -> Result<()> {
        if extra > self.max_size {
            return Err(TierCacheError::CapacityExceeded {
                requested: extra,
                max_size: self.max_size,
            });
        }

        debug!(
            "Ensuring capacity: current {}, extra {}, max {}",
            state.local_size, extra, self.max_size
        );
        while state.local_size + extra > self.max_size {
            let victim = state
                .index
                .oldest_matching(CacheEntry::is_evictable)
                .map(|(id, entry)| (id.to_string(), entry.size()));
            let Some((victim_id, victim_size)) = victim else {
                return Err(TierCacheError::CacheFull {
                    needed: extra,
                    local_size: state.local_size,
                    max_size: self.max_size,
                });
            };

            let removed = remove_if_exists(&self.local_path(&victim_id)).await?;
            if !removed {
                debug!("Local file for {} already missing", victim_id);
            }

            let entry = state.entry_mut(&victim_id);
            assert!(
                entry.is_local() && !entry.is_pinned(),
                "cache index corrupted: eviction candidate {} is not an unpinned local entry",
                victim_id
            );
            entry.set_local(false);
            state.local_size -= victim_size;
            debug!("Evicted {} ({} bytes)", victim_id, victim_size);
        }
        Ok(())
    }

    /// Admit `entry`.
    ///
    /// With `upload`, the content at [`local_path`](Self::local_path) is first
    /// uploaded to the object store; the id is reserved for the duration so
    /// a duplicate admission or a concurrent `free`/`pin` cannot interleave.
    /// A local entry is then charged against the budget, evicting others as
    /// needed. If admission fails after a successful upload, an object this
    /// call created is removed from the store again; one that was already
    /// stored is left alone. Dropping the returned future releases the
    /// reservation.
    pub async fn add(&self, entry: CacheEntry, upload: bool) -> Result<()> {
        let id = entry.id().to_string();
        validate_id(&id)?;
        debug!(
            "Adding cache entry {} (size {}, local {}, upload {})",
            id,
            entry.size(),
            entry.is_local(),
            upload
        );

        if entry.is_local() && entry.size() > self.max_size {
            return Err(TierCacheError::CapacityExceeded {
                requested: entry.size(),
                max_size: self.max_size,
            });
        }

        if !upload {
            let mut state = self.state.lock().await;
            self.check_absent(&state, &id)?;
            return self.admit(&mut state, entry).await;
        }

        let reservation = {
            let state = self.state.lock().await;
            self.check_absent(&state, &id)?;
            self.reserved.reserve(&id)
        };

        // Only an object this call created is rolled back on failure
        let uploaded = async {
            let existed = self.store.exists(&id).await?;
            self.upload_object(&id).await?;
            Ok::<bool, TierCacheError>(!existed)
        }
        .await;

        let mut state = self.state.lock().await;
        drop(reservation);
        let created = uploaded?;

        let admitted = self.admit(&mut state, entry).await;
        if admitted.is_err() {
            if created {
                if let Err(e) = self.store.remove(&id).await {
                    warn!("Failed to roll back upload of {}: {}", id, e);
                }
            } else {
                debug!("Admission of {} failed; keeping existing remote object", id);
            }
        }
        admitted
    }

    fn check_not_reserved(&self, id: &str) -> Result<()> {
        if self.reserved.contains(id) {
            return Err(TierCacheError::AdmissionInProgress { id: id.to_string() });
        }
        Ok(())
    }

    fn check_absent(&self, state: &CacheState, id: &str) -> Result<()> {
        self.check_not_reserved(id)?;
        if state.index.contains(id) {
            return Err(TierCacheError::AlreadyExists { id: id.to_string() });
        }
        Ok(())
    }

    async fn admit(&self, state: &mut CacheState, entry: CacheEntry) -> Result<()> {
        if entry.is_local() {
            self.ensure_capacity(state, entry.size()).await?;
            state.local_size += entry.size();
        }
        let id = entry.id().to_string();
        state.index.add(id, entry);
        Ok(())
    }

    /// Guarantee `id` is resident and take a pin on it.
    ///
    /// A remote-only entry is downloaded after making room. On download
    /// failure the entry stays remote-only; space already reclaimed by
    /// eviction stays free.
    pub async fn pin(&self, id: &str) -> Result<()> {
        validate_id(id)?;
        debug!("Pinning {}", id);

        let mut state = self.state.lock().await;
        self.check_not_reserved(id)?;
        let entry = state
            .index
            .get(id)
            .ok_or_else(|| TierCacheError::NotFound { id: id.to_string() })?;

        if entry.is_local() {
            entry.pin();
            return Ok(());
        }
        let size = entry.size();

        self.ensure_capacity(&mut state, size).await?;

        let path = self.local_path(id);
        if remove_if_exists(&path).await? {
            debug!("Removed stale local file for {}", id);
        }
        self.store.get(id, &path).await?;

        let entry = state.entry_mut(id);
        entry.set_local(true);
        entry.pin();
        state.local_size += size;
        debug!("Downloaded {} ({} bytes)", id, size);
        Ok(())
    }

    /// Drop one pin on `id`.
    ///
    /// Does not count as use: the entry keeps its recency position.
    pub async fn release(&self, id: &str) -> Result<()> {
        validate_id(id)?;
        debug!("Releasing {}", id);

        let mut state = self.state.lock().await;
        self.check_not_reserved(id)?;
        let entry = state
            .index
            .peek_mut(id)
            .ok_or_else(|| TierCacheError::NotFound { id: id.to_string() })?;
        entry.unpin()
    }

    /// Permanently delete `id` from the object store, the local cache
    /// directory and the index.
    ///
    /// The remote delete runs first and aborts the operation on failure.
    /// Failing to delete the local file afterwards is logged, not returned.
    pub async fn free(&self, id: &str) -> Result<()> {
        validate_id(id)?;
        debug!("Freeing {}", id);

        let mut state = self.state.lock().await;
        self.check_not_reserved(id)?;
        let entry = state
            .index
            .peek(id)
            .ok_or_else(|| TierCacheError::NotFound { id: id.to_string() })?;
        if entry.is_pinned() {
            return Err(TierCacheError::StillPinned {
                id: id.to_string(),
                pins: entry.pin_count(),
            });
        }
        let charged = if entry.is_local() { entry.size() } else { 0 };

        self.store.remove(id).await?;

        match remove_if_exists(&self.local_path(id)).await {
            Ok(true) => debug!("Removed local file for {}", id),
            Ok(false) => {}
            Err(e) => warn!("Failed to remove local file for {}: {}", id, e),
        }
        if let Err(e) = remove_if_exists(&self.sentinel_path(id)).await {
            warn!("Failed to remove stale sentinel for {}: {}", id, e);
        }

        state.local_size -= charged;
        state.index.remove(id);
        Ok(())
    }

    /// Snapshot of the entry for `id`, without touching recency.
    pub async fn entry(&self, id: &str) -> Option<CacheEntry> {
        self.state.lock().await.index.peek(id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.state.lock().await.index.contains(id)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.index.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.index.is_empty()
    }

    /// Bytes currently charged against the local budget.
    pub async fn local_size(&self) -> u64 {
        self.state.lock().await.local_size
    }

    /// Ids from least to most recently used.
    pub async fn recency_order(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state.index.iter().map(|(id, _)| id.to_string()).collect()
    }

    pub async fn stats(&self) -> CacheStats {
        let state = self.state.lock().await;
        let mut stats = CacheStats {
            entries: state.index.len(),
            local_size: state.local_size,
            max_size: self.max_size,
            pending_admissions: self.reserved.len(),
            ..CacheStats::default()
        };
        for (_, entry) in state.index.iter() {
            if entry.is_local() {
                stats.local_entries += 1;
            }
            if entry.is_pinned() {
                stats.pinned_entries += 1;
            }
        }
        stats
    }

    /// Check the bookkeeping invariants.
    ///
    /// `local_size` must equal the sum of local entry sizes and fit the
    /// budget, and every pinned entry must be local.
    pub async fn verify(&self) -> Result<()> {
        let state = self.state.lock().await;
        let mut resident: u64 = 0;
        for (id, entry) in state.index.iter() {
            if entry.is_pinned() && !entry.is_local() {
                return Err(TierCacheError::Other(format!(
                    "pinned entry {} is not local",
                    id
                )));
            }
            if entry.is_local() {
                resident += entry.size();
            }
        }

        if resident != state.local_size {
            return Err(TierCacheError::Other(format!(
                "local size {} does not match resident bytes {}",
                state.local_size, resident
            )));
        }
        if state.local_size > self.max_size {
            return Err(TierCacheError::Other(format!(
                "local size {} exceeds capacity {}",
                state.local_size, self.max_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LocalDirStore;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        cache_dir: TempDir,
        bucket: TempDir,
        manager: CacheManager,
    }

    async fn fixture(max_size: u64) -> Fixture {
        let cache_dir = TempDir::new().unwrap();
        let bucket = TempDir::new().unwrap();
        let store = Arc::new(LocalDirStore::new(bucket.path()).unwrap());
        let manager = CacheManager::open(cache_dir.path(), max_size, store)
            .await
            .unwrap();
        Fixture {
            cache_dir,
            bucket,
            manager,
        }
    }

    fn write_content(dir: &Path, id: &str, size: usize) {
        std::fs::write(dir.join(id), vec![b'x'; size]).unwrap();
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("seg-1.sst").is_ok());
        assert!(validate_id("").is_err());
        assert!(validate_id("..").is_err());
        assert!(validate_id("a/b").is_err());
        assert!(validate_id("a\\b").is_err());
        assert!(validate_id("seg.uploading").is_err());
        assert!(validate_id("seg.part").is_err());
    }

    #[tokio::test]
    async fn test_open_requires_store_and_capacity() {
        let tmp = TempDir::new().unwrap();
        let missing_store = CacheManagerBuilder::new(tmp.path()).open().await;
        assert!(matches!(missing_store, Err(TierCacheError::Config { .. })));

        let bucket = TempDir::new().unwrap();
        let store = Arc::new(LocalDirStore::new(bucket.path()).unwrap());
        let zero = CacheManager::open(tmp.path(), 0, store).await;
        assert!(matches!(zero, Err(TierCacheError::Config { .. })));
    }

    #[tokio::test]
    async fn test_open_creates_cache_dir() {
        let tmp = TempDir::new().unwrap();
        let bucket = TempDir::new().unwrap();
        let dir = tmp.path().join("nested").join("cache");
        let store = Arc::new(LocalDirStore::new(bucket.path()).unwrap());

        let manager = CacheManager::open(&dir, 10, store).await.unwrap();
        assert!(dir.is_dir());
        assert!(manager.is_empty().await);
        assert_eq!(manager.recovery_report(), &RecoveryReport::default());
    }

    #[tokio::test]
    async fn test_add_charges_local_entries_only() {
        let f = fixture(10).await;
        write_content(f.cache_dir.path(), "a", 4);

        f.manager.add(CacheEntry::new("a", 4, true), false).await.unwrap();
        f.manager.add(CacheEntry::new("b", 7, false), false).await.unwrap();

        assert_eq!(f.manager.local_size().await, 4);
        assert_eq!(f.manager.len().await, 2);
        f.manager.verify().await.unwrap();
    }

    #[tokio::test]
    async fn test_add_duplicate_rejected() {
        let f = fixture(10).await;
        f.manager.add(CacheEntry::new("a", 1, false), false).await.unwrap();
        let err = f
            .manager
            .add(CacheEntry::new("a", 1, false), false)
            .await
            .unwrap_err();
        assert!(matches!(err, TierCacheError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_add_oversized_entry_evicts_nothing() {
        let f = fixture(3).await;
        write_content(f.cache_dir.path(), "a", 1);
        f.manager.add(CacheEntry::new("a", 1, true), true).await.unwrap();

        let err = f
            .manager
            .add(CacheEntry::new("huge", 4, true), false)
            .await
            .unwrap_err();
        assert!(matches!(err, TierCacheError::CapacityExceeded { .. }));
        assert!(f.manager.entry("a").await.unwrap().is_local());
    }

    #[tokio::test]
    async fn test_upload_removes_sentinel() {
        let f = fixture(10).await;
        write_content(f.cache_dir.path(), "a", 2);
        f.manager.add(CacheEntry::new("a", 2, true), true).await.unwrap();

        assert!(f.bucket.path().join("a").exists());
        assert!(!f.cache_dir.path().join("a.uploading").exists());
    }

    #[tokio::test]
    async fn test_upload_failure_leaves_sentinel_and_no_entry() {
        let f = fixture(10).await;
        // No content file at the local path
        let err = f
            .manager
            .add(CacheEntry::new("ghost", 2, true), true)
            .await
            .unwrap_err();
        assert!(matches!(err, TierCacheError::Io { .. }));
        assert!(f.cache_dir.path().join("ghost.uploading").exists());
        assert!(!f.manager.contains("ghost").await);
        assert_eq!(f.manager.stats().await.pending_admissions, 0);
    }

    #[tokio::test]
    async fn test_pin_release_roundtrip() {
        let f = fixture(10).await;
        write_content(f.cache_dir.path(), "a", 2);
        f.manager.add(CacheEntry::new("a", 2, true), true).await.unwrap();

        f.manager.pin("a").await.unwrap();
        f.manager.pin("a").await.unwrap();
        assert_eq!(f.manager.entry("a").await.unwrap().pin_count(), 2);

        f.manager.release("a").await.unwrap();
        f.manager.release("a").await.unwrap();
        let err = f.manager.release("a").await.unwrap_err();
        assert!(matches!(err, TierCacheError::NotPinned { .. }));
    }

    #[tokio::test]
    async fn test_unknown_ids() {
        let f = fixture(10).await;
        assert!(matches!(
            f.manager.pin("nope").await,
            Err(TierCacheError::NotFound { .. })
        ));
        assert!(matches!(
            f.manager.release("nope").await,
            Err(TierCacheError::NotFound { .. })
        ));
        assert!(matches!(
            f.manager.free("nope").await,
            Err(TierCacheError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_release_does_not_touch_recency() {
        let f = fixture(10).await;
        for id in ["a", "b"] {
            write_content(f.cache_dir.path(), id, 1);
            f.manager.add(CacheEntry::new(id, 1, true), true).await.unwrap();
        }
        f.manager.pin("a").await.unwrap();
        assert_eq!(f.manager.recency_order().await, vec!["b", "a"]);

        f.manager.pin("b").await.unwrap();
        f.manager.release("a").await.unwrap();
        assert_eq!(f.manager.recency_order().await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_free_releases_capacity_and_files() {
        let f = fixture(10).await;
        write_content(f.cache_dir.path(), "a", 3);
        f.manager.add(CacheEntry::new("a", 3, true), true).await.unwrap();

        f.manager.free("a").await.unwrap();
        assert_eq!(f.manager.local_size().await, 0);
        assert!(!f.manager.contains("a").await);
        assert!(!f.cache_dir.path().join("a").exists());
        assert!(!f.bucket.path().join("a").exists());
    }

    #[test]
    fn test_reservation_released_on_drop() {
        let reservations = Reservations::default();
        let held = reservations.reserve("a");
        assert!(reservations.contains("a"));
        assert_eq!(reservations.len(), 1);

        drop(held);
        assert!(!reservations.contains("a"));
        assert_eq!(reservations.len(), 0);
    }

    #[tokio::test]
    async fn test_stats() {
        let f = fixture(10).await;
        write_content(f.cache_dir.path(), "a", 2);
        f.manager.add(CacheEntry::new("a", 2, true), true).await.unwrap();
        f.manager.add(CacheEntry::new("b", 5, false), false).await.unwrap();
        f.manager.pin("a").await.unwrap();

        let stats = f.manager.stats().await;
        assert_eq!(
            stats,
            CacheStats {
                entries: 2,
                local_entries: 1,
                pinned_entries: 1,
                local_size: 2,
                max_size: 10,
                pending_admissions: 0,
            }
        );
    }
}
