//! Per-item bookkeeping.

use crate::error::{Result, TierCacheError};
use serde::{Deserialize, Serialize};

/// Record for one cached item.
///
/// The id doubles as the remote object name and the local file name. Once
/// handed to [`CacheManager::add`](super::CacheManager::add) the entry is
/// owned by the manager; callers only ever see snapshots of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    id: String,
    pin_count: u32,
    in_local: bool,
    size: u64,
}

impl CacheEntry {
    /// Create an unpinned entry.
    ///
    /// `in_local` states whether the content already sits at the manager's
    /// local path for `id` and should be charged against capacity.
    pub fn new(id: impl Into<String>, size: u64, in_local: bool) -> Self {
        Self {
            id: id.into(),
            pin_count: 0,
            in_local,
            size,
        }
    }

    /// Create an entry describing an application content object.
    pub fn for_content<C: super::CacheContent + ?Sized>(content: &C, in_local: bool) -> Self {
        Self::new(content.cache_id(), content.cache_size(), in_local)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count
    }

    pub fn is_pinned(&self) -> bool {
        self.pin_count > 0
    }

    pub fn is_local(&self) -> bool {
        self.in_local
    }

    /// Eligible for eviction: resident and not in use.
    pub fn is_evictable(&self) -> bool {
        self.in_local && self.pin_count == 0
    }

    pub(crate) fn pin(&mut self) {
        self.pin_count += 1;
    }

    pub(crate) fn unpin(&mut self) -> Result<()> {
        if self.pin_count == 0 {
            return Err(TierCacheError::NotPinned {
                id: self.id.clone(),
            });
        }
        self.pin_count -= 1;
        Ok(())
    }

    pub(crate) fn set_local(&mut self, in_local: bool) {
        self.in_local = in_local;
    }
}
