//! Local cache tier.
//!
//! - [`CacheEntry`]: per-item bookkeeping (pin count, residency, size)
//! - [`RecencyIndex`]: access-ordered index that picks eviction victims
//! - [`CacheManager`]: admission, pinning, eviction and crash recovery
//! - [`CacheContent`]: hooks for application content types

mod content;
mod entry;
mod manager;
mod recency;

pub use content::{acquire_content, relinquish_content, CacheContent};
pub use entry::CacheEntry;
pub use manager::{
    validate_id, CacheManager, CacheManagerBuilder, CacheStats, RecoveryReport,
};
pub use recency::RecencyIndex;
