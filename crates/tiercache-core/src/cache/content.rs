//! Lifecycle coupling for application content types.
//!
//! The manager never calls into payload code. Content types that want their
//! own setup and teardown around residency implement [`CacheContent`] and go
//! through [`acquire_content`] / [`relinquish_content`], which wrap the
//! manager's pin and release.

use super::manager::CacheManager;
use crate::error::Result;
use std::path::Path;
use tracing::warn;

/// An application object whose bytes are cached under [`cache_id`](Self::cache_id).
pub trait CacheContent: Send + Sync {
    /// Id used for both the local file and the remote object.
    fn cache_id(&self) -> &str;

    /// Size in bytes charged against the cache budget.
    fn cache_size(&self) -> u64;

    /// Prepare the object once its content is resident at `local_path`.
    fn initialize(&mut self, local_path: &Path) -> Result<()>;

    /// Drop any state derived from the local content.
    fn teardown(&mut self) -> Result<()>;
}

/// Pin the content's entry, then run its `initialize` hook.
///
/// If the hook fails the pin is dropped again.
pub async fn acquire_content<C>(manager: &CacheManager, content: &mut C) -> Result<()>
where
    C: CacheContent + ?Sized,
{
    let id = content.cache_id().to_string();
    manager.pin(&id).await?;

    let local_path = manager.local_path(&id);
    if let Err(e) = content.initialize(&local_path) {
        if let Err(release_err) = manager.release(&id).await {
            warn!("Failed to release {} after initialize error: {}", id, release_err);
        }
        return Err(e);
    }
    Ok(())
}

/// Run the content's `teardown` hook, then drop its pin.
///
/// The pin is dropped even when teardown fails; the teardown error is
/// returned afterwards.
pub async fn relinquish_content<C>(manager: &CacheManager, content: &mut C) -> Result<()>
where
    C: CacheContent + ?Sized,
{
    let id = content.cache_id().to_string();
    let teardown = content.teardown();
    manager.release(&id).await?;
    teardown
}
