//! Object store trait.

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Client for the durable remote tier.
///
/// Each call is a complete, blocking transfer with no retries of its own.
/// Implementations must be all-or-nothing: a failed `get` leaves no usable
/// file at `dest`, and a failed `put` must not be treated as committed.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Download object `name` into the local file `dest`.
    async fn get(&self, name: &str, dest: &Path) -> Result<()>;

    /// Upload the local file `src` as object `name`, replacing any previous object.
    async fn put(&self, name: &str, src: &Path) -> Result<()>;

    /// Delete object `name`.
    ///
    /// Deleting an object that does not exist succeeds.
    async fn remove(&self, name: &str) -> Result<()>;

    /// Whether object `name` is currently stored.
    async fn exists(&self, name: &str) -> Result<bool>;

    /// Short human-readable description for logs.
    fn describe(&self) -> String;
}

/// Shared handle to any object store.
pub type DynObjectStore = Arc<dyn ObjectStore>;
