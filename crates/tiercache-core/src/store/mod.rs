//! Remote object store clients.
//!
//! The cache manager only sees the [`ObjectStore`] trait. Two clients ship
//! with the crate:
//! - [`LocalDirStore`]: a directory (local disk or a network mount) used as the bucket
//! - [`HttpObjectStore`]: plain `GET`/`PUT`/`DELETE` against an HTTP endpoint

mod http;
mod local;
mod traits;

pub use http::HttpObjectStore;
pub use local::LocalDirStore;
pub use traits::{DynObjectStore, ObjectStore};
