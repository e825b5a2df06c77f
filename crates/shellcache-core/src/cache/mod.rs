//! Named cache buckets for offline resources.
//!
//! The coordinator keeps three buckets:
//! - `TEMP_BUCKET`: core resources staged during install
//! - `CONTENT_BUCKET`: the persistent cache served to clients
//! - `MANIFEST_BUCKET`: the version record, a single `MANIFEST_ENTRY`
//!
//! Buckets are created lazily on first write. Every operation on a single
//! entry is atomic.

pub mod fs;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::CachedResponse;

pub use fs::FsStorage;
pub use memory::MemoryStorage;

pub const TEMP_BUCKET: &str = "shellcache-temp";
pub const CONTENT_BUCKET: &str = "shellcache-content";
pub const MANIFEST_BUCKET: &str = "shellcache-manifest";

/// Entry name of the version record inside `MANIFEST_BUCKET`.
pub const MANIFEST_ENTRY: &str = "manifest";

#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Entry names in a bucket, sorted. A missing bucket has no entries.
    async fn keys(&self, bucket: &str) -> Result<Vec<String>>;

    async fn get(&self, bucket: &str, key: &str) -> Result<Option<CachedResponse>>;

    async fn put(&self, bucket: &str, key: &str, entry: &CachedResponse) -> Result<()>;

    /// Returns whether an entry was removed.
    async fn remove(&self, bucket: &str, key: &str) -> Result<bool>;

    /// Drop a bucket and all its entries. Returns whether it existed.
    async fn delete_bucket(&self, bucket: &str) -> Result<bool>;

    async fn has_bucket(&self, bucket: &str) -> Result<bool>;
}
