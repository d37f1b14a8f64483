//! Cache layer
//!
//! Public listings that every visitor hits (published posts, upcoming
//! events) are cached in process with moka. Writes invalidate by key
//! prefix.
//!
//! ```rust,ignore
//! use cohort::cache::{CacheLayer, MemoryCache};
//!
//! let cache = MemoryCache::new();
//! cache.set("posts:page:1", &page, Duration::from_secs(60)).await?;
//! cache.delete_pattern("posts:*").await?;
//! ```

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

pub use memory::MemoryCache;

/// Cache key prefix for the public posts listing
pub const POSTS_PREFIX: &str = "posts:";
/// Cache key prefix for the events listing
pub const EVENTS_PREFIX: &str = "events:";

/// Cache operations
///
/// Methods are generic over the stored type, so this trait is used with
/// concrete types rather than as `dyn CacheLayer`.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete every key matching a glob pattern (`*` and `?`)
    async fn delete_pattern(&self, pattern: &str) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// Build the cache key for a page of the public posts listing
pub fn posts_page_key(page: u32, per_page: u32) -> String {
    format!("{}page:{}:{}", POSTS_PREFIX, page, per_page)
}

/// Build the cache key for an events listing
pub fn events_key(upcoming: bool) -> String {
    format!("{}{}", EVENTS_PREFIX, if upcoming { "upcoming" } else { "all" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_share_prefix() {
        assert_eq!(posts_page_key(2, 10), "posts:page:2:10");
        assert!(events_key(true).starts_with(EVENTS_PREFIX));
        assert_ne!(events_key(true), events_key(false));
    }
}
