//! In-memory cache backed by moka
//!
//! Values are stored as JSON so one cache can hold any serializable type.
//! moka applies a single time-to-live per cache; entries also carry their
//! own deadline so a shorter per-call TTL is honoured on read.

use super::CacheLayer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use moka::future::Cache;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

const DEFAULT_MAX_CAPACITY: u64 = 10_000;

/// Upper bound on any entry's lifetime
const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Clone)]
struct CacheEntry {
    data: Arc<String>,
    expires_at: Instant,
}

impl CacheEntry {
    fn new<T: Serialize>(value: &T, ttl: Duration) -> Result<Self> {
        let json = serde_json::to_string(value).context("Failed to serialize cache value")?;
        Ok(Self {
            data: Arc::new(json),
            expires_at: Instant::now() + ttl,
        })
    }

    fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }

    fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.data).context("Failed to deserialize cache value")
    }
}

/// In-process cache
pub struct MemoryCache {
    cache: Cache<String, CacheEntry>,
    default_ttl: Duration,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entry_count", &self.cache.entry_count())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_capacity_and_ttl(DEFAULT_MAX_CAPACITY, DEFAULT_TTL)
    }

    pub fn with_capacity_and_ttl(max_capacity: u64, default_ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(default_ttl)
            .build();

        Self { cache, default_ttl }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn pattern_matches(pattern: &str, key: &str) -> bool {
        let pattern: Vec<char> = pattern.chars().collect();
        let key: Vec<char> = key.chars().collect();
        glob_match(&pattern, &key)
    }
}

/// Iterative glob matcher with single-star backtracking
fn glob_match(pattern: &[char], key: &[char]) -> bool {
    let (mut pi, mut ki) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ki < key.len() {
        match pattern.get(pi) {
            Some('*') => {
                star = Some((pi, ki));
                pi += 1;
            }
            Some(&p) if p == '?' || p == key[ki] => {
                pi += 1;
                ki += 1;
            }
            _ => match star {
                Some((sp, sk)) => {
                    pi = sp + 1;
                    ki = sk + 1;
                    star = Some((sp, sk + 1));
                }
                None => return false,
            },
        }
    }

    pattern[pi..].iter().all(|c| *c == '*')
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheLayer for MemoryCache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self.cache.get(key).await {
            Some(entry) if entry.is_live() => Ok(Some(entry.deserialize()?)),
            Some(_) => {
                self.cache.invalidate(key).await;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let entry = CacheEntry::new(value, ttl.min(self.default_ttl))?;
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        let keys: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| Self::pattern_matches(pattern, key.as_ref()))
            .map(|(key, _)| (*key).clone())
            .collect();

        for key in keys {
            self.cache.invalidate(&key).await;
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Listing {
        ids: Vec<i64>,
        total: i64,
    }

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = MemoryCache::new();
        let listing = Listing { ids: vec![3, 2, 1], total: 3 };

        cache.set("posts:page:1:10", &listing, MINUTE).await.unwrap();
        let cached: Option<Listing> = cache.get("posts:page:1:10").await.unwrap();
        assert_eq!(cached, Some(listing));

        let missing: Option<Listing> = cache.get("posts:page:2:10").await.unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = MemoryCache::new();
        cache.set("events:all", &1i64, MINUTE).await.unwrap();
        cache.delete("events:all").await.unwrap();
        assert_eq!(cache.get::<i64>("events:all").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_pattern_keeps_other_prefixes() {
        let cache = MemoryCache::new();
        cache.set("posts:page:1:10", &1i64, MINUTE).await.unwrap();
        cache.set("posts:page:2:10", &2i64, MINUTE).await.unwrap();
        cache.set("events:upcoming", &3i64, MINUTE).await.unwrap();

        cache.delete_pattern("posts:*").await.unwrap();

        assert_eq!(cache.get::<i64>("posts:page:1:10").await.unwrap(), None);
        assert_eq!(cache.get::<i64>("posts:page:2:10").await.unwrap(), None);
        assert_eq!(cache.get::<i64>("events:upcoming").await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_short_ttl_expires() {
        let cache = MemoryCache::new();
        cache.set("k", &1i64, Duration::ZERO).await.unwrap();
        assert_eq!(cache.get::<i64>("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = MemoryCache::new();
        cache.set("a", &1i64, MINUTE).await.unwrap();
        cache.set("b", &2i64, MINUTE).await.unwrap();
        cache.clear().await.unwrap();
        assert_eq!(cache.get::<i64>("a").await.unwrap(), None);
        assert_eq!(cache.get::<i64>("b").await.unwrap(), None);
    }

    #[test]
    fn test_glob_match() {
        assert!(MemoryCache::pattern_matches("posts:*", "posts:page:1:10"));
        assert!(MemoryCache::pattern_matches("*", ""));
        assert!(MemoryCache::pattern_matches("user:?:profile", "user:7:profile"));
        assert!(MemoryCache::pattern_matches("a*b*c", "axxbyyc"));
        assert!(!MemoryCache::pattern_matches("a*b*c", "axxbyy"));
        assert!(!MemoryCache::pattern_matches("posts:*", "events:all"));
        assert!(!MemoryCache::pattern_matches("user:?:profile", "user:12:profile"));
    }
}
