//! In-process cache and lock service backed by `DashMap`.
//!
//! Expiry is checked lazily on access; expired entries are removed when they
//! are next touched.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value;
use toolflow_types::error::RepositoryError;

use super::cache::{CacheStore, LockService};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Concurrent in-memory implementation of [`CacheStore`] and [`LockService`].
///
/// One instance per engine; tests create as many independent instances as
/// they like.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
    locks: DashMap<String, Instant>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cache entry (locks are kept).
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, RepositoryError> {
        let now = Instant::now();
        // remove_if holds the shard lock, so a concurrent set is not lost
        if self
            .entries
            .remove_if(key, |_, entry| entry.is_expired(now))
            .is_some()
        {
            return Ok(None);
        }
        Ok(self.entries.get(key).map(|e| e.value.clone()))
    }

    async fn set(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
    ) -> Result<(), RepositoryError> {
        let entry = CacheEntry {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), RepositoryError> {
        self.entries.remove(key);
        Ok(())
    }
}

impl LockService for MemoryCache {
    async fn try_acquire(&self, name: &str, expiry: Duration) -> Result<bool, RepositoryError> {
        let now = Instant::now();
        match self.locks.entry(name.to_string()) {
            Entry::Occupied(mut held) => {
                if now >= *held.get() {
                    held.insert(now + expiry);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(now + expiry);
                Ok(true)
            }
        }
    }

    async fn release(&self, name: &str) -> Result<(), RepositoryError> {
        self.locks.remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("k").await.unwrap(), None);

        cache.set("k", json!({ "v": 1 }), None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(json!({ "v": 1 })));
        assert_eq!(cache.len(), 1);

        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let cache = MemoryCache::new();
        cache
            .set("short", json!(1), Some(Duration::from_millis(20)))
            .await
            .unwrap();
        cache.set("long", json!(2), None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(cache.get("short").await.unwrap(), None);
        assert_eq!(cache.get("long").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn test_set_overwrites_existing_value() {
        let cache = MemoryCache::new();
        cache.set("k", json!("old"), None).await.unwrap();
        cache.set("k", json!("new"), None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(json!("new")));
    }

    #[tokio::test]
    async fn test_lock_is_exclusive_until_released() {
        let cache = MemoryCache::new();
        let expiry = Duration::from_secs(60);

        assert!(cache.try_acquire("exec-1", expiry).await.unwrap());
        assert!(!cache.try_acquire("exec-1", expiry).await.unwrap());
        assert!(cache.try_acquire("exec-2", expiry).await.unwrap());

        cache.release("exec-1").await.unwrap();
        assert!(cache.try_acquire("exec-1", expiry).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_lock_can_be_taken_over() {
        let cache = MemoryCache::new();
        assert!(
            cache
                .try_acquire("exec", Duration::from_millis(10))
                .await
                .unwrap()
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(cache.try_acquire("exec", Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_acquire_has_single_winner() {
        let cache = std::sync::Arc::new(MemoryCache::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .try_acquire("contended", Duration::from_secs(60))
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for h in handles {
            if h.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
