//! Cache and lock service traits.
//!
//! `CacheStore` is the fast path in front of the durable repositories: plain
//! get/set/delete of JSON values with an optional TTL. `LockService` is the
//! atomic acquire-if-absent-with-expiry primitive used to guard execution IDs.
//!
//! Uses RPITIT (native async fn in traits, Rust 2024 edition).

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use toolflow_types::error::RepositoryError;

/// Keyed cache of JSON values with optional per-entry TTL.
///
/// Every mutation is atomic per key: readers never observe a partially
/// written entry.
pub trait CacheStore: Send + Sync {
    /// Get a value. Expired entries read as `None`.
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<Value>, RepositoryError>> + Send;

    /// Set a value (upsert). `ttl = None` keeps the entry until deleted.
    fn set(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete a key. No-op if the key does not exist.
    fn delete(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}

/// Named locks with expiry.
pub trait LockService: Send + Sync {
    /// Acquire `name` if it is free (or its previous holder's lease expired).
    ///
    /// Returns `false` without waiting when the lock is held.
    fn try_acquire(
        &self,
        name: &str,
        expiry: Duration,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Release `name`. No-op if it is not held.
    fn release(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}

// Shared handles: one `MemoryCache` can back both the cache and the lock
// service of an engine.

impl<T: CacheStore> CacheStore for Arc<T> {
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<Value>, RepositoryError>> + Send {
        (**self).get(key)
    }

    fn set(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send {
        (**self).set(key, value, ttl)
    }

    fn delete(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send {
        (**self).delete(key)
    }
}

impl<T: LockService> LockService for Arc<T> {
    fn try_acquire(
        &self,
        name: &str,
        expiry: Duration,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send {
        (**self).try_acquire(name, expiry)
    }

    fn release(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send {
        (**self).release(name)
    }
}
