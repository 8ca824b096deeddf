//! SQLite-backed execution lock service.
//!
//! A lock is a row in `locks` with an expiry in unix milliseconds. Acquiring
//! inserts the row, or takes it over when the previous holder's lock has
//! expired. Lets several processes sharing one database exclude each other.

use std::time::Duration;

use chrono::Utc;
use toolflow_core::storage::LockService;
use toolflow_types::error::RepositoryError;

use super::pool::DatabasePool;

pub struct SqliteLockService {
    pool: DatabasePool,
}

impl SqliteLockService {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

impl LockService for SqliteLockService {
    async fn try_acquire(&self, name: &str, expiry: Duration) -> Result<bool, RepositoryError> {
        let now = Utc::now().timestamp_millis();
        let ttl = i64::try_from(expiry.as_millis()).unwrap_or(i64::MAX);
        let expires_at = now.saturating_add(ttl);

        let result = sqlx::query(
            r#"INSERT INTO locks (name, expires_at) VALUES (?, ?)
               ON CONFLICT(name) DO UPDATE SET expires_at = excluded.expires_at
               WHERE locks.expires_at <= ?"#,
        )
        .bind(name)
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn release(&self, name: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM locks WHERE name = ?")
            .bind(name)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::test_util::test_pool;

    #[tokio::test]
    async fn test_acquire_is_exclusive_until_released() {
        let (_dir, pool) = test_pool().await;
        let locks = SqliteLockService::new(pool);
        let hour = Duration::from_secs(3600);

        assert!(locks.try_acquire("lock:execution:1", hour).await.unwrap());
        assert!(!locks.try_acquire("lock:execution:1", hour).await.unwrap());
        assert!(locks.try_acquire("lock:execution:2", hour).await.unwrap());

        locks.release("lock:execution:1").await.unwrap();
        assert!(locks.try_acquire("lock:execution:1", hour).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_lock_can_be_taken_over() {
        let (_dir, pool) = test_pool().await;
        let locks = SqliteLockService::new(pool);
        assert!(locks
            .try_acquire("lock:execution:1", Duration::from_millis(10))
            .await
            .unwrap());
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(locks
            .try_acquire("lock:execution:1", Duration::from_secs(60))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_release_unheld_is_noop() {
        let (_dir, pool) = test_pool().await;
        let locks = SqliteLockService::new(pool);
        locks.release("never-held").await.unwrap();
    }
}
