//! Execution state store: cache in front of the durable execution table.
//!
//! Writes go to the durable repository first and then to the cache, so a
//! failed durable write never leaves a cache record behind. Reads try the
//! cache and fall back to the repository, repopulating the cache with a
//! bounded TTL. The lock service guards execution IDs against concurrent
//! runs.

use std::sync::Arc;
use std::time::Duration;

use toolflow_types::error::RepositoryError;
use toolflow_types::execution::Execution;
use uuid::Uuid;

use crate::repository::ExecutionRepository;
use crate::storage::{CacheStore, LockService};

fn cache_key(id: &Uuid) -> String {
    format!("execution:{id}")
}

fn lock_name(id: &Uuid) -> String {
    format!("lock:execution:{id}")
}

/// Persists execution lifecycle and results.
pub struct ExecutionStateStore<E, C, L> {
    repo: E,
    cache: Arc<C>,
    locks: L,
    cache_ttl: Duration,
}

impl<E, C, L> ExecutionStateStore<E, C, L>
where
    E: ExecutionRepository,
    C: CacheStore,
    L: LockService,
{
    pub fn new(repo: E, cache: Arc<C>, locks: L, cache_ttl: Duration) -> Self {
        Self {
            repo,
            cache,
            locks,
            cache_ttl,
        }
    }

    /// Record a new execution. Fails if the durable insert fails.
    pub async fn create(&self, execution: &Execution) -> Result<(), RepositoryError> {
        self.repo.insert_execution(execution).await?;
        self.write_cache(execution).await;
        Ok(())
    }

    /// Overwrite the durable row and the cached copy.
    pub async fn update(&self, execution: &Execution) -> Result<(), RepositoryError> {
        self.repo.update_execution(execution).await?;
        self.write_cache(execution).await;
        Ok(())
    }

    /// Best-effort progress write while an execution is running.
    pub async fn checkpoint(&self, execution: &Execution) {
        if let Err(e) = self.update(execution).await {
            tracing::warn!(
                execution_id = %execution.id,
                error = %e,
                "failed to checkpoint execution progress"
            );
        }
    }

    /// Read-through lookup by ID.
    pub async fn get(&self, id: &Uuid) -> Result<Option<Execution>, RepositoryError> {
        let key = cache_key(id);
        match self.cache.get(&key).await {
            Ok(Some(cached)) => match serde_json::from_value::<Execution>(cached) {
                Ok(execution) => return Ok(Some(execution)),
                Err(e) => {
                    tracing::warn!(execution_id = %id, error = %e, "discarding unreadable cache entry");
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(execution_id = %id, error = %e, "cache read failed, using durable store");
            }
        }

        let found = self.repo.get_execution(id).await?;
        if let Some(execution) = &found {
            tracing::debug!(execution_id = %id, "repopulating execution cache");
            self.write_cache(execution).await;
        }
        Ok(found)
    }

    /// Most recent executions of a workflow, newest first.
    pub async fn list(
        &self,
        workflow_name: &str,
        limit: u32,
    ) -> Result<Vec<Execution>, RepositoryError> {
        self.repo.list_executions(workflow_name, limit).await
    }

    /// Try to take the run lock for `id`. `false` means another run holds it.
    pub async fn acquire_lock(&self, id: &Uuid, expiry: Duration) -> Result<bool, RepositoryError> {
        self.locks.try_acquire(&lock_name(id), expiry).await
    }

    pub async fn release_lock(&self, id: &Uuid) {
        if let Err(e) = self.locks.release(&lock_name(id)).await {
            tracing::warn!(execution_id = %id, error = %e, "failed to release execution lock");
        }
    }

    async fn write_cache(&self, execution: &Execution) {
        let value = match serde_json::to_value(execution) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(execution_id = %execution.id, error = %e, "failed to encode execution for cache");
                return;
            }
        };
        if let Err(e) = self
            .cache
            .set(&cache_key(&execution.id), value, Some(self.cache_ttl))
            .await
        {
            tracing::warn!(execution_id = %execution.id, error = %e, "failed to write execution cache");
        }
    }
}
