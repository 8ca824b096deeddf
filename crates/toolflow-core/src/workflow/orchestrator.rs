//! The orchestrator: the engine's single entry point.
//!
//! Wires the registry, circuit breaker, scheduler, and execution state store
//! together. Every collaborator is an explicit instance owned here; the
//! embedding process decides which repositories, cache, lock service, and
//! tool executor to inject.
//!
//! Execution flow:
//! 1. resolve the definition (registry)
//! 2. reject if the workflow's circuit is open
//! 3. lock the execution ID (expiry = execution timeout)
//! 4. persist a `pending` record, move it to `running`
//! 5. run the DAG
//! 6. record the outcome on the breaker, persist the terminal state
//! 7. release the lock

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use toolflow_types::circuit::CircuitSnapshot;
use toolflow_types::config::EngineConfig;
use toolflow_types::error::RepositoryError;
use toolflow_types::execution::Execution;
use toolflow_types::workflow::{RegisteredWorkflow, WorkflowDefinition, WorkflowMetadata};
use uuid::Uuid;

use super::circuit::{CircuitBreaker, CircuitBreakerConfig};
use super::error::OrchestrationError;
use super::registry::{RegisterOptions, WorkflowRegistry};
use super::retry::{RetryExecutor, RetryPolicy};
use super::scheduler::DagScheduler;
use super::state::ExecutionStateStore;
use crate::repository::{ExecutionRepository, WorkflowRepository};
use crate::storage::{CacheStore, LockService};
use crate::tool::BoxToolExecutor;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Result of a successful registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationOutcome {
    pub success: bool,
    pub version: String,
    pub metadata: WorkflowMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Caller-chosen execution ID; a UUIDv7 is generated when absent.
    pub execution_id: Option<Uuid>,
    /// Run a specific registered version instead of the current one.
    pub version: Option<String>,
}

/// Result of a completed execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub execution_id: Uuid,
    pub result: Value,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator<R, E, C, L> {
    registry: WorkflowRegistry<R, C>,
    store: ExecutionStateStore<E, C, L>,
    breaker: CircuitBreaker,
    scheduler: DagScheduler,
    default_timeout: Duration,
}

impl<R, E, C, L> Orchestrator<R, E, C, L>
where
    R: WorkflowRepository,
    E: ExecutionRepository,
    C: CacheStore,
    L: LockService,
{
    pub fn new(
        config: &EngineConfig,
        workflows: R,
        executions: E,
        cache: Arc<C>,
        locks: L,
        tools: BoxToolExecutor,
    ) -> Self {
        Self {
            registry: WorkflowRegistry::new(workflows, cache.clone(), config.cache_ttl()),
            store: ExecutionStateStore::new(executions, cache, locks, config.cache_ttl()),
            breaker: CircuitBreaker::new(CircuitBreakerConfig::from(&config.circuit_breaker)),
            scheduler: DagScheduler::new(
                RetryExecutor::new(tools),
                RetryPolicy::from(&config.retry),
                config.default_concurrency_limit,
            ),
            default_timeout: config.execution_timeout(),
        }
    }

    /// Validate, version, and store a workflow definition.
    #[tracing::instrument(skip_all, fields(workflow = %definition.name))]
    pub async fn register_workflow(
        &self,
        definition: WorkflowDefinition,
        options: RegisterOptions,
    ) -> Result<RegistrationOutcome, OrchestrationError> {
        let registered = self.registry.register(definition, &options).await?;
        Ok(RegistrationOutcome {
            success: true,
            version: registered.definition.version,
            metadata: registered.metadata,
        })
    }

    /// Run a registered workflow to completion.
    ///
    /// Execution-level failures (step failure, deadlock, timeout) are
    /// persisted on the execution record before being returned.
    #[tracing::instrument(skip(self, parameters, options))]
    pub async fn execute_workflow(
        &self,
        name: &str,
        parameters: Value,
        options: ExecuteOptions,
    ) -> Result<ExecutionOutcome, OrchestrationError> {
        let registered = self
            .registry
            .get(name, options.version.as_deref())
            .await?
            .ok_or_else(|| OrchestrationError::WorkflowNotFound(name.to_string()))?;

        if self.breaker.is_open(name) {
            tracing::warn!(workflow = name, "rejecting execution, circuit open");
            return Err(OrchestrationError::CircuitOpen(name.to_string()));
        }

        let execution_id = options.execution_id.unwrap_or_else(Uuid::now_v7);
        let timeout = registered
            .definition
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        if !self.store.acquire_lock(&execution_id, timeout).await? {
            return Err(OrchestrationError::ConcurrentExecution(execution_id));
        }

        let result = self
            .run_locked(&registered.definition, execution_id, parameters, timeout)
            .await;
        self.store.release_lock(&execution_id).await;
        result
    }

    async fn run_locked(
        &self,
        definition: &WorkflowDefinition,
        execution_id: Uuid,
        parameters: Value,
        timeout: Duration,
    ) -> Result<ExecutionOutcome, OrchestrationError> {
        let mut execution = Execution::new(
            execution_id,
            definition.name.as_str(),
            definition.version.as_str(),
            parameters,
            definition.steps.iter().map(|s| s.id.as_str()),
        );
        self.store.create(&execution).await?;

        execution
            .start()
            .map_err(|e| OrchestrationError::Internal(e.to_string()))?;
        if let Err(e) = self.store.update(&execution).await {
            let err = OrchestrationError::Store(e);
            tracing::error!(execution_id = %execution_id, error = %err, "could not mark execution running");
            if execution.fail(err.to_execution_error()).is_ok() {
                if let Err(e) = self.persist_terminal(&execution).await {
                    tracing::error!(execution_id = %execution_id, error = %e, "failed to persist failed execution");
                }
            }
            return Err(err);
        }

        tracing::info!(
            execution_id = %execution_id,
            workflow = definition.name.as_str(),
            version = definition.version.as_str(),
            steps = definition.steps.len(),
            "starting execution"
        );

        let outcome = self
            .scheduler
            .run(definition, &mut execution, &self.store, timeout)
            .await;

        match outcome {
            Ok(output) => {
                self.breaker.record_success(&definition.name);
                execution
                    .complete(output.clone())
                    .map_err(|e| OrchestrationError::Internal(e.to_string()))?;
                if let Err(e) = self.persist_terminal(&execution).await {
                    tracing::error!(
                        execution_id = %execution_id,
                        error = %e,
                        "failed to persist completed execution"
                    );
                    return Err(e.into());
                }
                tracing::info!(
                    execution_id = %execution_id,
                    duration_ms = execution.duration_ms().unwrap_or_default(),
                    "execution completed"
                );
                Ok(ExecutionOutcome {
                    execution_id,
                    result: output,
                })
            }
            Err(err) => {
                if err.is_execution_failure() {
                    self.breaker.record_failure(&definition.name);
                }
                if let Err(e) = execution.fail(err.to_execution_error()) {
                    tracing::error!(execution_id = %execution_id, error = %e, "could not mark execution failed");
                }
                if let Err(e) = self.persist_terminal(&execution).await {
                    tracing::error!(
                        execution_id = %execution_id,
                        error = %e,
                        "failed to persist failed execution"
                    );
                }
                tracing::warn!(execution_id = %execution_id, error = %err, "execution failed");
                Err(err)
            }
        }
    }

    /// Write a terminal record, retrying once if the store rejects it.
    async fn persist_terminal(&self, execution: &Execution) -> Result<(), RepositoryError> {
        match self.store.update(execution).await {
            Ok(()) => Ok(()),
            Err(first) => {
                tracing::warn!(
                    execution_id = %execution.id,
                    status = %execution.status,
                    error = %first,
                    "terminal write failed, retrying"
                );
                self.store.update(execution).await
            }
        }
    }

    /// Read-through lookup of an execution record.
    pub async fn get_execution(
        &self,
        execution_id: &Uuid,
    ) -> Result<Option<Execution>, OrchestrationError> {
        Ok(self.store.get(execution_id).await?)
    }

    pub async fn get_workflow(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<Option<RegisteredWorkflow>, OrchestrationError> {
        Ok(self.registry.get(name, version).await?)
    }

    pub async fn list_workflows(
        &self,
        include_versions: bool,
    ) -> Result<Vec<RegisteredWorkflow>, OrchestrationError> {
        Ok(self.registry.list_all(include_versions).await?)
    }

    pub async fn list_executions(
        &self,
        workflow_name: &str,
        limit: u32,
    ) -> Result<Vec<Execution>, OrchestrationError> {
        Ok(self.store.list(workflow_name, limit).await?)
    }

    pub fn circuit_state(&self, workflow_name: &str) -> CircuitSnapshot {
        self.breaker.snapshot(workflow_name)
    }
}
