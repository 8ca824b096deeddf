//! Error taxonomy for the orchestration engine.

use std::time::Duration;

use thiserror::Error;
use toolflow_types::error::RepositoryError;
use toolflow_types::execution::{ExecutionError, ExecutionErrorKind};
use uuid::Uuid;

use crate::tool::ToolError;

// ---------------------------------------------------------------------------
// ValidationErrors
// ---------------------------------------------------------------------------

/// Every structural violation found in a workflow definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid workflow definition: {}", .0.join("; "))]
pub struct ValidationErrors(pub Vec<String>);

impl ValidationErrors {
    pub fn violations(&self) -> &[String] {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// DefinitionError
// ---------------------------------------------------------------------------

/// Failure loading a definition from text or disk.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// OrchestrationError
// ---------------------------------------------------------------------------

/// Errors surfaced by the [`Orchestrator`](super::orchestrator::Orchestrator).
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// The definition failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// The name is taken and `overwrite` was not requested, or the exact
    /// `(name, version)` pair is already registered.
    #[error("workflow '{name}' version {version} already exists")]
    AlreadyExists { name: String, version: String },

    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),

    /// A step exhausted its retries.
    #[error("execution {execution_id}: step '{step_id}' failed after {attempts} attempt(s): {source}")]
    StepFailed {
        execution_id: Uuid,
        step_id: String,
        attempts: u32,
        #[source]
        source: ToolError,
    },

    /// Unfinished steps whose dependencies can never complete.
    #[error("execution {execution_id}: deadlock, steps {pending:?} can never run")]
    Deadlock {
        execution_id: Uuid,
        pending: Vec<String>,
        /// Dependency cycles among the stuck steps.
        cycles: Vec<Vec<String>>,
    },

    /// The execution ID is locked by another run.
    #[error("execution {0} is already running")]
    ConcurrentExecution(Uuid),

    /// The workflow's circuit breaker is open.
    #[error("circuit open for workflow '{0}'")]
    CircuitOpen(String),

    #[error("execution {execution_id} timed out after {}s", .timeout.as_secs())]
    ExecutionTimeout {
        execution_id: Uuid,
        timeout: Duration,
    },

    #[error("store error: {0}")]
    Store(#[from] RepositoryError),

    /// Engine-side failure such as a panicked step task.
    #[error("internal error: {0}")]
    Internal(String),
}

impl OrchestrationError {
    /// The record persisted on a failed execution for this error.
    pub fn to_execution_error(&self) -> ExecutionError {
        let (kind, step_id) = match self {
            OrchestrationError::StepFailed { step_id, .. } => {
                (ExecutionErrorKind::StepFailed, Some(step_id.clone()))
            }
            OrchestrationError::Deadlock { .. } => (ExecutionErrorKind::Deadlock, None),
            OrchestrationError::ExecutionTimeout { .. } => (ExecutionErrorKind::Timeout, None),
            _ => (ExecutionErrorKind::Internal, None),
        };
        ExecutionError {
            kind,
            step_id,
            message: self.to_string(),
        }
    }

    /// Whether this error is an execution outcome the circuit breaker counts.
    pub fn is_execution_failure(&self) -> bool {
        matches!(
            self,
            OrchestrationError::StepFailed { .. }
                | OrchestrationError::Deadlock { .. }
                | OrchestrationError::ExecutionTimeout { .. }
                | OrchestrationError::Internal(_)
        )
    }
}
