use thiserror::Error;

use crate::execution::ExecutionStatus;

/// Errors from repository operations (used by trait definitions in toolflow-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Rejected lifecycle transition on an [`Execution`](crate::execution::Execution).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid execution transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: ExecutionStatus,
    pub to: ExecutionStatus,
}
