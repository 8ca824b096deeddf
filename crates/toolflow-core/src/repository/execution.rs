//! Execution repository trait definition.
//!
//! The durable half of the execution state store. Rows are appended on
//! submission and updated in place as the execution progresses.

use toolflow_types::error::RepositoryError;
use toolflow_types::execution::Execution;
use uuid::Uuid;

/// Durable storage for execution records.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait ExecutionRepository: Send + Sync {
    /// Append a new execution row. Fails with `Conflict` on a duplicate ID.
    fn insert_execution(
        &self,
        execution: &Execution,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Overwrite status, results, step records, output, error and timestamps.
    /// Fails with `NotFound` if the row does not exist.
    fn update_execution(
        &self,
        execution: &Execution,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get an execution by ID.
    fn get_execution(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Execution>, RepositoryError>> + Send;

    /// Most recent executions of a workflow, newest first.
    fn list_executions(
        &self,
        workflow_name: &str,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<Execution>, RepositoryError>> + Send;
}
