//! Workflow repository trait definition.
//!
//! Definitions are stored twice: once as the *current* definition for a name,
//! and once per `(name, version)` for historical lookup. Version rows are
//! immutable.

use toolflow_types::error::RepositoryError;
use toolflow_types::workflow::RegisteredWorkflow;

/// Durable storage for registered workflow definitions.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait WorkflowRepository: Send + Sync {
    /// Store a definition as the current one for its name and as a new
    /// version row.
    ///
    /// Fails with [`RepositoryError::Conflict`] if the `(name, version)`
    /// pair already exists; the current row is left untouched in that case.
    fn save_definition(
        &self,
        workflow: &RegisteredWorkflow,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get the current definition for a name.
    fn get_current(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Option<RegisteredWorkflow>, RepositoryError>> + Send;

    /// Get a specific historical version.
    fn get_version(
        &self,
        name: &str,
        version: &str,
    ) -> impl std::future::Future<Output = Result<Option<RegisteredWorkflow>, RepositoryError>> + Send;

    /// List current definitions, ordered by name.
    fn list_current(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<RegisteredWorkflow>, RepositoryError>> + Send;

    /// List every stored version, ordered by name then registration time.
    fn list_versions(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<RegisteredWorkflow>, RepositoryError>> + Send;
}
