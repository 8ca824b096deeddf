//! ToolExecutor trait definition.
//!
//! Uses RPITIT (native async fn in traits, Rust 2024 edition). Implementations
//! live in toolflow-infra (e.g. `HttpToolExecutor`) or in the embedding server.

use std::time::Duration;

use serde_json::Value;

/// Failure of a single tool invocation.
///
/// Every variant counts as a failed attempt for retry purposes. A tool
/// registry may be reloaded between attempts, so `NotFound` is retried too.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    /// The executor does not know this tool ID.
    #[error("tool '{0}' not found")]
    NotFound(String),

    /// The tool ran and reported an error.
    #[error("tool call failed: {0}")]
    Failed(String),

    /// The invocation did not settle within its timeout.
    #[error("tool call timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

/// External collaborator that performs the work a step requests.
pub trait ToolExecutor: Send + Sync {
    /// Invoke `tool_id` with `params` and return its result.
    fn execute(
        &self,
        tool_id: &str,
        params: &Value,
    ) -> impl std::future::Future<Output = Result<Value, ToolError>> + Send;
}
