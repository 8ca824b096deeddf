//! SQLite storage layer.
//!
//! Repository and lock implementations backed by SQLite with WAL mode and
//! split read/write connection pools.

pub mod execution;
pub mod lock;
pub mod pool;
pub mod workflow;

use chrono::{DateTime, Utc};
use toolflow_types::error::RepositoryError;

pub use execution::SqliteExecutionRepository;
pub use lock::SqliteLockService;
pub use pool::DatabasePool;
pub use workflow::SqliteWorkflowRepository;

// ---------------------------------------------------------------------------
// Column helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn to_json<T: serde::Serialize>(value: &T, what: &str) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|e| RepositoryError::Query(format!("serialize {what}: {e}")))
}

fn from_json<T: serde::de::DeserializeOwned>(s: &str, what: &str) -> Result<T, RepositoryError> {
    serde_json::from_str(s).map_err(|e| RepositoryError::Query(format!("invalid {what} JSON: {e}")))
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.message().contains("UNIQUE"))
}
