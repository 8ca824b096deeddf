//! SQLite execution repository implementation.
//!
//! One row per execution. Parameters, results, step records, output, and the
//! failure detail are JSON columns; the status is stored as its lowercase name.

use std::collections::BTreeMap;

use sqlx::Row;
use toolflow_core::repository::ExecutionRepository;
use toolflow_types::error::RepositoryError;
use toolflow_types::execution::{Execution, ExecutionError, ExecutionStatus, StepRecord};
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, from_json, is_unique_violation, parse_datetime, to_json};

/// SQLite-backed implementation of `ExecutionRepository`.
pub struct SqliteExecutionRepository {
    pool: DatabasePool,
}

impl SqliteExecutionRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row type
// ---------------------------------------------------------------------------

struct ExecutionRow {
    id: String,
    workflow_name: String,
    workflow_version: String,
    status: String,
    parameters: String,
    results: String,
    steps: String,
    output: Option<String>,
    error: Option<String>,
    start_time: String,
    end_time: Option<String>,
}

impl ExecutionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            workflow_name: row.try_get("workflow_name")?,
            workflow_version: row.try_get("workflow_version")?,
            status: row.try_get("status")?,
            parameters: row.try_get("parameters")?,
            results: row.try_get("results")?,
            steps: row.try_get("steps")?,
            output: row.try_get("output")?,
            error: row.try_get("error")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
        })
    }

    fn into_execution(self) -> Result<Execution, RepositoryError> {
        let id = self
            .id
            .parse::<Uuid>()
            .map_err(|e| RepositoryError::Query(format!("invalid UUID: {e}")))?;
        let status: ExecutionStatus = self.status.parse().map_err(RepositoryError::Query)?;
        let results: BTreeMap<String, serde_json::Value> = from_json(&self.results, "results")?;
        let steps: BTreeMap<String, StepRecord> = from_json(&self.steps, "steps")?;
        let output = self
            .output
            .as_deref()
            .map(|s| from_json(s, "output"))
            .transpose()?;
        let error: Option<ExecutionError> = self
            .error
            .as_deref()
            .map(|s| from_json(s, "execution error"))
            .transpose()?;

        Ok(Execution {
            id,
            workflow_name: self.workflow_name,
            workflow_version: self.workflow_version,
            status,
            parameters: from_json(&self.parameters, "parameters")?,
            results,
            steps,
            output,
            error,
            start_time: parse_datetime(&self.start_time)?,
            end_time: self.end_time.as_deref().map(parse_datetime).transpose()?,
        })
    }
}

/// Serialized column values shared by insert and update.
struct ExecutionColumns {
    status: String,
    parameters: String,
    results: String,
    steps: String,
    output: Option<String>,
    error: Option<String>,
    start_time: String,
    end_time: Option<String>,
}

impl ExecutionColumns {
    fn encode(execution: &Execution) -> Result<Self, RepositoryError> {
        Ok(Self {
            status: execution.status.to_string(),
            parameters: to_json(&execution.parameters, "parameters")?,
            results: to_json(&execution.results, "results")?,
            steps: to_json(&execution.steps, "steps")?,
            output: execution
                .output
                .as_ref()
                .map(|o| to_json(o, "output"))
                .transpose()?,
            error: execution
                .error
                .as_ref()
                .map(|e| to_json(e, "execution error"))
                .transpose()?,
            start_time: format_datetime(&execution.start_time),
            end_time: execution.end_time.as_ref().map(format_datetime),
        })
    }
}

// ---------------------------------------------------------------------------
// ExecutionRepository
// ---------------------------------------------------------------------------

impl ExecutionRepository for SqliteExecutionRepository {
    async fn insert_execution(&self, execution: &Execution) -> Result<(), RepositoryError> {
        let cols = ExecutionColumns::encode(execution)?;

        sqlx::query(
            r#"INSERT INTO executions
                 (id, workflow_name, workflow_version, status, parameters, results, steps,
                  output, error, start_time, end_time)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(execution.id.to_string())
        .bind(&execution.workflow_name)
        .bind(&execution.workflow_version)
        .bind(&cols.status)
        .bind(&cols.parameters)
        .bind(&cols.results)
        .bind(&cols.steps)
        .bind(&cols.output)
        .bind(&cols.error)
        .bind(&cols.start_time)
        .bind(&cols.end_time)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RepositoryError::Conflict(format!("execution {} already exists", execution.id))
            } else {
                RepositoryError::Query(e.to_string())
            }
        })?;

        Ok(())
    }

    async fn update_execution(&self, execution: &Execution) -> Result<(), RepositoryError> {
        let cols = ExecutionColumns::encode(execution)?;

        let result = sqlx::query(
            r#"UPDATE executions SET
                 status = ?, parameters = ?, results = ?, steps = ?,
                 output = ?, error = ?, start_time = ?, end_time = ?
               WHERE id = ?"#,
        )
        .bind(&cols.status)
        .bind(&cols.parameters)
        .bind(&cols.results)
        .bind(&cols.steps)
        .bind(&cols.output)
        .bind(&cols.error)
        .bind(&cols.start_time)
        .bind(&cols.end_time)
        .bind(execution.id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn get_execution(&self, id: &Uuid) -> Result<Option<Execution>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM executions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let r = ExecutionRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(r.into_execution()?))
            }
            None => Ok(None),
        }
    }

    async fn list_executions(
        &self,
        workflow_name: &str,
        limit: u32,
    ) -> Result<Vec<Execution>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM executions WHERE workflow_name = ? ORDER BY start_time DESC, rowid DESC LIMIT ?",
        )
        .bind(workflow_name)
        .bind(i64::from(limit))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut executions = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = ExecutionRow::from_row(row)
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            executions.push(r.into_execution()?);
        }
        Ok(executions)
    }
}
