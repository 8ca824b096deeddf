//! SQLite workflow repository implementation.
//!
//! Every registration is appended to `workflow_versions` (immutable history)
//! and upserted into `workflows`, which holds the current definition per
//! name. Definitions and metadata are stored as JSON blobs.

use sqlx::Row;
use toolflow_core::repository::WorkflowRepository;
use toolflow_types::error::RepositoryError;
use toolflow_types::workflow::{RegisteredWorkflow, WorkflowDefinition, WorkflowMetadata};

use super::pool::DatabasePool;
use super::{format_datetime, from_json, is_unique_violation, parse_datetime, to_json};

/// SQLite-backed implementation of `WorkflowRepository`.
pub struct SqliteWorkflowRepository {
    pool: DatabasePool,
}

impl SqliteWorkflowRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row type
// ---------------------------------------------------------------------------

struct WorkflowRow {
    definition: String,
    metadata: String,
    registered_at: String,
}

impl WorkflowRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            definition: row.try_get("definition")?,
            metadata: row.try_get("metadata")?,
            registered_at: row.try_get("registered_at")?,
        })
    }

    fn into_registered(self) -> Result<RegisteredWorkflow, RepositoryError> {
        let definition: WorkflowDefinition = from_json(&self.definition, "workflow definition")?;
        let mut metadata: WorkflowMetadata = from_json(&self.metadata, "workflow metadata")?;
        metadata.registered_at = parse_datetime(&self.registered_at)?;
        Ok(RegisteredWorkflow {
            definition,
            metadata,
        })
    }
}

fn collect_rows(
    rows: &[sqlx::sqlite::SqliteRow],
) -> Result<Vec<RegisteredWorkflow>, RepositoryError> {
    let mut workflows = Vec::with_capacity(rows.len());
    for row in rows {
        let r = WorkflowRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
        workflows.push(r.into_registered()?);
    }
    Ok(workflows)
}

// ---------------------------------------------------------------------------
// WorkflowRepository
// ---------------------------------------------------------------------------

impl WorkflowRepository for SqliteWorkflowRepository {
    async fn save_definition(&self, workflow: &RegisteredWorkflow) -> Result<(), RepositoryError> {
        let def = &workflow.definition;
        let definition_json = to_json(def, "definition")?;
        let metadata_json = to_json(&workflow.metadata, "metadata")?;
        let registered_at = format_datetime(&workflow.metadata.registered_at);

        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        sqlx::query(
            r#"INSERT INTO workflow_versions (name, version, definition, metadata, registered_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(&def.name)
        .bind(&def.version)
        .bind(&definition_json)
        .bind(&metadata_json)
        .bind(&registered_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RepositoryError::Conflict(format!(
                    "workflow '{}' version {} already exists",
                    def.name, def.version
                ))
            } else {
                RepositoryError::Query(e.to_string())
            }
        })?;

        sqlx::query(
            r#"INSERT INTO workflows (name, version, definition, metadata, registered_at)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT(name) DO UPDATE SET
                 version = excluded.version,
                 definition = excluded.definition,
                 metadata = excluded.metadata,
                 registered_at = excluded.registered_at"#,
        )
        .bind(&def.name)
        .bind(&def.version)
        .bind(&definition_json)
        .bind(&metadata_json)
        .bind(&registered_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn get_current(&self, name: &str) -> Result<Option<RegisteredWorkflow>, RepositoryError> {
        let row = sqlx::query(
            "SELECT definition, metadata, registered_at FROM workflows WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let r = WorkflowRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(r.into_registered()?))
            }
            None => Ok(None),
        }
    }

    async fn get_version(
        &self,
        name: &str,
        version: &str,
    ) -> Result<Option<RegisteredWorkflow>, RepositoryError> {
        let row = sqlx::query(
            "SELECT definition, metadata, registered_at FROM workflow_versions WHERE name = ? AND version = ?",
        )
        .bind(name)
        .bind(version)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let r = WorkflowRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(r.into_registered()?))
            }
            None => Ok(None),
        }
    }

    async fn list_current(&self) -> Result<Vec<RegisteredWorkflow>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT definition, metadata, registered_at FROM workflows ORDER BY name ASC",
        )
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        collect_rows(&rows)
    }

    async fn list_versions(&self) -> Result<Vec<RegisteredWorkflow>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT definition, metadata, registered_at FROM workflow_versions ORDER BY name ASC, rowid ASC",
        )
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        collect_rows(&rows)
    }
}
