//! In-process repository implementations backed by `DashMap`.
//!
//! Useful when the engine is embedded without a database, and as the durable
//! store in core tests.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use toolflow_types::error::RepositoryError;
use toolflow_types::execution::Execution;
use toolflow_types::workflow::RegisteredWorkflow;
use uuid::Uuid;

use super::execution::ExecutionRepository;
use super::workflow::WorkflowRepository;

// ---------------------------------------------------------------------------
// Workflows
// ---------------------------------------------------------------------------

/// In-memory `WorkflowRepository`.
#[derive(Debug, Default)]
pub struct InMemoryWorkflowRepository {
    current: DashMap<String, RegisteredWorkflow>,
    versions: DashMap<(String, String), RegisteredWorkflow>,
}

impl InMemoryWorkflowRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn save_definition(&self, workflow: &RegisteredWorkflow) -> Result<(), RepositoryError> {
        let def = &workflow.definition;
        match self.versions.entry((def.name.clone(), def.version.clone())) {
            Entry::Occupied(_) => {
                return Err(RepositoryError::Conflict(format!(
                    "workflow '{}' version {} already exists",
                    def.name, def.version
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(workflow.clone());
            }
        }
        self.current.insert(def.name.clone(), workflow.clone());
        Ok(())
    }

    async fn get_current(&self, name: &str) -> Result<Option<RegisteredWorkflow>, RepositoryError> {
        Ok(self.current.get(name).map(|w| w.clone()))
    }

    async fn get_version(
        &self,
        name: &str,
        version: &str,
    ) -> Result<Option<RegisteredWorkflow>, RepositoryError> {
        Ok(self
            .versions
            .get(&(name.to_string(), version.to_string()))
            .map(|w| w.clone()))
    }

    async fn list_current(&self) -> Result<Vec<RegisteredWorkflow>, RepositoryError> {
        let mut all: Vec<RegisteredWorkflow> =
            self.current.iter().map(|w| w.value().clone()).collect();
        all.sort_by(|a, b| a.definition.name.cmp(&b.definition.name));
        Ok(all)
    }

    async fn list_versions(&self) -> Result<Vec<RegisteredWorkflow>, RepositoryError> {
        let mut all: Vec<RegisteredWorkflow> =
            self.versions.iter().map(|w| w.value().clone()).collect();
        all.sort_by(|a, b| {
            a.definition
                .name
                .cmp(&b.definition.name)
                .then(a.metadata.registered_at.cmp(&b.metadata.registered_at))
        });
        Ok(all)
    }
}

// ---------------------------------------------------------------------------
// Executions
// ---------------------------------------------------------------------------

/// In-memory `ExecutionRepository`.
#[derive(Debug, Default)]
pub struct InMemoryExecutionRepository {
    executions: DashMap<Uuid, Execution>,
}

impl InMemoryExecutionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExecutionRepository for InMemoryExecutionRepository {
    async fn insert_execution(&self, execution: &Execution) -> Result<(), RepositoryError> {
        match self.executions.entry(execution.id) {
            Entry::Occupied(_) => Err(RepositoryError::Conflict(format!(
                "execution {} already exists",
                execution.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(execution.clone());
                Ok(())
            }
        }
    }

    async fn update_execution(&self, execution: &Execution) -> Result<(), RepositoryError> {
        match self.executions.get_mut(&execution.id) {
            Some(mut row) => {
                *row = execution.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn get_execution(&self, id: &Uuid) -> Result<Option<Execution>, RepositoryError> {
        Ok(self.executions.get(id).map(|e| e.clone()))
    }

    async fn list_executions(
        &self,
        workflow_name: &str,
        limit: u32,
    ) -> Result<Vec<Execution>, RepositoryError> {
        let mut matching: Vec<Execution> = self
            .executions
            .iter()
            .filter(|e| e.workflow_name == workflow_name)
            .map(|e| e.value().clone())
            .collect();
        matching.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        matching.truncate(limit as usize);
        Ok(matching)
    }
}
