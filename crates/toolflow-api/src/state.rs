//! Application state wiring the orchestrator to its concrete adapters.
//!
//! The engine is generic over its repositories, cache, and lock service;
//! AppState pins it to SQLite storage, the in-process cache, and the HTTP
//! tool executor.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use toolflow_core::storage::MemoryCache;
use toolflow_core::tool::BoxToolExecutor;
use toolflow_core::workflow::Orchestrator;
use toolflow_infra::config::{default_data_dir, load_engine_config};
use toolflow_infra::sqlite::{
    DatabasePool, SqliteExecutionRepository, SqliteLockService, SqliteWorkflowRepository,
};
use toolflow_infra::tool::HttpToolExecutor;
use toolflow_types::config::EngineConfig;

pub type ConcreteOrchestrator = Orchestrator<
    SqliteWorkflowRepository,
    SqliteExecutionRepository,
    MemoryCache,
    SqliteLockService,
>;

/// Shared application state for CLI commands.
pub struct AppState {
    pub orchestrator: ConcreteOrchestrator,
    pub config: EngineConfig,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Resolve the data directory and open the engine there.
    pub async fn init(tool_endpoint: Option<String>) -> anyhow::Result<Self> {
        Self::open(&default_data_dir(), tool_endpoint).await
    }

    /// Open the engine rooted at `data_dir`.
    ///
    /// `tool_endpoint`, when given, overrides the one from `config.toml`.
    pub async fn open(data_dir: &Path, tool_endpoint: Option<String>) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(data_dir)
            .await
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

        let mut config = load_engine_config(data_dir).await;
        if tool_endpoint.is_some() {
            config.tool_endpoint = tool_endpoint;
        }

        let db_url = format!(
            "sqlite://{}?mode=rwc",
            data_dir.join("toolflow.db").display()
        );
        let db_pool = DatabasePool::new(&db_url)
            .await
            .with_context(|| format!("Failed to open database at {db_url}"))?;

        let tools = HttpToolExecutor::new(config.tool_endpoint.clone().unwrap_or_default());

        let orchestrator = Orchestrator::new(
            &config,
            SqliteWorkflowRepository::new(db_pool.clone()),
            SqliteExecutionRepository::new(db_pool.clone()),
            Arc::new(MemoryCache::new()),
            SqliteLockService::new(db_pool),
            BoxToolExecutor::new(tools),
        );

        tracing::debug!(data_dir = %data_dir.display(), "engine ready");

        Ok(Self {
            orchestrator,
            config,
            data_dir: data_dir.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolflow_core::workflow::RegisterOptions;
    use toolflow_types::workflow::{StepSpec, WorkflowDefinition};

    #[tokio::test]
    async fn test_open_creates_database_and_persists_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let data_dir = tmp.path().join("data");

        let state = AppState::open(&data_dir, None).await.unwrap();
        assert!(data_dir.join("toolflow.db").exists());
        state
            .orchestrator
            .register_workflow(
                WorkflowDefinition::new("etl", vec![StepSpec::new("a", "t", &[])]),
                RegisterOptions::default(),
            )
            .await
            .unwrap();
        drop(state);

        let reopened = AppState::open(&data_dir, None).await.unwrap();
        let wf = reopened.orchestrator.get_workflow("etl", None).await.unwrap();
        assert_eq!(wf.unwrap().definition.version, "1.0.0");
    }

    #[tokio::test]
    async fn test_tool_endpoint_override_beats_config_file() {
        let tmp = tempfile::tempdir().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            "tool_endpoint = \"http://from-config\"\n",
        )
        .await
        .unwrap();

        let state = AppState::open(tmp.path(), None).await.unwrap();
        assert_eq!(state.config.tool_endpoint.as_deref(), Some("http://from-config"));

        let state = AppState::open(tmp.path(), Some("http://from-flag".into()))
            .await
            .unwrap();
        assert_eq!(state.config.tool_endpoint.as_deref(), Some("http://from-flag"));
    }
}
