//! Workflow registry: validation, versioning, and read-through lookup.
//!
//! Definitions are written to the durable repository first and then cached
//! under `workflow:{name}` (current) and `workflow:{name}:{version}`.

use std::sync::Arc;
use std::time::Duration;

use toolflow_types::error::RepositoryError;
use toolflow_types::workflow::{DEFAULT_WORKFLOW_VERSION, RegisteredWorkflow, WorkflowDefinition};

use super::definition::{bump_patch, compute_metadata, validate_definition};
use super::error::{OrchestrationError, ValidationErrors};
use crate::repository::WorkflowRepository;
use crate::storage::CacheStore;

/// Options for [`WorkflowRegistry::register`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterOptions {
    /// Explicit version for this registration.
    pub version: Option<String>,
    /// Replace the current definition of an existing name with a new version.
    pub overwrite: bool,
}

fn current_key(name: &str) -> String {
    format!("workflow:{name}")
}

fn version_key(name: &str, version: &str) -> String {
    format!("workflow:{name}:{version}")
}

pub struct WorkflowRegistry<R, C> {
    repo: R,
    cache: Arc<C>,
    cache_ttl: Duration,
}

impl<R, C> WorkflowRegistry<R, C>
where
    R: WorkflowRepository,
    C: CacheStore,
{
    pub fn new(repo: R, cache: Arc<C>, cache_ttl: Duration) -> Self {
        Self {
            repo,
            cache,
            cache_ttl,
        }
    }

    /// Validate and store a definition, assigning its version.
    ///
    /// Version selection:
    /// - first registration: `options.version`, else the definition's own
    ///   version, else `1.0.0`
    /// - overwrite: `options.version`, else the definition's version when it
    ///   differs from the current one, else the current version with its
    ///   patch component bumped
    pub async fn register(
        &self,
        mut definition: WorkflowDefinition,
        options: &RegisterOptions,
    ) -> Result<RegisteredWorkflow, OrchestrationError> {
        validate_definition(&definition)?;

        let current = self.get(&definition.name, None).await?;
        let version = match &current {
            None => options
                .version
                .clone()
                .or_else(|| non_empty(&definition.version))
                .unwrap_or_else(|| DEFAULT_WORKFLOW_VERSION.to_string()),
            Some(existing) if !options.overwrite => {
                return Err(OrchestrationError::AlreadyExists {
                    name: definition.name,
                    version: existing.definition.version.clone(),
                });
            }
            Some(existing) => {
                let current_version = &existing.definition.version;
                match options.version.clone() {
                    Some(v) => v,
                    None => match non_empty(&definition.version) {
                        Some(v) if &v != current_version => v,
                        _ => bump_patch(current_version).map_err(|e| {
                            ValidationErrors(vec![format!(
                                "current version '{current_version}' cannot be bumped: {e}"
                            )])
                        })?,
                    },
                }
            }
        };

        if let Err(e) = semver::Version::parse(&version) {
            return Err(ValidationErrors(vec![format!(
                "version '{version}' is not a valid semantic version: {e}"
            )])
            .into());
        }
        definition.version = version;

        let registered = RegisteredWorkflow {
            metadata: compute_metadata(&definition),
            definition,
        };

        match self.repo.save_definition(&registered).await {
            Ok(()) => {}
            Err(RepositoryError::Conflict(_)) => {
                return Err(OrchestrationError::AlreadyExists {
                    name: registered.definition.name,
                    version: registered.definition.version,
                });
            }
            Err(e) => return Err(e.into()),
        }

        let name = &registered.definition.name;
        self.write_cache(&current_key(name), &registered).await;
        self.write_cache(&version_key(name, &registered.definition.version), &registered)
            .await;

        tracing::info!(
            workflow = name.as_str(),
            version = registered.definition.version.as_str(),
            steps = registered.metadata.step_count,
            complexity = %registered.metadata.complexity,
            "registered workflow"
        );
        Ok(registered)
    }

    /// Current definition for `name`, or a specific `version`.
    pub async fn get(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<Option<RegisteredWorkflow>, RepositoryError> {
        let key = match version {
            Some(v) => version_key(name, v),
            None => current_key(name),
        };

        match self.cache.get(&key).await {
            Ok(Some(cached)) => match serde_json::from_value::<RegisteredWorkflow>(cached) {
                Ok(workflow) => return Ok(Some(workflow)),
                Err(e) => tracing::warn!(workflow = name, error = %e, "discarding unreadable cache entry"),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!(workflow = name, error = %e, "cache read failed, using durable store"),
        }

        let found = match version {
            Some(v) => self.repo.get_version(name, v).await?,
            None => self.repo.get_current(name).await?,
        };
        if let Some(workflow) = &found {
            self.write_cache(&key, workflow).await;
        }
        Ok(found)
    }

    /// Current definitions, or every stored version when `include_versions`.
    pub async fn list_all(
        &self,
        include_versions: bool,
    ) -> Result<Vec<RegisteredWorkflow>, RepositoryError> {
        if include_versions {
            self.repo.list_versions().await
        } else {
            self.repo.list_current().await
        }
    }

    async fn write_cache(&self, key: &str, workflow: &RegisteredWorkflow) {
        let value = match serde_json::to_value(workflow) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to encode workflow for cache");
                return;
            }
        };
        if let Err(e) = self.cache.set(key, value, Some(self.cache_ttl)).await {
            tracing::warn!(key, error = %e, "failed to write workflow cache");
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}
