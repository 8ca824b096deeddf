//! Workflow definition types.
//!
//! `WorkflowDefinition` is the canonical representation of a registered
//! workflow: YAML files, JSON payloads, and programmatic construction all
//! produce this struct. Registration derives a `WorkflowMetadata` summary that
//! is stored next to the definition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Concurrency limit applied when neither the definition nor the engine
/// configuration sets one.
pub const DEFAULT_CONCURRENCY_LIMIT: u32 = 5;

/// Version assigned on first registration when neither the definition nor the
/// registration options carry one.
pub const DEFAULT_WORKFLOW_VERSION: &str = "1.0.0";

// ---------------------------------------------------------------------------
// WorkflowDefinition
// ---------------------------------------------------------------------------

/// A named, versioned DAG of tool-invoking steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Unique workflow name (registry key).
    pub name: String,
    /// Semantic version string. Filled in by the registry when empty.
    #[serde(default)]
    pub version: String,
    /// Optional longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Ordered list of steps forming the DAG.
    pub steps: Vec<StepSpec>,
    /// Template deriving the final result from step results. When absent the
    /// raw results map is returned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Maximum number of steps in flight at once for a single execution.
    /// Falls back to the engine default when absent.
    #[serde(
        default,
        alias = "concurrencyLimit",
        skip_serializing_if = "Option::is_none"
    )]
    pub concurrency_limit: Option<u32>,
    /// Whole-execution timeout in seconds (overrides the engine default).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl WorkflowDefinition {
    /// Convenience constructor with default version, limit, and no output template.
    pub fn new(name: impl Into<String>, steps: Vec<StepSpec>) -> Self {
        Self {
            name: name.into(),
            version: String::new(),
            description: None,
            steps,
            output: None,
            concurrency_limit: None,
            timeout_secs: None,
        }
    }

    /// The definition's own limit, or `default` when it has none.
    pub fn effective_concurrency_limit(&self, default: u32) -> u32 {
        self.concurrency_limit.unwrap_or(default)
    }

    /// Look up a step by ID.
    pub fn step(&self, id: &str) -> Option<&StepSpec> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Number of distinct dependency edges across all steps.
    pub fn dependency_count(&self) -> usize {
        self.steps
            .iter()
            .map(|s| {
                let mut deps: Vec<&str> = s.dependencies.iter().map(String::as_str).collect();
                deps.sort_unstable();
                deps.dedup();
                deps.len()
            })
            .sum()
    }
}

// ---------------------------------------------------------------------------
// StepSpec
// ---------------------------------------------------------------------------

/// A single tool invocation inside a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSpec {
    /// Step ID, unique within the workflow.
    pub id: String,
    /// Tool identifier resolved by the tool executor.
    pub tool: String,
    /// Parameters passed to the tool; string values may contain
    /// `${context.*}` / `${steps.*}` templates.
    #[serde(default = "empty_params")]
    pub params: Value,
    /// Step IDs that must complete before this step runs.
    #[serde(default, alias = "depends_on", alias = "deps")]
    pub dependencies: Vec<String>,
    /// Duration hint, only used for estimation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<StepComplexity>,
    /// Per-step retry/timeout override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryOverride>,
}

fn empty_params() -> Value {
    Value::Object(serde_json::Map::new())
}

impl StepSpec {
    /// Build a step with the given ID, tool, and dependencies and empty params.
    pub fn new(id: impl Into<String>, tool: impl Into<String>, dependencies: &[&str]) -> Self {
        Self {
            id: id.into(),
            tool: tool.into(),
            params: empty_params(),
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            complexity: None,
            retry: None,
        }
    }

    /// Replace the step's params.
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }
}

/// Coarse per-step duration hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepComplexity {
    Low,
    Medium,
    High,
}

impl StepComplexity {
    /// Estimated duration of one invocation at this complexity.
    pub fn estimated_duration_ms(self) -> u64 {
        match self {
            StepComplexity::Low => 1_000,
            StepComplexity::Medium => 5_000,
            StepComplexity::High => 15_000,
        }
    }
}

/// Optional per-step overrides of the engine's retry policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Registration metadata
// ---------------------------------------------------------------------------

/// Coarse structural classification of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowComplexity {
    Simple,
    Medium,
    Complex,
}

impl WorkflowComplexity {
    /// Classify by step count and total dependency edges.
    ///
    /// - simple: at most 3 steps and at most 2 edges
    /// - medium: at most 10 steps and at most 8 edges
    /// - complex: everything else
    pub fn classify(step_count: usize, dependency_count: usize) -> Self {
        if step_count <= 3 && dependency_count <= 2 {
            WorkflowComplexity::Simple
        } else if step_count <= 10 && dependency_count <= 8 {
            WorkflowComplexity::Medium
        } else {
            WorkflowComplexity::Complex
        }
    }
}

impl std::fmt::Display for WorkflowComplexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowComplexity::Simple => write!(f, "simple"),
            WorkflowComplexity::Medium => write!(f, "medium"),
            WorkflowComplexity::Complex => write!(f, "complex"),
        }
    }
}

/// Metadata derived from a definition at registration time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    pub step_count: usize,
    pub dependency_count: usize,
    pub complexity: WorkflowComplexity,
    /// Sum of step estimates along the longest dependency chain.
    pub estimated_duration_ms: u64,
    pub registered_at: DateTime<Utc>,
}

/// A definition together with its registration metadata, as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredWorkflow {
    pub definition: WorkflowDefinition,
    pub metadata: WorkflowMetadata,
}
