//! Execution tracking types.
//!
//! An `Execution` is one runtime instance of a workflow. It moves through
//! `pending -> running -> completed | failed` and is never re-opened once it
//! reaches a terminal status. Per-step records keep unreached steps visible as
//! `pending` and log how many attempts each step took.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::TransitionError;

// ---------------------------------------------------------------------------
// Status enums
// ---------------------------------------------------------------------------

/// Lifecycle status of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    /// Whether no further transitions are allowed.
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Pending => write!(f, "pending"),
            ExecutionStatus::Running => write!(f, "running"),
            ExecutionStatus::Completed => write!(f, "completed"),
            ExecutionStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ExecutionStatus::Pending),
            "running" => Ok(ExecutionStatus::Running),
            "completed" => Ok(ExecutionStatus::Completed),
            "failed" => Ok(ExecutionStatus::Failed),
            other => Err(format!("invalid execution status: '{other}'")),
        }
    }
}

/// Status of an individual step within an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::Running => write!(f, "running"),
            StepStatus::Completed => write!(f, "completed"),
            StepStatus::Failed => write!(f, "failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// StepRecord
// ---------------------------------------------------------------------------

/// Per-step execution record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub status: StepStatus,
    /// Number of tool invocations made (first attempt included).
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl StepRecord {
    pub fn pending() -> Self {
        Self {
            status: StepStatus::Pending,
            attempts: 0,
            error: None,
            started_at: None,
            completed_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// ExecutionError
// ---------------------------------------------------------------------------

/// Category of an execution-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionErrorKind {
    /// A step's tool call failed after retries were exhausted.
    StepFailed,
    /// Unfinished steps could never become ready.
    Deadlock,
    /// The whole execution exceeded its timeout.
    Timeout,
    /// Engine-side failure (task panic, persistence).
    Internal,
}

/// Failure detail persisted on a failed execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionError {
    pub kind: ExecutionErrorKind,
    /// The step that triggered the failure, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// One runtime instance of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: Uuid,
    pub workflow_name: String,
    pub workflow_version: String,
    pub status: ExecutionStatus,
    /// Caller-supplied context, referenced as `${context.*}`.
    pub parameters: Value,
    /// Step outputs keyed by step ID.
    #[serde(default)]
    pub results: BTreeMap<String, Value>,
    /// Per-step status records keyed by step ID.
    #[serde(default)]
    pub steps: BTreeMap<String, StepRecord>,
    /// Final derived result, set on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Present iff `status == Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl Execution {
    /// Create a `pending` execution with a pending record for every step.
    pub fn new<'a>(
        id: Uuid,
        workflow_name: impl Into<String>,
        workflow_version: impl Into<String>,
        parameters: Value,
        step_ids: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self {
            id,
            workflow_name: workflow_name.into(),
            workflow_version: workflow_version.into(),
            status: ExecutionStatus::Pending,
            parameters,
            results: BTreeMap::new(),
            steps: step_ids
                .into_iter()
                .map(|id| (id.to_string(), StepRecord::pending()))
                .collect(),
            output: None,
            error: None,
            start_time: Utc::now(),
            end_time: None,
        }
    }

    /// `pending -> running`.
    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.transition(ExecutionStatus::Running)?;
        self.start_time = Utc::now();
        Ok(())
    }

    /// `running -> completed`, recording the derived output.
    pub fn complete(&mut self, output: Value) -> Result<(), TransitionError> {
        self.transition(ExecutionStatus::Completed)?;
        self.output = Some(output);
        self.end_time = Some(Utc::now());
        Ok(())
    }

    /// `pending | running -> failed`. Partial results are kept.
    pub fn fail(&mut self, error: ExecutionError) -> Result<(), TransitionError> {
        self.transition(ExecutionStatus::Failed)?;
        self.error = Some(error);
        self.end_time = Some(Utc::now());
        Ok(())
    }

    fn transition(&mut self, to: ExecutionStatus) -> Result<(), TransitionError> {
        let allowed = matches!(
            (self.status, to),
            (ExecutionStatus::Pending, ExecutionStatus::Running)
                | (ExecutionStatus::Running, ExecutionStatus::Completed)
                | (ExecutionStatus::Pending, ExecutionStatus::Failed)
                | (ExecutionStatus::Running, ExecutionStatus::Failed)
        );
        if !allowed {
            return Err(TransitionError {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Step IDs still in `pending` status, sorted.
    pub fn pending_steps(&self) -> Vec<String> {
        self.steps
            .iter()
            .filter(|(_, r)| r.status == StepStatus::Pending)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Mutable access to a step record, creating a pending one if missing.
    pub fn step_mut(&mut self, step_id: &str) -> &mut StepRecord {
        self.steps
            .entry(step_id.to_string())
            .or_insert_with(StepRecord::pending)
    }

    /// Wall-clock duration, if the execution has ended.
    pub fn duration_ms(&self) -> Option<i64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Execution {
        Execution::new(Uuid::now_v7(), "etl", "1.0.0", json!({ "x": 1 }), ["a", "b"])
    }

    #[test]
    fn test_new_execution_is_pending_with_step_records() {
        let exec = sample();
        assert_eq!(exec.status, ExecutionStatus::Pending);
        assert_eq!(exec.pending_steps(), vec!["a", "b"]);
        assert!(exec.results.is_empty());
        assert!(exec.error.is_none());
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut exec = sample();
        exec.start().unwrap();
        assert_eq!(exec.status, ExecutionStatus::Running);
        exec.complete(json!(2)).unwrap();
        assert_eq!(exec.status, ExecutionStatus::Completed);
        assert_eq!(exec.output, Some(json!(2)));
        assert!(exec.end_time.is_some());
    }

    #[test]
    fn test_terminal_state_rejects_further_transitions() {
        let mut exec = sample();
        exec.start().unwrap();
        exec.fail(ExecutionError {
            kind: ExecutionErrorKind::StepFailed,
            step_id: Some("a".into()),
            message: "boom".into(),
        })
        .unwrap();

        let err = exec.start().unwrap_err();
        assert_eq!(err.from, ExecutionStatus::Failed);
        assert_eq!(err.to, ExecutionStatus::Running);
        assert!(exec.complete(json!(null)).is_err());
        assert_eq!(exec.status, ExecutionStatus::Failed);
    }

    #[test]
    fn test_pending_cannot_complete_directly() {
        let mut exec = sample();
        assert!(exec.complete(json!({})).is_err());
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            ExecutionStatus::Pending,
            ExecutionStatus::Running,
            ExecutionStatus::Completed,
            ExecutionStatus::Failed,
        ] {
            assert_eq!(status.to_string().parse::<ExecutionStatus>().unwrap(), status);
        }
        assert!("paused".parse::<ExecutionStatus>().is_err());
    }

    #[test]
    fn test_execution_serializes_snake_case_status() {
        let exec = sample();
        let value = serde_json::to_value(&exec).unwrap();
        assert_eq!(value["status"], "pending");
        assert_eq!(value["steps"]["a"]["status"], "pending");
    }
}
