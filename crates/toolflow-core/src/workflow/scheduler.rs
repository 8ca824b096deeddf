//! DAG scheduler: dependency-ordered, concurrency-bounded step dispatch.
//!
//! The scheduler loop owns the execution record. Ready steps are spawned on a
//! `JoinSet` up to the workflow's concurrency limit; each task receives the
//! interpolated params (built from the results recorded so far) and runs the
//! step through the retry executor. `join_next_with_id` is the only wake-up:
//! every settled step updates the record, releases its dependents, and
//! checkpoints progress.
//!
//! After a step fails nothing new is dispatched, but steps already in flight
//! are allowed to finish. If the loop drains with steps still pending and no
//! failure, the execution is deadlocked.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::task::JoinSet;
use toolflow_types::execution::{Execution, StepStatus};
use toolflow_types::workflow::WorkflowDefinition;

use super::dag::{self, DependencyGraph};
use super::error::OrchestrationError;
use super::interpolate;
use super::retry::{RetryExecutor, RetryPolicy, StepOutcome};
use super::state::ExecutionStateStore;
use crate::repository::ExecutionRepository;
use crate::storage::{CacheStore, LockService};

/// Settled step reported back to the scheduler loop.
struct StepReport {
    step_id: String,
    outcome: StepOutcome,
}

pub struct DagScheduler {
    retry: RetryExecutor,
    default_policy: RetryPolicy,
    default_concurrency_limit: u32,
}

impl DagScheduler {
    pub fn new(retry: RetryExecutor, default_policy: RetryPolicy, default_concurrency_limit: u32) -> Self {
        Self {
            retry,
            default_policy,
            default_concurrency_limit,
        }
    }

    /// Run every step of `definition` against a running `execution`.
    ///
    /// Updates step records and results in place and returns the final
    /// output. The caller owns the lifecycle transition and the final
    /// persist.
    pub async fn run<E, C, L>(
        &self,
        definition: &WorkflowDefinition,
        execution: &mut Execution,
        store: &ExecutionStateStore<E, C, L>,
        timeout: Duration,
    ) -> Result<Value, OrchestrationError>
    where
        E: ExecutionRepository,
        C: CacheStore,
        L: LockService,
    {
        let settled = tokio::time::timeout(timeout, self.drive(definition, execution, store)).await;
        match settled {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_elapsed) => {
                // Dropping the loop aborted its JoinSet; close out the
                // records of steps that were in flight.
                let now = Utc::now();
                for record in execution.steps.values_mut() {
                    if record.status == StepStatus::Running {
                        record.status = StepStatus::Failed;
                        record.error = Some("cancelled: execution timed out".to_string());
                        record.completed_at = Some(now);
                    }
                }
                tracing::warn!(
                    execution_id = %execution.id,
                    timeout_secs = timeout.as_secs(),
                    "execution timed out"
                );
                return Err(OrchestrationError::ExecutionTimeout {
                    execution_id: execution.id,
                    timeout,
                });
            }
        }

        let output = match &definition.output {
            Some(template) => {
                interpolate::resolve(template, &execution.parameters, &execution.results)
            }
            None => Value::Object(
                execution
                    .results
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
        };
        Ok(output)
    }

    async fn drive<E, C, L>(
        &self,
        definition: &WorkflowDefinition,
        execution: &mut Execution,
        store: &ExecutionStateStore<E, C, L>,
    ) -> Result<(), OrchestrationError>
    where
        E: ExecutionRepository,
        C: CacheStore,
        L: LockService,
    {
        let limit = definition
            .effective_concurrency_limit(self.default_concurrency_limit)
            .max(1) as usize;
        let mut graph = DependencyGraph::new(&definition.steps);
        let mut ready: VecDeque<String> = graph.initial_ready().into();
        let mut in_flight: JoinSet<StepReport> = JoinSet::new();
        let mut task_steps: HashMap<tokio::task::Id, String> = HashMap::new();
        let mut failure: Option<OrchestrationError> = None;

        loop {
            if failure.is_none() {
                while in_flight.len() < limit {
                    let Some(step_id) = ready.pop_front() else {
                        break;
                    };
                    let Some(step) = definition.step(&step_id) else {
                        continue;
                    };

                    let params =
                        interpolate::resolve(&step.params, &execution.parameters, &execution.results);
                    if interpolate::has_templates(&params) {
                        tracing::debug!(
                            execution_id = %execution.id,
                            step_id = step_id.as_str(),
                            "step params keep unresolved templates"
                        );
                    }
                    let policy = self.default_policy.with_override(step.retry.as_ref());
                    let record = execution.step_mut(&step_id);
                    record.status = StepStatus::Running;
                    record.started_at = Some(Utc::now());

                    tracing::debug!(
                        execution_id = %execution.id,
                        step_id = step_id.as_str(),
                        tool = step.tool.as_str(),
                        "dispatching step"
                    );

                    let retry = self.retry.clone();
                    let tool = step.tool.clone();
                    let report_id = step_id.clone();
                    let handle = in_flight.spawn(async move {
                        let outcome = retry.run_step(&tool, &params, &policy).await;
                        StepReport {
                            step_id: report_id,
                            outcome,
                        }
                    });
                    task_steps.insert(handle.id(), step_id);
                }
            }

            let Some(joined) = in_flight.join_next_with_id().await else {
                break;
            };

            match joined {
                Ok((task_id, report)) => {
                    task_steps.remove(&task_id);
                    let StepReport { step_id, outcome } = report;
                    let record = execution.step_mut(&step_id);
                    record.attempts = outcome.attempts;
                    record.completed_at = Some(Utc::now());

                    match outcome.result {
                        Ok(value) => {
                            record.status = StepStatus::Completed;
                            tracing::info!(
                                execution_id = %execution.id,
                                step_id = step_id.as_str(),
                                attempts = outcome.attempts,
                                "step completed"
                            );
                            execution.results.insert(step_id.clone(), value);
                            ready.extend(graph.complete(&step_id));
                        }
                        Err(err) => {
                            record.status = StepStatus::Failed;
                            record.error = Some(err.to_string());
                            tracing::warn!(
                                execution_id = %execution.id,
                                step_id = step_id.as_str(),
                                attempts = outcome.attempts,
                                error = %err,
                                "step failed"
                            );
                            failure.get_or_insert(OrchestrationError::StepFailed {
                                execution_id: execution.id,
                                step_id,
                                attempts: outcome.attempts,
                                source: err,
                            });
                        }
                    }
                }
                Err(join_err) => {
                    let step_id = task_steps.remove(&join_err.id()).unwrap_or_default();
                    let message = format!("step task for '{step_id}' aborted: {join_err}");
                    tracing::error!(execution_id = %execution.id, step_id = step_id.as_str(), "{message}");
                    if !step_id.is_empty() {
                        let record = execution.step_mut(&step_id);
                        record.status = StepStatus::Failed;
                        record.error = Some(message.clone());
                        record.completed_at = Some(Utc::now());
                    }
                    failure.get_or_insert(OrchestrationError::Internal(message));
                }
            }

            store.checkpoint(execution).await;
        }

        if let Some(err) = failure {
            return Err(err);
        }

        let pending = execution.pending_steps();
        if !pending.is_empty() {
            let cycles = dag::find_cycles(&definition.steps, &pending);
            tracing::warn!(
                execution_id = %execution.id,
                pending = ?pending,
                cycles = ?cycles,
                "execution deadlocked"
            );
            return Err(OrchestrationError::Deadlock {
                execution_id: execution.id,
                pending,
                cycles,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use toolflow_types::execution::StepStatus;
    use toolflow_types::workflow::StepSpec;
    use uuid::Uuid;

    use super::*;
    use crate::repository::InMemoryExecutionRepository;
    use crate::storage::MemoryCache;
    use crate::tool::{BoxToolExecutor, ToolError};
    use crate::workflow::test_support::ScriptedTools;

    type TestStore = ExecutionStateStore<InMemoryExecutionRepository, MemoryCache, Arc<MemoryCache>>;

    fn test_store() -> TestStore {
        let cache = Arc::new(MemoryCache::new());
        ExecutionStateStore::new(
            InMemoryExecutionRepository::new(),
            cache.clone(),
            cache,
            Duration::from_secs(60),
        )
    }

    fn scheduler(tools: &Arc<ScriptedTools>) -> DagScheduler {
        DagScheduler::new(
            RetryExecutor::new(BoxToolExecutor::from_arc(tools.clone())),
            RetryPolicy {
                max_retries: 0,
                retry_delay: Duration::from_millis(1),
                timeout: Duration::from_secs(5),
            },
            5,
        )
    }

    async fn start(store: &TestStore, def: &WorkflowDefinition, params: Value) -> Execution {
        let mut exec = Execution::new(
            Uuid::now_v7(),
            def.name.as_str(),
            "1.0.0",
            params,
            def.steps.iter().map(|s| s.id.as_str()),
        );
        store.create(&exec).await.unwrap();
        exec.start().unwrap();
        exec
    }

    #[tokio::test]
    async fn test_steps_run_after_their_dependencies() {
        let tools = ScriptedTools::echo();
        let def = WorkflowDefinition::new(
            "wf",
            vec![
                StepSpec::new("d", "t", &["b", "c"]),
                StepSpec::new("b", "t", &["a"]),
                StepSpec::new("c", "t", &["a"]),
                StepSpec::new("a", "t", &[]),
            ],
        );
        let store = test_store();
        let mut exec = start(&store, &def, json!({})).await;

        scheduler(&tools)
            .run(&def, &mut exec, &store, Duration::from_secs(5))
            .await
            .unwrap();

        let steps = &exec.steps;
        for (step, dep) in [("b", "a"), ("c", "a"), ("d", "b"), ("d", "c")] {
            assert!(
                steps[step].started_at.unwrap() >= steps[dep].completed_at.unwrap(),
                "{step} started before {dep} completed"
            );
        }
        assert_eq!(tools.calls(), 4);
    }

    #[tokio::test]
    async fn test_results_flow_into_dependent_params_and_output() {
        let tools = ScriptedTools::new(|tool, params| match tool {
            "t1" => Ok(json!({ "value": 1 })),
            "t2" => {
                let input = params["input"].as_i64().unwrap_or(0);
                Ok(json!({ "value": input + 1 }))
            }
            other => Err(ToolError::NotFound(other.to_string())),
        });
        let mut def = WorkflowDefinition::new(
            "wf",
            vec![
                StepSpec::new("a", "t1", &[]),
                StepSpec::new("b", "t2", &["a"]).with_params(json!({ "input": "${steps.a.value}" })),
            ],
        );
        def.output = Some(json!("${steps.b.value}"));

        let store = test_store();
        let mut exec = start(&store, &def, json!({})).await;
        let output = scheduler(&tools)
            .run(&def, &mut exec, &store, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(output, json!(2));
    }

    #[tokio::test]
    async fn test_without_output_template_returns_results_map() {
        let tools = ScriptedTools::echo();
        let def = WorkflowDefinition::new(
            "wf",
            vec![StepSpec::new("a", "t", &[]).with_params(json!({ "x": "${context.x}" }))],
        );
        let store = test_store();
        let mut exec = start(&store, &def, json!({ "x": 7 })).await;
        let output = scheduler(&tools)
            .run(&def, &mut exec, &store, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(output, json!({ "a": { "x": 7 } }));
    }

    #[tokio::test]
    async fn test_unresolved_templates_reach_the_tool_verbatim() {
        let tools = ScriptedTools::echo();
        let def = WorkflowDefinition::new(
            "wf",
            vec![StepSpec::new("a", "t", &[]).with_params(
                json!({ "x": "${context.x}", "y": "${context.missing}", "z": "id-${steps.ghost.id}" }),
            )],
        );
        let store = test_store();
        let mut exec = start(&store, &def, json!({ "x": 7 })).await;
        let output = scheduler(&tools)
            .run(&def, &mut exec, &store, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(
            output["a"],
            json!({ "x": 7, "y": "${context.missing}", "z": "id-${steps.ghost.id}" })
        );
        assert!(interpolate::has_templates(&output["a"]));
    }

    #[tokio::test]
    async fn test_concurrency_limit_bounds_in_flight_steps() {
        let tools = ScriptedTools::echo().with_delay(Duration::from_millis(40));
        let mut def = WorkflowDefinition::new(
            "wide",
            (0..5)
                .map(|i| StepSpec::new(format!("s{i}"), "t", &[]))
                .collect(),
        );
        def.concurrency_limit = Some(2);

        let store = test_store();
        let mut exec = start(&store, &def, json!({})).await;
        scheduler(&tools)
            .run(&def, &mut exec, &store, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(tools.calls(), 5);
        assert_eq!(tools.max_in_flight(), 2);
    }

    #[tokio::test]
    async fn test_cycle_deadlocks_naming_every_cycle_step() {
        let tools = ScriptedTools::echo();
        let def = WorkflowDefinition::new(
            "loop",
            vec![
                StepSpec::new("a", "t", &["c"]),
                StepSpec::new("b", "t", &["a"]),
                StepSpec::new("c", "t", &["b"]),
            ],
        );
        let store = test_store();
        let mut exec = start(&store, &def, json!({})).await;
        let err = scheduler(&tools)
            .run(&def, &mut exec, &store, Duration::from_secs(5))
            .await
            .unwrap_err();

        match err {
            OrchestrationError::Deadlock { pending, cycles, .. } => {
                assert_eq!(pending, vec!["a", "b", "c"]);
                assert_eq!(cycles, vec![vec!["a", "b", "c"]]);
            }
            other => panic!("expected deadlock, got {other:?}"),
        }
        assert_eq!(tools.calls(), 0);
    }

    #[tokio::test]
    async fn test_failure_stops_dispatch_but_lets_siblings_finish() {
        let tools = ScriptedTools::new(|tool, _| match tool {
            "boom" => Err(ToolError::Failed("exploded".into())),
            _ => Ok(json!("ok")),
        })
        .with_tool_delay("fine", Duration::from_millis(50));
        let mut def = WorkflowDefinition::new(
            "wf",
            vec![
                StepSpec::new("bad", "boom", &[]),
                StepSpec::new("sibling", "fine", &[]),
                StepSpec::new("after", "fine", &["sibling"]),
            ],
        );
        def.concurrency_limit = Some(2);

        let store = test_store();
        let mut exec = start(&store, &def, json!({})).await;
        let err = scheduler(&tools)
            .run(&def, &mut exec, &store, Duration::from_secs(5))
            .await
            .unwrap_err();

        match &err {
            OrchestrationError::StepFailed { step_id, attempts, .. } => {
                assert_eq!(step_id, "bad");
                assert_eq!(*attempts, 1);
            }
            other => panic!("expected step failure, got {other:?}"),
        }
        assert_eq!(exec.steps["bad"].status, StepStatus::Failed);
        assert_eq!(exec.steps["sibling"].status, StepStatus::Completed);
        assert_eq!(exec.results["sibling"], json!("ok"));
        assert_eq!(exec.steps["after"].status, StepStatus::Pending);
        assert_eq!(tools.calls(), 2);
    }

    #[tokio::test]
    async fn test_progress_is_checkpointed_while_running() {
        let tools = ScriptedTools::echo();
        let def = WorkflowDefinition::new(
            "wf",
            vec![StepSpec::new("a", "t", &[]), StepSpec::new("b", "t", &["a"])],
        );
        let store = test_store();
        let mut exec = start(&store, &def, json!({})).await;
        scheduler(&tools)
            .run(&def, &mut exec, &store, Duration::from_secs(5))
            .await
            .unwrap();

        let stored = store.get(&exec.id).await.unwrap().unwrap();
        assert_eq!(stored.results.len(), 2);
        assert_eq!(stored.steps["b"].status, StepStatus::Completed);
        assert_eq!(stored.steps["a"].attempts, 1);
    }

    #[tokio::test]
    async fn test_execution_timeout_fails_running_steps() {
        let tools = ScriptedTools::echo().with_delay(Duration::from_secs(10));
        let def = WorkflowDefinition::new("slow", vec![StepSpec::new("a", "t", &[])]);
        let store = test_store();
        let mut exec = start(&store, &def, json!({})).await;
        let err = scheduler(&tools)
            .run(&def, &mut exec, &store, Duration::from_millis(50))
            .await
            .unwrap_err();

        assert!(matches!(err, OrchestrationError::ExecutionTimeout { .. }));
        assert_eq!(exec.steps["a"].status, StepStatus::Failed);
    }
}
