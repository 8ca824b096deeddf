//! `toolflow run`: execute a registered workflow in the foreground.

use anyhow::{Context, Result, bail};
use clap::Args;
use console::style;
use serde_json::Value;
use uuid::Uuid;

use toolflow_core::workflow::{ExecuteOptions, OrchestrationError};

use super::execution::print_execution;
use crate::state::AppState;

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Workflow name.
    pub name: String,

    /// Context parameters as a JSON object, or `@path` to read them from a file.
    #[arg(long, short = 'p')]
    pub params: Option<String>,

    /// Execution ID to use instead of a generated one.
    #[arg(long)]
    pub id: Option<Uuid>,

    /// Run a specific registered version.
    #[arg(id = "workflow_version", long = "workflow-version", value_name = "VERSION")]
    pub version: Option<String>,
}

pub async fn handle_run(args: RunArgs, state: &AppState, json: bool) -> Result<()> {
    if state.config.tool_endpoint.is_none() {
        bail!(
            "No tool endpoint configured. Set tool_endpoint in {} or pass --tool-endpoint.",
            state.data_dir.join("config.toml").display()
        );
    }

    let parameters = parse_params(args.params.as_deref()).await?;
    let execution_id = args.id.unwrap_or_else(Uuid::now_v7);

    let outcome = state
        .orchestrator
        .execute_workflow(
            &args.name,
            parameters,
            ExecuteOptions {
                execution_id: Some(execution_id),
                version: args.version,
            },
        )
        .await;

    match outcome {
        Ok(outcome) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
                return Ok(());
            }
            match state.orchestrator.get_execution(&outcome.execution_id).await {
                Ok(Some(execution)) => print_execution(&execution)?,
                _ => {
                    println!();
                    println!(
                        "  {} Execution {} completed",
                        style("*").green().bold(),
                        outcome.execution_id
                    );
                    println!("{}", serde_json::to_string_pretty(&outcome.result)?);
                    println!();
                }
            }
            Ok(())
        }
        Err(err) if err.is_execution_failure() => {
            // The failed record holds partial results worth showing
            if let Ok(Some(execution)) = state.orchestrator.get_execution(&execution_id).await {
                if json {
                    println!("{}", serde_json::to_string_pretty(&execution)?);
                } else {
                    print_execution(&execution)?;
                }
            }
            Err(err).with_context(|| format!("Workflow '{}' failed", args.name))
        }
        Err(OrchestrationError::WorkflowNotFound(name)) => {
            bail!(
                "Workflow '{name}' not found. Register it with: toolflow workflow register <file>"
            )
        }
        Err(err) => Err(err).with_context(|| format!("Could not run workflow '{}'", args.name)),
    }
}

/// Parse `--params`: absent means `{}`, `@path` reads a file, anything else is inline JSON.
async fn parse_params(raw: Option<&str>) -> Result<Value> {
    let Some(raw) = raw else {
        return Ok(Value::Object(Default::default()));
    };

    let text = match raw.strip_prefix('@') {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read parameters from {path}"))?,
        None => raw.to_string(),
    };

    let value: Value = serde_json::from_str(&text).context("Parameters must be valid JSON")?;
    if !value.is_object() {
        bail!("Parameters must be a JSON object");
    }
    Ok(value)
}
