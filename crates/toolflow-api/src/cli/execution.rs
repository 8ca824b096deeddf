//! CLI execution subcommands: show, list.

use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use uuid::Uuid;

use toolflow_types::execution::{Execution, ExecutionStatus, StepStatus};

use super::workflow::format_duration_ms;
use crate::state::AppState;

#[derive(Debug, Subcommand)]
pub enum ExecutionCommand {
    /// Show an execution record with per-step status.
    Show {
        /// Execution UUID.
        id: Uuid,
    },

    /// List recent executions of a workflow, newest first.
    #[command(alias = "ls")]
    List {
        /// Workflow name.
        workflow: String,

        /// Maximum number of executions to display.
        #[arg(long, default_value = "20")]
        limit: u32,
    },
}

pub async fn handle_execution_command(
    cmd: ExecutionCommand,
    state: &AppState,
    json: bool,
) -> Result<()> {
    match cmd {
        ExecutionCommand::Show { id } => handle_show(id, state, json).await,
        ExecutionCommand::List { workflow, limit } => {
            handle_list(&workflow, limit, state, json).await
        }
    }
}

async fn handle_show(id: Uuid, state: &AppState, json: bool) -> Result<()> {
    let execution = state
        .orchestrator
        .get_execution(&id)
        .await
        .context("Failed to look up execution")?
        .ok_or_else(|| anyhow::anyhow!("Execution {id} not found"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&execution)?);
    } else {
        print_execution(&execution)?;
    }
    Ok(())
}

async fn handle_list(workflow: &str, limit: u32, state: &AppState, json: bool) -> Result<()> {
    let executions = state
        .orchestrator
        .list_executions(workflow, limit)
        .await
        .context("Failed to list executions")?;

    if json {
        let out: Vec<_> = executions
            .iter()
            .map(|e| {
                serde_json::json!({
                    "id": e.id.to_string(),
                    "version": e.workflow_version,
                    "status": e.status.to_string(),
                    "start_time": e.start_time.to_rfc3339(),
                    "end_time": e.end_time.map(|t| t.to_rfc3339()),
                    "duration_ms": e.duration_ms(),
                    "error": e.error.as_ref().map(|err| &err.message),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if executions.is_empty() {
        println!();
        println!("  No executions for workflow '{workflow}'.");
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Execution").fg(Color::Cyan),
            Cell::new("Version"),
            Cell::new("Status"),
            Cell::new("Started"),
            Cell::new("Duration"),
            Cell::new("Error"),
        ]);

    for e in &executions {
        let error = e
            .error
            .as_ref()
            .map(|err| err.message.chars().take(40).collect::<String>())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(e.id),
            Cell::new(&e.workflow_version),
            status_cell(e.status),
            Cell::new(e.start_time.format("%Y-%m-%d %H:%M:%S").to_string()),
            Cell::new(duration_text(e)),
            Cell::new(error),
        ]);
    }

    println!();
    println!("{table}");
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Styled multi-line view of one execution.
pub(crate) fn print_execution(execution: &Execution) -> Result<()> {
    println!();
    println!(
        "  {} {} {}",
        style(&execution.workflow_name).cyan().bold(),
        style(format!("v{}", execution.workflow_version)).dim(),
        styled_status(execution.status)
    );
    println!("  Execution: {}", execution.id);
    println!(
        "  Started: {}  Duration: {}",
        execution.start_time.format("%Y-%m-%d %H:%M:%S UTC"),
        duration_text(execution)
    );
    if let Some(err) = &execution.error {
        let step = err
            .step_id
            .as_ref()
            .map(|s| format!(" (step '{s}')"))
            .unwrap_or_default();
        println!("  {} {}{}", style("Error:").red().bold(), err.message, step);
    }
    println!();

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Step").fg(Color::Cyan),
            Cell::new("Status"),
            Cell::new("Attempts"),
            Cell::new("Error"),
        ]);
    for (step_id, record) in &execution.steps {
        table.add_row(vec![
            Cell::new(step_id),
            step_status_cell(record.status),
            Cell::new(record.attempts),
            Cell::new(record.error.as_deref().unwrap_or("-")),
        ]);
    }
    println!("{table}");

    if let Some(output) = &execution.output {
        println!();
        println!("{}", style("  Output").bold());
        for line in serde_json::to_string_pretty(output)?.lines() {
            println!("    {line}");
        }
    }
    println!();

    Ok(())
}

fn duration_text(execution: &Execution) -> String {
    execution
        .duration_ms()
        .and_then(|ms| u64::try_from(ms).ok())
        .map(format_duration_ms)
        .unwrap_or_else(|| "-".to_string())
}

fn styled_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("pending").yellow().to_string(),
        ExecutionStatus::Running => style("running").blue().to_string(),
        ExecutionStatus::Completed => style("completed").green().to_string(),
        ExecutionStatus::Failed => style("failed").red().to_string(),
    }
}

fn status_cell(status: ExecutionStatus) -> Cell {
    match status {
        ExecutionStatus::Pending => Cell::new("pending").fg(Color::Yellow),
        ExecutionStatus::Running => Cell::new("running").fg(Color::Blue),
        ExecutionStatus::Completed => Cell::new("completed").fg(Color::Green),
        ExecutionStatus::Failed => Cell::new("failed").fg(Color::Red),
    }
}

fn step_status_cell(status: StepStatus) -> Cell {
    match status {
        StepStatus::Pending => Cell::new("pending").fg(Color::DarkGrey),
        StepStatus::Running => Cell::new("running").fg(Color::Blue),
        StepStatus::Completed => Cell::new("completed").fg(Color::Green),
        StepStatus::Failed => Cell::new("failed").fg(Color::Red),
    }
}
