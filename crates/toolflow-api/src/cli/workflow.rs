//! CLI workflow subcommands: register, list, show.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use toolflow_core::workflow::definition::{load_definition, serialize_definition_yaml};
use toolflow_core::workflow::{OrchestrationError, RegisterOptions};
use toolflow_types::workflow::{RegisteredWorkflow, WorkflowComplexity};

use crate::state::AppState;

#[derive(Debug, Subcommand)]
pub enum WorkflowCommand {
    /// Register a workflow from a YAML or JSON file.
    Register {
        /// Path to the definition (`.json` is parsed as JSON, anything else as YAML).
        file: PathBuf,

        /// Version to register under (defaults to the file's version, or a patch bump on overwrite).
        #[arg(id = "workflow_version", long = "workflow-version", value_name = "VERSION")]
        version: Option<String>,

        /// Register a new version of an existing workflow.
        #[arg(long)]
        overwrite: bool,
    },

    /// List registered workflows.
    #[command(alias = "ls")]
    List {
        /// Include every stored version, not just the current one.
        #[arg(long)]
        versions: bool,
    },

    /// Show a workflow definition and its registration metadata.
    Show {
        /// Workflow name.
        name: String,

        /// A specific version instead of the current one.
        #[arg(id = "workflow_version", long = "workflow-version", value_name = "VERSION")]
        version: Option<String>,
    },
}

pub async fn handle_workflow_command(
    cmd: WorkflowCommand,
    state: &AppState,
    json: bool,
) -> Result<()> {
    match cmd {
        WorkflowCommand::Register {
            file,
            version,
            overwrite,
        } => handle_register(&file, version, overwrite, state, json).await,
        WorkflowCommand::List { versions } => handle_list(versions, state, json).await,
        WorkflowCommand::Show { name, version } => {
            handle_show(&name, version.as_deref(), state, json).await
        }
    }
}

// ---------------------------------------------------------------------------
// Register
// ---------------------------------------------------------------------------

async fn handle_register(
    file: &PathBuf,
    version: Option<String>,
    overwrite: bool,
    state: &AppState,
    json: bool,
) -> Result<()> {
    let definition = load_definition(file)
        .with_context(|| format!("Failed to load workflow from {}", file.display()))?;
    let name = definition.name.clone();

    let outcome = match state
        .orchestrator
        .register_workflow(definition, RegisterOptions { version, overwrite })
        .await
    {
        Ok(outcome) => outcome,
        Err(OrchestrationError::Validation(errors)) => {
            if json {
                let out = serde_json::json!({
                    "success": false,
                    "violations": errors.violations(),
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                eprintln!();
                eprintln!(
                    "  {} Workflow '{}' is invalid:",
                    style("x").red().bold(),
                    style(&name).cyan()
                );
                for violation in errors.violations() {
                    eprintln!("    - {violation}");
                }
                eprintln!();
            }
            bail!("workflow validation failed");
        }
        Err(OrchestrationError::AlreadyExists { name, version }) => {
            bail!(
                "Workflow '{name}' is already registered (version {version}). Use --overwrite to register a new version."
            );
        }
        Err(e) => return Err(e).context("Failed to register workflow"),
    };

    if json {
        let out = serde_json::json!({
            "success": outcome.success,
            "name": name,
            "version": outcome.version,
            "metadata": outcome.metadata,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!();
        println!(
            "  {} Registered workflow '{}' version {}",
            style("*").green().bold(),
            style(&name).cyan(),
            style(&outcome.version).bold()
        );
        println!(
            "  Steps: {}  Dependencies: {}  Complexity: {}",
            outcome.metadata.step_count,
            outcome.metadata.dependency_count,
            format_complexity(outcome.metadata.complexity)
        );
        println!(
            "  Estimated duration: {}",
            format_duration_ms(outcome.metadata.estimated_duration_ms)
        );
        println!();
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

async fn handle_list(include_versions: bool, state: &AppState, json: bool) -> Result<()> {
    let workflows = state
        .orchestrator
        .list_workflows(include_versions)
        .await
        .context("Failed to list workflows")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&workflows)?);
        return Ok(());
    }

    if workflows.is_empty() {
        println!();
        println!("  No workflows registered.");
        println!(
            "  Register one with: {}",
            style("toolflow workflow register <file.yaml>").dim()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Name").fg(Color::Cyan),
            Cell::new("Version"),
            Cell::new("Steps"),
            Cell::new("Complexity"),
            Cell::new("Est. duration"),
            Cell::new("Registered"),
        ]);

    for w in &workflows {
        table.add_row(vec![
            Cell::new(&w.definition.name),
            Cell::new(&w.definition.version),
            Cell::new(w.metadata.step_count),
            complexity_cell(w.metadata.complexity),
            Cell::new(format_duration_ms(w.metadata.estimated_duration_ms)),
            Cell::new(w.metadata.registered_at.format("%Y-%m-%d %H:%M").to_string()),
        ]);
    }

    println!();
    println!("{table}");
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// Show
// ---------------------------------------------------------------------------

async fn handle_show(
    name: &str,
    version: Option<&str>,
    state: &AppState,
    json: bool,
) -> Result<()> {
    let workflow = state
        .orchestrator
        .get_workflow(name, version)
        .await
        .context("Failed to look up workflow")?
        .ok_or_else(|| match version {
            Some(v) => anyhow::anyhow!("Workflow '{name}' version {v} not found"),
            None => anyhow::anyhow!("Workflow '{name}' not found"),
        })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&workflow)?);
        return Ok(());
    }

    print_workflow(&workflow)
}

fn print_workflow(workflow: &RegisteredWorkflow) -> Result<()> {
    let def = &workflow.definition;
    let meta = &workflow.metadata;

    println!();
    println!(
        "  {} {}",
        style(&def.name).cyan().bold(),
        style(format!("v{}", def.version)).dim()
    );
    if let Some(desc) = &def.description {
        println!("  {desc}");
    }
    println!();
    println!(
        "  Steps: {}  Dependencies: {}  Complexity: {}  Est. duration: {}",
        meta.step_count,
        meta.dependency_count,
        format_complexity(meta.complexity),
        format_duration_ms(meta.estimated_duration_ms)
    );
    println!(
        "  Registered: {}",
        meta.registered_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!();

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Step").fg(Color::Cyan),
            Cell::new("Tool"),
            Cell::new("Depends on"),
        ]);
    for step in &def.steps {
        let deps = if step.dependencies.is_empty() {
            "-".to_string()
        } else {
            step.dependencies.join(", ")
        };
        table.add_row(vec![
            Cell::new(&step.id),
            Cell::new(&step.tool),
            Cell::new(deps),
        ]);
    }
    println!("{table}");
    println!();

    let yaml = serialize_definition_yaml(def).context("Failed to render definition")?;
    println!("{}", style("  Definition").bold());
    for line in yaml.lines() {
        println!("    {}", style(line).dim());
    }
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

fn format_complexity(complexity: WorkflowComplexity) -> String {
    match complexity {
        WorkflowComplexity::Simple => style("simple").green().to_string(),
        WorkflowComplexity::Medium => style("medium").yellow().to_string(),
        WorkflowComplexity::Complex => style("complex").red().to_string(),
    }
}

fn complexity_cell(complexity: WorkflowComplexity) -> Cell {
    match complexity {
        WorkflowComplexity::Simple => Cell::new("simple").fg(Color::Green),
        WorkflowComplexity::Medium => Cell::new("medium").fg(Color::Yellow),
        WorkflowComplexity::Complex => Cell::new("complex").fg(Color::Red),
    }
}

/// `850ms`, `4.2s`, `3m 20s`.
pub(crate) fn format_duration_ms(ms: u64) -> String {
    if ms < 1_000 {
        format!("{ms}ms")
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1_000.0)
    } else {
        format!("{}m {}s", ms / 60_000, (ms % 60_000) / 1_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration_ms() {
        assert_eq!(format_duration_ms(850), "850ms");
        assert_eq!(format_duration_ms(4_200), "4.2s");
        assert_eq!(format_duration_ms(200_000), "3m 20s");
    }
}
