//! CLI command definitions for the `toolflow` binary.
//!
//! Uses clap derive macros. Commands are grouped by noun
//! (`toolflow workflow register`, `toolflow execution show`), with `run` as
//! a top-level verb.

pub mod execution;
pub mod run;
pub mod workflow;

use clap::{Parser, Subcommand};

/// Register and run tool workflows.
#[derive(Debug, Parser)]
#[command(name = "toolflow", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Debug logging for the engine (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    /// Tool routing endpoint, overriding `tool_endpoint` in config.toml.
    #[arg(long, global = true, env = "TOOLFLOW_TOOL_ENDPOINT")]
    pub tool_endpoint: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Register, list, and inspect workflow definitions.
    #[command(alias = "wf")]
    Workflow {
        #[command(subcommand)]
        action: workflow::WorkflowCommand,
    },

    /// Execute a registered workflow and wait for its result.
    Run(run::RunArgs),

    /// Inspect execution records.
    #[command(alias = "exec")]
    Execution {
        #[command(subcommand)]
        action: execution::ExecutionCommand,
    },
}
