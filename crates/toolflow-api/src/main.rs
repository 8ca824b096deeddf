//! Toolflow command-line entry point.
//!
//! Binary name: `toolflow`
//!
//! Parses arguments, installs tracing, opens the engine, and dispatches to the
//! command handlers.

mod cli;
mod state;

use clap::Parser;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(e) = toolflow_observe::tracing_setup::init_tracing(cli.otel, cli.verbose) {
        eprintln!("Warning: failed to initialize tracing: {e}");
    }

    let result = dispatch(cli).await;
    toolflow_observe::tracing_setup::shutdown_tracing();
    result
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let state = AppState::init(cli.tool_endpoint).await?;

    match cli.command {
        Commands::Workflow { action } => {
            cli::workflow::handle_workflow_command(action, &state, cli.json).await
        }
        Commands::Run(args) => cli::run::handle_run(args, &state, cli.json).await,
        Commands::Execution { action } => {
            cli::execution::handle_execution_command(action, &state, cli.json).await
        }
    }
}
