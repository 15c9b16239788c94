//! Docket CLI - document collection workflows.
//!
//! Provides commands for:
//! - `new`: Create a collection from the workflow's templates
//! - `list` / `show`: Inspect collections
//! - `status`: Move a collection to another stage
//! - `action`: Run a workflow action (`format`, `notes`, `add`)
//! - `process`: Run the processor pipeline over one markdown file
//! - `recover`: Repair interrupted stage transitions

mod commands;
mod error;
mod output;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{
    ActionArgs, GlobalArgs, ListArgs, NewArgs, ProcessArgs, RecoverArgs, ShowArgs, StatusArgs,
};
use output::Output;

/// Docket - document collection workflows.
#[derive(Parser)]
#[command(name = "docket", version, about)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a collection in the workflow's first stage.
    New(NewArgs),
    /// List collections of a workflow.
    List(ListArgs),
    /// Show one collection.
    Show(ShowArgs),
    /// Move a collection to another stage.
    Status(StatusArgs),
    /// Run a workflow action on a collection.
    Action(ActionArgs),
    /// Run the processor pipeline over a markdown file.
    Process(ProcessArgs),
    /// Repair collections whose stage transition was interrupted.
    Recover(RecoverArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.global.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let global = cli.global;
    let result = match cli.command {
        Commands::New(args) => args.execute(&global),
        Commands::List(args) => args.execute(&global),
        Commands::Show(args) => args.execute(&global),
        Commands::Status(args) => args.execute(&global),
        Commands::Action(args) => args.execute(&global),
        Commands::Process(args) => args.execute(&global),
        Commands::Recover(args) => args.execute(&global),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output.error(&format!("Error: {err}"));
            ExitCode::FAILURE
        }
    }
}
