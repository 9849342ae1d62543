//! Swipe CLI - operator entry points for listing replication
//!
//! Runs the same replication and reconciliation jobs as the trigger API, once,
//! from a terminal or a cron entry.

mod cli;
mod commands;
mod error;


use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::common::resolve_db_path;
use crate::commands::cursor::run_cursor;
use crate::commands::reconcile::run_reconcile;
use crate::commands::replicate::{run_replicate, ReplicateOverrides};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let directives = ["swipe=info", "swipe_core=info"];
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in directives {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Commands::Replicate {
            page_size,
            concurrency,
            cursor_policy,
            json,
        } => {
            let overrides = ReplicateOverrides {
                page_size,
                concurrency,
                cursor_policy: cursor_policy.map(Into::into),
            };
            run_replicate(&db_path, overrides, json).await?;
        }
        Commands::Reconcile { json } => run_reconcile(&db_path, json).await?,
        Commands::Cursor { json } => run_cursor(&db_path, json).await?,
    }

    Ok(())
}
