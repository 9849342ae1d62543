use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use swipe_core::config::CursorPolicy;

#[derive(Parser)]
#[command(name = "swipe")]
#[command(about = "Replicate and reconcile Swipe listings from the IDX feed")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Pull changed listings since the stored cursor
    Replicate {
        /// Records requested per page
        #[arg(long, value_name = "N")]
        page_size: Option<usize>,
        /// Maximum record pipelines in flight
        #[arg(long, value_name = "N")]
        concurrency: Option<usize>,
        /// How far the cursor may move past failed writes
        #[arg(long, value_enum)]
        cursor_policy: Option<PolicyArg>,
        /// Output the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark listings no longer active upstream as inactive
    Reconcile {
        /// Output the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the stored replication cursor
    Cursor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum PolicyArg {
    DurablePrefix,
    LastRecord,
}

impl From<PolicyArg> for CursorPolicy {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::DurablePrefix => Self::DurablePrefix,
            PolicyArg::LastRecord => Self::LastRecord,
        }
    }
}
