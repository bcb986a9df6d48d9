//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::domain::{RecordId, WorkflowState};

/// LiveWeight - live scale weight synchronizer
#[derive(Parser)]
#[command(
    name = "lw",
    about = "Keep weighing records in sync with a live scale reading",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a synchronizer against a simulated scale
    Simulate {
        /// Bind to a saved record with this id (default: a new, unsaved record)
        #[arg(short, long)]
        record: Option<RecordId>,

        /// Initial workflow state of the bound record
        #[arg(short, long, default_value = "draft")]
        state: WorkflowState,

        /// Vehicle plate shown for the record
        #[arg(short, long, default_value = "")]
        plate: String,

        /// Stop after this many seconds
        #[arg(long, default_value = "30")]
        seconds: u64,

        /// Save the unsaved record after this many seconds
        #[arg(long, conflicts_with = "record")]
        save_after: Option<u64>,

        /// Move the record to completed after this many seconds
        #[arg(long)]
        complete_after: Option<u64>,
    },

    /// Print the effective configuration as YAML
    Config,
}

/// Location of the log file written by the binary
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("liveweight")
        .join("logs")
        .join("liveweight.log")
}
