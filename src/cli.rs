//! CLI definitions for Barebone.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Barebone CLI.
#[derive(Parser)]
#[command(name = "barebone")]
#[command(about = "Product impression and click tracking engine")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long, global = true, env = "BAREBONE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Also write daily-rotated log files to this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Replay a scenario file against a headless document
    Replay {
        /// Path to the scenario JSON file
        scenario: PathBuf,

        /// Embedding script URL carrying `client_id` and `environment`
        #[arg(long)]
        script_src: Option<String>,

        /// Log events instead of posting them to the collector
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the persisted user id, creating it on first use
    UserId,
}
