use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// `chainward` - unattended caretaker bot for on-chain entities.
#[derive(Parser, Debug)]
#[command(name = "chainward")]
#[command(version = "0.1.0")]
#[command(about = "Keeps your on-chain entities cared for.", long_about = None)]
pub struct Cli {
    /// Path to config.toml (default: ~/.chainward/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the caretaker loop (ctrl-c to stop)
    Run,

    /// Show the last recorded keeper state
    Status,

    /// Check connectivity, configuration, and entity visibility
    Doctor,
}
