//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// flamerge - Merge Flash CS5 container libraries
#[derive(Parser, Debug)]
#[command(name = "flamerge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Merge two or more containers into one, left to right
    Merge(commands::merge::MergeArgs),

    /// Inspect a container's folders, symbols, and linkage
    Info(commands::info::InfoArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(self.log_level.as_str()),
        )
        .init();

        match self.command {
            Commands::Merge(args) => commands::merge::execute(args),
            Commands::Info(args) => commands::info::execute(args),
        }
    }
}
