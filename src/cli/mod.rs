//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{HistoryCommand, ProbeCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;
use std::path::PathBuf;

/// Provision a runtime, an isolated environment and a packaged application
#[derive(Debug, Parser, Clone)]
#[command(name = "provision")]
#[command(version)]
#[command(about = "A declarative, idempotent provisioning and packaging pipeline", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the configuration file (default: provision.yaml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Project directory (default: current directory)
    #[arg(short = 'C', long, global = true)]
    pub project_dir: Option<PathBuf>,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the provisioning pipeline (the default)
    Run(RunCommand),

    /// Validate the configuration and print the step plan
    Validate(ValidateCommand),

    /// Probe for the package manager and runtime without changing anything
    Probe(ProbeCommand),

    /// Show run history
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }

    /// The command to run; no subcommand means `run`
    pub fn command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or_else(|| Command::Run(RunCommand::default()))
    }
}
