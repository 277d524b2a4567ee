//! CLI command definitions

use crate::core::config::EnvironmentMode;
use clap::Args;

/// Run the provisioning pipeline
#[derive(Debug, Args, Clone, Default)]
pub struct RunCommand {
    /// Keep an existing, working environment instead of rebuilding it
    #[arg(long, conflicts_with = "recreate_env")]
    pub reuse_env: bool,

    /// Always delete and rebuild the environment
    #[arg(long)]
    pub recreate_env: bool,

    /// Don't save the run to history
    #[arg(long)]
    pub no_history: bool,
}

impl RunCommand {
    /// Environment mode requested on the command line, if any
    pub fn environment_mode(&self) -> Option<EnvironmentMode> {
        if self.reuse_env {
            Some(EnvironmentMode::Reuse)
        } else if self.recreate_env {
            Some(EnvironmentMode::Recreate)
        } else {
            None
        }
    }
}

/// Validate the configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Probe for required tools
#[derive(Debug, Args, Clone)]
pub struct ProbeCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show a single run by ID
    #[arg(long)]
    pub execution_id: Option<String>,
}
