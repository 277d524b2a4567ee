//! Fatal pipeline errors

use crate::runner::RunnerError;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can stop the pipeline
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// A required input file is missing from the project directory
    #[error("required input file not found: {}", path.display())]
    MissingInput { path: PathBuf },

    /// A capability the pipeline cannot install itself is absent
    #[error("{tool} is not available on this machine")]
    MissingCapability { tool: String, hint: String },

    /// The tool is still absent after the install attempt
    #[error("{tool} was not found, even after installing {package}")]
    ToolNotFound {
        tool: String,
        package: String,
        hint: String,
    },

    /// An external call returned a failing exit code
    #[error("{step} failed with exit code {}", exit_code.map(|c| c.to_string()).unwrap_or_else(|| "<none>".to_string()))]
    StepFailed {
        step: String,
        exit_code: Option<i32>,
        output: String,
    },

    /// The packaging tool reported success but left no artifact
    #[error("expected artifact was not produced: {}", path.display())]
    MissingArtifact { path: PathBuf },

    /// An external call could not be started
    #[error("{step}: {source}")]
    Spawn {
        step: String,
        #[source]
        source: RunnerError,
    },

    /// A prerequisite the step relies on was not resolved earlier
    #[error("{step}: {reason}")]
    Precondition { step: String, reason: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl ProvisionError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ProvisionError::Io {
            context: context.into(),
            source,
        }
    }

    /// Manual remediation hint for the operator, if any
    pub fn hint(&self) -> Option<&str> {
        match self {
            ProvisionError::MissingCapability { hint, .. }
            | ProvisionError::ToolNotFound { hint, .. } => Some(hint.as_str()),
            _ => None,
        }
    }

    /// Captured process output attached to the error, if any
    pub fn output(&self) -> Option<&str> {
        match self {
            ProvisionError::StepFailed { output, .. } if !output.is_empty() => {
                Some(output.as_str())
            }
            _ => None,
        }
    }
}
