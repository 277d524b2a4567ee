//! Step domain model

use crate::core::condition::SuccessPredicate;
use crate::core::state::StepState;
use crate::probe::ToolSpec;
use crate::stages::{EnvironmentSpec, InstallSpec};
use std::path::PathBuf;

/// A single step in a pipeline
#[derive(Debug, Clone)]
pub struct Step {
    /// Unique step identifier
    pub id: String,

    /// Human-readable description
    pub description: String,

    /// What the step does
    pub action: StepAction,

    /// Runtime state
    pub state: StepState,
}

/// The unit of work behind a step
#[derive(Debug, Clone)]
pub enum StepAction {
    /// Fail unless every file exists (relative to the project directory)
    RequireInputs { files: Vec<PathBuf> },

    /// Fail unless the tool is found; no remediation
    RequireTool { tool: ToolSpec, hint: String },

    /// Probe, install on absence, probe again
    EnsureTool {
        tool: ToolSpec,
        remedy: InstallSpec,
        hint: String,
    },

    /// Create or reuse the isolated environment
    BuildEnvironment(EnvironmentSpec),

    /// Run a program and judge its exit
    Run {
        program: Program,
        args: Vec<String>,
        success: SuccessPredicate,
    },

    /// Fail unless the artifact exists
    VerifyArtifact { path: PathBuf },
}

/// Which executable a `Run` step invokes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Program {
    /// A tool resolved by an earlier step
    Tool(String),
    /// The isolated environment's interpreter
    EnvironmentInterpreter,
    /// An explicit path
    Path(PathBuf),
}

impl Step {
    pub fn new(id: impl Into<String>, description: impl Into<String>, action: StepAction) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            action,
            state: StepState::Pending,
        }
    }

    /// Short label for the action kind
    pub fn kind(&self) -> &'static str {
        match self.action {
            StepAction::RequireInputs { .. } => "inputs",
            StepAction::RequireTool { .. } => "probe",
            StepAction::EnsureTool { .. } => "probe+install",
            StepAction::BuildEnvironment(_) => "environment",
            StepAction::Run { .. } => "command",
            StepAction::VerifyArtifact { .. } => "artifact",
        }
    }
}
