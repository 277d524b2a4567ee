//! Pipeline domain model

use crate::core::{
    config::{EnvironmentMode, ProvisionConfig},
    state::{ExecutionStatus, PipelineState, StepState},
    step::{Step, StepAction},
};
use crate::probe::{StubPolicy, ToolSpec};
use crate::stages::{artifact, EnvironmentSpec, InstallSpec};
use std::path::PathBuf;

/// A pipeline definition: a fixed list of steps run once, in order
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Steps in execution order
    pub steps: Vec<Step>,

    /// Execution state
    pub state: PipelineState,
}

impl Pipeline {
    /// Create a pipeline from configuration
    ///
    /// Inputs are checked before any tool is probed, and the package manager
    /// before anything is installed or built.
    pub fn from_config(config: &ProvisionConfig) -> Self {
        let mut steps = Vec::new();

        steps.push(Step::new(
            "check-inputs",
            "Check input files",
            StepAction::RequireInputs {
                files: vec![
                    PathBuf::from(&config.app.entry_script),
                    PathBuf::from(&config.app.icon_source),
                ],
            },
        ));

        let pm = &config.package_manager;
        steps.push(Step::new(
            "detect-package-manager",
            format!("Detect {}", pm.tool),
            StepAction::RequireTool {
                tool: ToolSpec::new(&pm.tool).with_verify_args(pm.verify_args.clone()),
                hint: pm.hint.clone(),
            },
        ));

        let rt = &config.runtime;
        steps.push(Step::new(
            "ensure-runtime",
            format!("Ensure {} is installed", rt.tool),
            StepAction::EnsureTool {
                tool: ToolSpec::new(&rt.tool)
                    .with_verify_args(rt.verify_args.clone())
                    .with_policy(StubPolicy::from_lists(&rt.stub_components, &rt.stub_prefixes))
                    .with_extra_locations(config.resolved_extra_locations()),
                remedy: InstallSpec::from_config(config),
                hint: rt.hint.clone(),
            },
        ));

        steps.push(Step::new(
            "build-environment",
            format!("Build isolated environment in {}", config.environment.dir),
            StepAction::BuildEnvironment(EnvironmentSpec::from_config(config)),
        ));

        steps.extend(artifact::plan(config));

        Pipeline {
            name: config.pipeline_name().to_string(),
            steps,
            state: PipelineState::new(),
        }
    }

    /// Override how an existing environment is treated
    pub fn set_environment_mode(&mut self, mode: EnvironmentMode) {
        for step in &mut self.steps {
            if let StepAction::BuildEnvironment(spec) = &mut step.action {
                spec.mode = mode;
            }
        }
    }

    /// Get a step by ID
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Get a mutable step by ID
    pub fn step_mut(&mut self, id: &str) -> Option<&mut Step> {
        self.steps.iter_mut().find(|s| s.id == id)
    }

    /// Step IDs in execution order
    pub fn execution_order(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id.as_str()).collect()
    }

    /// Check if every step reached a terminal state
    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(|s| s.state.is_terminal())
    }

    /// Check if pipeline has failed
    pub fn has_failed(&self) -> bool {
        self.state.status == ExecutionStatus::Failed
    }

    /// Number of steps that completed
    pub fn completed_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.state, StepState::Completed { .. }))
            .count()
    }

    /// Reset every step for a fresh run
    pub fn reset(&mut self) {
        for step in &mut self.steps {
            step.state = StepState::Pending;
        }
        self.state = PipelineState::new();
    }
}
