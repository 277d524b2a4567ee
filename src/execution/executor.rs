//! Step executor - runs individual steps against the runner

use crate::{
    core::{
        condition::Verdict, PipelineContext, ProvisionError, Step, StepAction,
    },
    execution::ExecutionEvent,
    probe::{ProbeReport, ToolProber, ToolSpec},
    runner::{Invocation, ProcessRunner},
    stages::InstallOutcome,
};
use tracing::{debug, info, warn};

/// Result of executing a step
#[derive(Debug)]
pub enum StepOutcome {
    /// Step completed; `detail` is a one-line summary
    Success { detail: String },
    /// Step failed; the run must stop
    Failed { error: ProvisionError },
}

/// Sink for events raised while a step runs
pub type EventSink<'a> = &'a (dyn Fn(ExecutionEvent) + Send + Sync);

/// Executes a single step
pub struct StepExecutor<R> {
    runner: R,
    prober: ToolProber,
}

impl<R: ProcessRunner> StepExecutor<R> {
    pub fn new(runner: R, prober: ToolProber) -> Self {
        Self { runner, prober }
    }

    /// Execute a step and return the result
    pub async fn execute(
        &self,
        step: &Step,
        context: &mut PipelineContext,
        events: EventSink<'_>,
    ) -> StepOutcome {
        info!("Executing step: {}", step.id);

        match self.run_action(step, context, events).await {
            Ok(detail) => {
                info!("Step {} completed: {}", step.id, detail);
                StepOutcome::Success { detail }
            }
            Err(error) => {
                warn!("Step {} failed: {}", step.id, error);
                StepOutcome::Failed { error }
            }
        }
    }

    async fn run_action(
        &self,
        step: &Step,
        context: &mut PipelineContext,
        events: EventSink<'_>,
    ) -> Result<String, ProvisionError> {
        match &step.action {
            StepAction::RequireInputs { files } => {
                for file in files {
                    let path = context.project_path(file);
                    debug!("Checking input {}", path.display());
                    if !path.is_file() {
                        return Err(ProvisionError::MissingInput { path: file.clone() });
                    }
                }
                Ok(format!("{} input file(s) present", files.len()))
            }

            StepAction::RequireTool { tool, hint } => {
                let report = self.probe(&step.id, tool, events).await;
                match report.selected {
                    Some(found) => {
                        let detail = format!("found at {}", found.path.display());
                        context.resolve_tool(found);
                        Ok(detail)
                    }
                    None => Err(ProvisionError::MissingCapability {
                        tool: tool.name.clone(),
                        hint: hint.clone(),
                    }),
                }
            }

            StepAction::EnsureTool { tool, remedy, hint } => {
                let report = self.probe(&step.id, tool, events).await;
                if let Some(found) = report.selected {
                    let detail = format!("found at {}", found.path.display());
                    context.resolve_tool(found);
                    return Ok(detail);
                }

                // Absence is remediable once
                let manager = context.tool(&remedy.manager).cloned().ok_or_else(|| {
                    ProvisionError::Precondition {
                        step: step.id.clone(),
                        reason: format!("package manager '{}' has not been resolved", remedy.manager),
                    }
                })?;

                events(ExecutionEvent::RemediationStarted {
                    step_id: step.id.clone(),
                    tool: tool.name.clone(),
                    package: remedy.package.clone(),
                });
                let outcome = remedy
                    .install(&step.id, &manager, &context.project_dir, &self.runner)
                    .await?;
                let installed = match &outcome {
                    InstallOutcome::Installed => format!("installed {}", remedy.package),
                    InstallOutcome::AlreadyInstalled(_) => {
                        format!("{} already installed", remedy.package)
                    }
                };
                events(ExecutionEvent::RemediationFinished {
                    step_id: step.id.clone(),
                    outcome: installed.clone(),
                });

                let report = self.probe(&step.id, tool, events).await;
                match report.selected {
                    Some(found) => {
                        let detail = format!("{}, found at {}", installed, found.path.display());
                        context.resolve_tool(found);
                        Ok(detail)
                    }
                    None => Err(ProvisionError::ToolNotFound {
                        tool: tool.name.clone(),
                        package: remedy.package.clone(),
                        hint: hint.clone(),
                    }),
                }
            }

            StepAction::BuildEnvironment(spec) => {
                let runtime = context.tool(&spec.runtime).cloned().ok_or_else(|| {
                    ProvisionError::Precondition {
                        step: step.id.clone(),
                        reason: format!("runtime '{}' has not been resolved", spec.runtime),
                    }
                })?;
                let handle = spec
                    .build(&step.id, &runtime, &context.project_dir, &self.runner)
                    .await?;
                let detail = if handle.reused {
                    format!("reused {}", handle.root.display())
                } else {
                    format!("created {}", handle.root.display())
                };
                context.environment = Some(handle);
                Ok(detail)
            }

            StepAction::Run {
                program,
                args,
                success,
            } => {
                let program = context.program_path(program).map_err(|reason| {
                    ProvisionError::Precondition {
                        step: step.id.clone(),
                        reason,
                    }
                })?;
                let invocation = Invocation::new(program)
                    .args(args.iter().cloned())
                    .current_dir(&context.project_dir);
                events(ExecutionEvent::CommandStarted {
                    step_id: step.id.clone(),
                    command: invocation.to_string(),
                });

                let output = self.runner.run(&invocation).await.map_err(|source| {
                    ProvisionError::Spawn {
                        step: step.id.clone(),
                        source,
                    }
                })?;
                debug!("Output of {}: {}", step.id, output.combined());

                match success.evaluate(&output) {
                    Verdict::Success => Ok("exit code 0".to_string()),
                    Verdict::Tolerated(reason) => Ok(format!("tolerated: {}", reason)),
                    Verdict::Failure => Err(ProvisionError::StepFailed {
                        step: step.id.clone(),
                        exit_code: output.exit_code,
                        output: output.combined(),
                    }),
                }
            }

            StepAction::VerifyArtifact { path } => {
                let full = context.project_path(path);
                if full.is_file() {
                    context.artifact = Some(full.clone());
                    Ok(format!("artifact at {}", full.display()))
                } else {
                    Err(ProvisionError::MissingArtifact { path: path.clone() })
                }
            }
        }
    }

    async fn probe(&self, step_id: &str, tool: &ToolSpec, events: EventSink<'_>) -> ProbeReport {
        let report = self.prober.probe(tool, &self.runner).await;
        events(ExecutionEvent::ToolProbed {
            step_id: step_id.to_string(),
            tool: tool.name.clone(),
            found: report.selected.as_ref().map(|t| t.path.clone()),
            rejected: report.rejected(),
        });
        report
    }
}
