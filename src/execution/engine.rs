//! Main execution engine - runs the pipeline strictly in order

use crate::{
    core::{ExecutionStatus, Pipeline, PipelineContext, PipelineResult, StepState},
    execution::{StepExecutor, StepOutcome},
    probe::ToolProber,
    runner::ProcessRunner,
};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{error, info};
use uuid::Uuid;

/// Events that can occur during pipeline execution
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    PipelineStarted {
        execution_id: Uuid,
        pipeline_name: String,
        total_steps: usize,
    },
    StepStarted {
        step_id: String,
        description: String,
        index: usize,
        total: usize,
    },
    ToolProbed {
        step_id: String,
        tool: String,
        found: Option<PathBuf>,
        rejected: usize,
    },
    RemediationStarted {
        step_id: String,
        tool: String,
        package: String,
    },
    RemediationFinished {
        step_id: String,
        outcome: String,
    },
    CommandStarted {
        step_id: String,
        command: String,
    },
    StepCompleted {
        step_id: String,
        detail: String,
    },
    StepFailed {
        step_id: String,
        error: String,
        hint: Option<String>,
    },
    StepSkipped {
        step_id: String,
        reason: String,
    },
    PipelineCompleted {
        execution_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Main pipeline execution engine
///
/// Each step runs exactly once, in order. The first failure stops the run;
/// whatever earlier steps produced is left in place.
pub struct ProvisionEngine<R> {
    executor: Arc<StepExecutor<R>>,
    project_dir: PathBuf,
    event_handlers: Arc<Mutex<Vec<EventHandler>>>,
}

impl<R: ProcessRunner + 'static> ProvisionEngine<R> {
    /// Engine probing the process PATH
    pub fn new(runner: R, project_dir: impl Into<PathBuf>) -> Self {
        let project_dir = project_dir.into();
        let prober = ToolProber::from_env(&project_dir);
        Self::with_prober(runner, prober, project_dir)
    }

    /// Engine probing an explicit search path
    pub fn with_prober(runner: R, prober: ToolProber, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            executor: Arc::new(StepExecutor::new(runner, prober)),
            project_dir: project_dir.into(),
            event_handlers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        let mut handlers = self
            .event_handlers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        handlers.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    fn emit_event(&self, event: ExecutionEvent) {
        let handlers = self
            .event_handlers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }

    /// Execute the entire pipeline
    pub async fn execute(&self, pipeline: &mut Pipeline) -> PipelineResult {
        pipeline.reset();
        let execution_id = pipeline.state.execution_id;
        let total = pipeline.steps.len();

        info!("Starting pipeline execution: {} ({})", pipeline.name, execution_id);
        pipeline.state.start(total);
        self.emit_event(ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_name: pipeline.name.clone(),
            total_steps: total,
        });

        let mut context = PipelineContext::new(&self.project_dir);
        let sink = |event: ExecutionEvent| self.emit_event(event);

        for index in 0..total {
            let step = pipeline.steps[index].clone();
            let started_at = chrono::Utc::now();
            pipeline.steps[index].state = StepState::Running { started_at };

            self.emit_event(ExecutionEvent::StepStarted {
                step_id: step.id.clone(),
                description: step.description.clone(),
                index: index + 1,
                total,
            });

            match self.executor.execute(&step, &mut context, &sink).await {
                StepOutcome::Success { detail } => {
                    pipeline.steps[index].state = StepState::Completed {
                        detail: detail.clone(),
                        started_at,
                        completed_at: chrono::Utc::now(),
                    };
                    pipeline.state.step_completed();
                    self.emit_event(ExecutionEvent::StepCompleted {
                        step_id: step.id.clone(),
                        detail,
                    });
                }
                StepOutcome::Failed { error } => {
                    error!("Step {} failed: {}", step.id, error);
                    pipeline.steps[index].state = StepState::Failed {
                        error: error.to_string(),
                        started_at,
                        failed_at: chrono::Utc::now(),
                    };
                    self.emit_event(ExecutionEvent::StepFailed {
                        step_id: step.id.clone(),
                        error: error.to_string(),
                        hint: error.hint().map(str::to_string),
                    });

                    self.skip_remaining(pipeline, index + 1, &step.id);
                    pipeline.state.fail(&step.id);
                    self.emit_event(ExecutionEvent::PipelineCompleted {
                        execution_id,
                        status: ExecutionStatus::Failed,
                    });

                    return PipelineResult::Failed {
                        step: step.id,
                        error,
                    };
                }
            }
        }

        pipeline.state.complete();
        info!("Pipeline execution finished: {} - Completed", pipeline.name);
        self.emit_event(ExecutionEvent::PipelineCompleted {
            execution_id,
            status: ExecutionStatus::Completed,
        });

        PipelineResult::Succeeded {
            artifact: context.artifact,
        }
    }

    fn skip_remaining(&self, pipeline: &mut Pipeline, from: usize, failed: &str) {
        let reason = format!("{} failed", failed);
        for step in pipeline.steps.iter_mut().skip(from) {
            step.state = StepState::Skipped {
                reason: reason.clone(),
            };
            self.emit_event(ExecutionEvent::StepSkipped {
                step_id: step.id.clone(),
                reason: reason.clone(),
            });
        }
    }
}
