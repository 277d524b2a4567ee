//! Execution state models

use crate::core::error::ProvisionError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Overall pipeline execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Pipeline has not started
    Pending,
    /// Pipeline is currently running
    Running,
    /// Every step succeeded
    Completed,
    /// A step failed and the run stopped
    Failed,
}

/// State of a single step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StepState {
    /// Not started yet
    Pending,
    /// Currently running
    Running { started_at: DateTime<Utc> },
    /// Finished successfully
    Completed {
        detail: String,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },
    /// Finished unsuccessfully; the run stopped here
    Failed {
        error: String,
        started_at: DateTime<Utc>,
        failed_at: DateTime<Utc>,
    },
    /// Never ran because an earlier step failed
    Skipped { reason: String },
}

impl StepState {
    /// Check if step is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepState::Completed { .. } | StepState::Failed { .. } | StepState::Skipped { .. }
        )
    }
}

/// Overall pipeline state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    /// Unique execution ID
    pub execution_id: Uuid,

    /// Current execution status
    pub status: ExecutionStatus,

    /// When execution started
    pub started_at: Option<DateTime<Utc>>,

    /// When execution completed/failed
    pub completed_at: Option<DateTime<Utc>>,

    /// Total number of steps
    pub total_steps: usize,

    /// Number of completed steps
    pub completed_steps: usize,

    /// The step that stopped the run
    pub failed_step: Option<String>,
}

impl PipelineState {
    /// Create a new pipeline state
    pub fn new() -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            status: ExecutionStatus::Pending,
            started_at: None,
            completed_at: None,
            total_steps: 0,
            completed_steps: 0,
            failed_step: None,
        }
    }

    /// Mark pipeline as started
    pub fn start(&mut self, total_steps: usize) {
        self.status = ExecutionStatus::Running;
        self.started_at = Some(Utc::now());
        self.total_steps = total_steps;
        self.completed_steps = 0;
        self.failed_step = None;
    }

    pub fn step_completed(&mut self) {
        self.completed_steps += 1;
    }

    /// Mark pipeline as completed
    pub fn complete(&mut self) {
        self.status = ExecutionStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Mark pipeline as failed at `step_id`
    pub fn fail(&mut self, step_id: &str) {
        self.status = ExecutionStatus::Failed;
        self.failed_step = Some(step_id.to_string());
        self.completed_at = Some(Utc::now());
    }

    /// Calculate progress percentage (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.total_steps == 0 {
            return 0.0;
        }
        self.completed_steps as f64 / self.total_steps as f64
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}

/// Terminal result of one run
#[derive(Debug)]
pub enum PipelineResult {
    /// Every step succeeded
    Succeeded { artifact: Option<PathBuf> },
    /// The first failing step and why
    Failed { step: String, error: ProvisionError },
}

impl PipelineResult {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineResult::Succeeded { .. })
    }

    /// Process exit code for this result
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    pub fn failed_step(&self) -> Option<&str> {
        match self {
            PipelineResult::Failed { step, .. } => Some(step),
            PipelineResult::Succeeded { .. } => None,
        }
    }
}
