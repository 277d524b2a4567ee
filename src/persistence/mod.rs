//! Persistence layer for provisioning run history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteExecutionStore;

pub use crate::core::ExecutionStatus;
use crate::core::{Pipeline, PipelineResult};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Project-local directory holding run history
pub const HISTORY_DIR: &str = ".provision";

/// Summary of a provisioning run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSummary {
    /// Unique execution ID
    pub execution_id: Uuid,

    /// Pipeline name
    pub pipeline_name: String,

    /// Execution status
    pub status: ExecutionStatus,

    /// When execution started
    pub started_at: DateTime<Utc>,

    /// When execution finished
    pub completed_at: Option<DateTime<Utc>>,

    /// Number of completed steps
    pub completed_steps: usize,

    /// Total number of steps
    pub total_steps: usize,

    /// The step that stopped the run
    pub failed_step: Option<String>,

    /// The produced artifact
    pub artifact: Option<String>,
}

impl ExecutionSummary {
    /// Progress (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.total_steps == 0 {
            return 0.0;
        }
        self.completed_steps as f64 / self.total_steps as f64
    }
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Save a run
    async fn save_execution(&self, execution: &ExecutionSummary) -> Result<()>;

    /// Load a run by ID
    async fn load_execution(&self, execution_id: Uuid) -> Result<Option<ExecutionSummary>>;

    /// Most recent runs first
    async fn list_recent(&self, limit: usize) -> Result<Vec<ExecutionSummary>>;
}

/// In-memory persistence (for testing or `--no-history`)
pub struct InMemoryPersistence {
    executions: tokio::sync::RwLock<Vec<ExecutionSummary>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self {
            executions: tokio::sync::RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_execution(&self, execution: &ExecutionSummary) -> Result<()> {
        let mut execs = self.executions.write().await;
        execs.retain(|e| e.execution_id != execution.execution_id);
        execs.push(execution.clone());
        Ok(())
    }

    async fn load_execution(&self, execution_id: Uuid) -> Result<Option<ExecutionSummary>> {
        let execs = self.executions.read().await;
        Ok(execs.iter().find(|e| e.execution_id == execution_id).cloned())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<ExecutionSummary>> {
        let mut execs = self.executions.read().await.clone();
        execs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        execs.truncate(limit);
        Ok(execs)
    }
}

/// Default history database location for a project
pub fn history_path(project_dir: &Path) -> PathBuf {
    project_dir.join(HISTORY_DIR).join("history.db")
}

/// Create a summary from a finished pipeline
pub fn create_summary(pipeline: &Pipeline, result: &PipelineResult) -> ExecutionSummary {
    let artifact = match result {
        PipelineResult::Succeeded { artifact } => {
            artifact.as_ref().map(|p| p.display().to_string())
        }
        PipelineResult::Failed { .. } => None,
    };

    ExecutionSummary {
        execution_id: pipeline.state.execution_id,
        pipeline_name: pipeline.name.clone(),
        status: pipeline.state.status,
        started_at: pipeline.state.started_at.unwrap_or_else(Utc::now),
        completed_at: pipeline.state.completed_at,
        completed_steps: pipeline.state.completed_steps,
        total_steps: pipeline.state.total_steps,
        failed_step: pipeline.state.failed_step.clone(),
        artifact,
    }
}
