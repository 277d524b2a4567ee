//! Isolated environment builder - a project-local virtual environment

use crate::core::config::{EnvironmentMode, ProvisionConfig};
use crate::core::error::ProvisionError;
use crate::probe::ToolReference;
use crate::runner::{Invocation, ProcessRunner};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct EnvironmentSpec {
    /// Tool the environment is created from
    pub runtime: String,

    /// Relative to the project directory
    pub dir: PathBuf,

    pub mode: EnvironmentMode,
}

/// A ready environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentHandle {
    pub root: PathBuf,
    pub interpreter: PathBuf,
    /// True when an existing environment was kept
    pub reused: bool,
}

/// Interpreter location inside an environment root
pub fn interpreter_path(root: &Path) -> PathBuf {
    if cfg!(windows) {
        root.join("Scripts").join("python.exe")
    } else {
        root.join("bin").join("python")
    }
}

impl EnvironmentSpec {
    pub fn from_config(config: &ProvisionConfig) -> Self {
        Self {
            runtime: config.runtime.tool.clone(),
            dir: PathBuf::from(&config.environment.dir),
            mode: config.environment.mode,
        }
    }

    pub fn with_mode(mut self, mode: EnvironmentMode) -> Self {
        self.mode = mode;
        self
    }

    /// Create (or reuse) the environment under `project_dir`
    pub async fn build<R: ProcessRunner + ?Sized>(
        &self,
        step: &str,
        runtime: &ToolReference,
        project_dir: &Path,
        runner: &R,
    ) -> Result<EnvironmentHandle, ProvisionError> {
        let root = project_dir.join(&self.dir);
        let interpreter = interpreter_path(&root);

        if root == project_dir || !root.starts_with(project_dir) {
            return Err(ProvisionError::Precondition {
                step: step.to_string(),
                reason: format!("{} is not inside the project directory", root.display()),
            });
        }

        if self.mode == EnvironmentMode::Reuse && is_usable(&interpreter, runner).await {
            info!("Reusing environment at {}", root.display());
            return Ok(EnvironmentHandle {
                root,
                interpreter,
                reused: true,
            });
        }

        if root.exists() {
            info!("Removing existing environment at {}", root.display());
            tokio::fs::remove_dir_all(&root).await.map_err(|e| {
                ProvisionError::io(format!("Failed to remove {}", root.display()), e)
            })?;
        }

        let invocation = Invocation::new(&runtime.path)
            .args(["-m", "venv"])
            .arg(root.to_string_lossy())
            .current_dir(project_dir);
        info!("Creating environment at {}", root.display());

        let output = runner
            .run(&invocation)
            .await
            .map_err(|source| ProvisionError::Spawn {
                step: step.to_string(),
                source,
            })?;
        if !output.is_success() {
            return Err(ProvisionError::StepFailed {
                step: step.to_string(),
                exit_code: output.exit_code,
                output: output.combined(),
            });
        }

        if !interpreter.is_file() {
            return Err(ProvisionError::Precondition {
                step: step.to_string(),
                reason: format!(
                    "environment created but no interpreter at {}",
                    interpreter.display()
                ),
            });
        }

        Ok(EnvironmentHandle {
            root,
            interpreter,
            reused: false,
        })
    }
}

async fn is_usable<R: ProcessRunner + ?Sized>(interpreter: &Path, runner: &R) -> bool {
    if !interpreter.is_file() {
        debug!("No interpreter at {}", interpreter.display());
        return false;
    }
    match runner.run(&Invocation::new(interpreter).arg("--version")).await {
        Ok(output) => output.is_success(),
        Err(e) => {
            debug!("Existing environment is broken: {}", e);
            false
        }
    }
}
