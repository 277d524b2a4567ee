//! Installer - remediates a missing tool through the system package manager
//!
//! This is the only stage allowed to change machine-global state.

use crate::core::condition::{ConditionPattern, SuccessPredicate, Verdict};
use crate::core::config::ProvisionConfig;
use crate::core::error::ProvisionError;
use crate::probe::ToolReference;
use crate::runner::{Invocation, ProcessRunner};
use std::path::Path;
use tracing::{info, warn};

/// What to install and how to judge the package manager's answer
#[derive(Debug, Clone)]
pub struct InstallSpec {
    /// Tool name of the package manager (resolved earlier in the run)
    pub manager: String,

    pub package: String,

    /// Full argument list, package already substituted
    pub args: Vec<String>,

    pub success: SuccessPredicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed,
    AlreadyInstalled(String),
}

impl InstallSpec {
    pub fn from_config(config: &ProvisionConfig) -> Self {
        let pm = &config.package_manager;
        let pattern = pm
            .already_installed_pattern
            .as_deref()
            .map(|p| ConditionPattern::new(p, pm.use_regex));

        Self {
            manager: pm.tool.clone(),
            package: pm.package_id.clone(),
            args: config.install_args(),
            success: SuccessPredicate::tolerating(pm.already_installed_exit_codes.clone(), pattern),
        }
    }

    pub fn invocation(&self, manager: &ToolReference, project_dir: &Path) -> Invocation {
        Invocation::new(&manager.path)
            .args(self.args.iter().cloned())
            .current_dir(project_dir)
    }

    /// Invoke the package manager non-interactively
    ///
    /// "Already installed" answers are success; any other failure is fatal.
    pub async fn install<R: ProcessRunner + ?Sized>(
        &self,
        step: &str,
        manager: &ToolReference,
        project_dir: &Path,
        runner: &R,
    ) -> Result<InstallOutcome, ProvisionError> {
        let invocation = self.invocation(manager, project_dir);
        info!("Installing {} with {}", self.package, manager.name);

        let output = runner
            .run(&invocation)
            .await
            .map_err(|source| ProvisionError::Spawn {
                step: step.to_string(),
                source,
            })?;

        match self.success.evaluate(&output) {
            Verdict::Success => Ok(InstallOutcome::Installed),
            Verdict::Tolerated(reason) => {
                info!("{} already present: {}", self.package, reason);
                Ok(InstallOutcome::AlreadyInstalled(reason))
            }
            Verdict::Failure => {
                warn!("Installing {} failed", self.package);
                Err(ProvisionError::StepFailed {
                    step: step.to_string(),
                    exit_code: output.exit_code,
                    output: output.combined(),
                })
            }
        }
    }
}
