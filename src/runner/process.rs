//! System process runner - spawns real subprocesses with tokio

use crate::runner::{CommandOutput, Invocation, ProcessRunner, RunnerError};
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Runner that executes invocations on the local machine
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    /// Per-process timeout in seconds; `None` waits forever
    timeout_secs: Option<u64>,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout_secs: Option<u64>) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    #[cfg(test)]
    pub fn timeout_secs(&self) -> Option<u64> {
        self.timeout_secs
    }
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    /// Run the invocation to completion and capture its output
    ///
    /// # Errors
    /// Returns `RunnerError` if:
    /// - The executable cannot be spawned
    /// - The configured timeout elapses
    ///
    /// A non-zero exit status is NOT an error here; callers decide.
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, RunnerError> {
        debug!("Spawning: {}", invocation);

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true);
        if let Some(ref cwd) = invocation.cwd {
            command.current_dir(cwd);
        }

        let output = match self.timeout_secs {
            Some(secs) => timeout(Duration::from_secs(secs), command.output())
                .await
                .map_err(|_| RunnerError::Timeout(secs))?,
            None => command.output().await,
        };

        let output = output.map_err(|e| RunnerError::Spawn {
            program: invocation.program.display().to_string(),
            reason: e.to_string(),
        })?;

        let result = CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !result.is_success() {
            warn!(
                "{} exited with code {:?}",
                invocation.program_name(),
                result.exit_code
            );
        }
        debug!(
            "{} returned {} bytes of output",
            invocation.program_name(),
            result.stdout.len() + result.stderr.len()
        );

        Ok(result)
    }
}
