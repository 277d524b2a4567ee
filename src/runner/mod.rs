//! Process runner - the only way the pipeline touches external programs

pub mod process;
pub mod response;

use async_trait::async_trait;
pub use process::SystemRunner;
pub use response::{CommandOutput, Invocation, RunnerError};

/// Trait for running external processes - allows faking the machine in tests
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run an invocation to completion and capture its output
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, RunnerError>;
}

#[async_trait]
impl<T: ProcessRunner + ?Sized> ProcessRunner for std::sync::Arc<T> {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, RunnerError> {
        (**self).run(invocation).await
    }
}
