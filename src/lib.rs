//! provision - a declarative, idempotent provisioning and packaging pipeline

pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod probe;
pub mod runner;
pub mod stages;

// Re-export commonly used types
pub use crate::core::{ExecutionStatus, Pipeline, PipelineContext, PipelineResult, ProvisionError, Step, StepState};
pub use crate::core::config::ProvisionConfig;
pub use execution::{ExecutionEvent, ProvisionEngine};
pub use probe::{StubPolicy, ToolProber, ToolReference, ToolSpec};
pub use runner::{CommandOutput, Invocation, ProcessRunner, RunnerError, SystemRunner};
