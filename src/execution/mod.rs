//! Pipeline execution engine

pub mod engine;
pub mod executor;

pub use engine::{EventHandler, ExecutionEvent, ProvisionEngine};
pub use executor::{EventSink, StepExecutor, StepOutcome};
