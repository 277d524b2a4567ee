//! Provisioning stages driven by the step executor

pub mod artifact;
pub mod environment;
pub mod installer;

pub use environment::{EnvironmentHandle, EnvironmentSpec};
pub use installer::{InstallOutcome, InstallSpec};
