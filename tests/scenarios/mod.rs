//! Scenario-based tests for provision

mod environment_modes;
mod full_run;
mod input_validation;
mod stub_rejection;
