//! Core domain models for the provisioning pipeline
//!
//! This module defines the configuration, the typed steps, and the state
//! a run moves through.

pub mod condition;
pub mod config;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod state;
pub mod step;

pub use condition::*;
pub use context::*;
pub use error::*;
pub use pipeline::*;
pub use state::*;
pub use step::*;
