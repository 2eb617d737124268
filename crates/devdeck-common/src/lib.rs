//! # DevDeck Common
//!
//! Common types and errors shared across the DevDeck crates.
//!
//! This crate provides the foundational abstractions that the other DevDeck
//! crates build upon: the project domain types and the error taxonomy for
//! launching, stopping and deploying projects.

pub mod errors;
pub mod types;

// Re-export commonly used items
pub use errors::{
    DeployError, KillFailure, LaunchError, ProcessError, ProcessResult, ProjectError, StopError,
};
pub use types::{Project, ProjectKey, ProjectType};
