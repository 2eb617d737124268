//! # DevDeck Process Management
//!
//! Lifecycle of the long-running process of each DevDeck project.
//!
//! This crate provides:
//! - ProcessManager - start/stop/query facade with per-project locking
//! - Launcher, Terminator, Reconciler - the lifecycle building blocks
//! - ProcessRegistry - in-memory map of live project processes
//! - DeployRunner - the per-type deployment sequence
//! - Configuration loading and validation

pub mod config;
pub mod deploy;
pub mod exit;
pub mod launcher;
pub mod locks;
pub mod manager;
pub mod reconcile;
pub mod registry;
pub mod terminator;
pub mod types;

#[cfg(test)]
mod mock_tree;

pub use config::{
    DeployOptions, DevDeckConfig, DuplicateStartPolicy, ProcessOptions, ProjectTypeConfig,
    ServerOptions,
};
pub use deploy::{DeployReport, DeployRunner, StepOutput};
pub use exit::{ExitMonitor, ProcessExit};
pub use manager::{ProcessManager, ProjectSource};
pub use registry::ProcessRegistry;
pub use types::{ManagedProcess, ProcessInfo, StopReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
