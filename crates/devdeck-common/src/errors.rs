//! Error types for DevDeck.
//!
//! # Rust Learning Note
//!
//! Every operation boundary (launch, stop, deploy, project CRUD) has its own
//! error enum instead of one catch-all type. Callers can `match` on exactly
//! the failures an operation can produce, and the compiler tells them when a
//! new variant appears.
//!
//! ```rust
//! use devdeck_common::{LaunchError, ProjectKey};
//!
//! fn describe(err: &LaunchError) -> &'static str {
//!     match err {
//!         LaunchError::AlreadyRunning { .. } => "stop it first",
//!         _ => "see logs",
//!     }
//! }
//!
//! let err = LaunchError::already_running(ProjectKey::from("/srv/app"), 42);
//! assert_eq!(describe(&err), "stop it first");
//! assert_eq!(err.kind(), "already_running");
//! ```
//!
//! Each operation-level error exposes `kind()`, a stable machine-readable
//! string that the HTTP layer sends next to the human-readable message.

use crate::types::ProjectKey;
use std::fmt;
use thiserror::Error;

// ==============================================================================
// Low-level process errors
// ==============================================================================

/// Errors produced by the OS-level process primitives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("Process spawn failed: {id} - {reason}")]
    SpawnFailed { id: String, reason: String },

    #[error("Process kill failed: PID {pid} - {reason}")]
    KillFailed { pid: u32, reason: String },

    #[error("Process query failed: PID {pid} - {reason}")]
    QueryFailed { pid: u32, reason: String },
}

impl ProcessError {
    pub fn spawn_failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn kill_failed(pid: u32, reason: impl Into<String>) -> Self {
        Self::KillFailed {
            pid,
            reason: reason.into(),
        }
    }

    pub fn query_failed(pid: u32, reason: impl Into<String>) -> Self {
        Self::QueryFailed {
            pid,
            reason: reason.into(),
        }
    }
}

/// Result type for process primitives.
pub type ProcessResult<T> = std::result::Result<T, ProcessError>;

// ==============================================================================
// Launch errors
// ==============================================================================

/// Failure to start a project's long-running process.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LaunchError {
    #[error("Project path not found or not a directory: {path}")]
    PathNotFound { path: String },

    #[error("Failed to spawn process for {key}: {reason}")]
    SpawnFailed { key: ProjectKey, reason: String },

    #[error("Project {key} is already running (PID: {pid})")]
    AlreadyRunning { key: ProjectKey, pid: u32 },

    #[error("Project not registered: {key}")]
    UnknownProject { key: ProjectKey },
}

impl LaunchError {
    pub fn path_not_found(path: impl Into<String>) -> Self {
        Self::PathNotFound { path: path.into() }
    }

    pub fn spawn_failed(key: ProjectKey, reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            key,
            reason: reason.into(),
        }
    }

    pub fn already_running(key: ProjectKey, pid: u32) -> Self {
        Self::AlreadyRunning { key, pid }
    }

    pub fn unknown_project(key: ProjectKey) -> Self {
        Self::UnknownProject { key }
    }

    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PathNotFound { .. } => "path_not_found",
            Self::SpawnFailed { .. } => "spawn_failed",
            Self::AlreadyRunning { .. } => "already_running",
            Self::UnknownProject { .. } => "unknown_project",
        }
    }
}

// ==============================================================================
// Stop errors
// ==============================================================================

/// A process that could not be signaled while tearing down a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillFailure {
    pub pid: u32,
    pub reason: String,
}

impl KillFailure {
    pub fn new(pid: u32, reason: impl Into<String>) -> Self {
        Self {
            pid,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for KillFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PID {}: {}", self.pid, self.reason)
    }
}

fn join_failures(failures: &[KillFailure]) -> String {
    failures
        .iter()
        .map(|failure| failure.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Failure to stop a project's process tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StopError {
    #[error("No running process found for project {key}")]
    NotRunning { key: ProjectKey },

    #[error("Failed to kill {} process(es) for {key}: {}", .failures.len(), join_failures(.failures))]
    PartialKillFailure {
        key: ProjectKey,
        failures: Vec<KillFailure>,
    },

    #[error("Process {pid} for {key} did not exit within {timeout_ms}ms")]
    KillTimedOut {
        key: ProjectKey,
        pid: u32,
        timeout_ms: u64,
    },
}

impl StopError {
    pub fn not_running(key: ProjectKey) -> Self {
        Self::NotRunning { key }
    }

    pub fn partial_kill_failure(key: ProjectKey, failures: Vec<KillFailure>) -> Self {
        Self::PartialKillFailure { key, failures }
    }

    pub fn kill_timed_out(key: ProjectKey, pid: u32, timeout_ms: u64) -> Self {
        Self::KillTimedOut {
            key,
            pid,
            timeout_ms,
        }
    }

    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotRunning { .. } => "not_running",
            Self::PartialKillFailure { .. } => "partial_kill_failure",
            Self::KillTimedOut { .. } => "kill_timed_out",
        }
    }
}

// ==============================================================================
// Project registry errors
// ==============================================================================

/// Failure of a project registry operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProjectError {
    #[error("Project not found: {path}")]
    NotFound { path: String },

    #[error("Project already exists: {path}")]
    AlreadyExists { path: String },

    #[error("Invalid project: {message}")]
    Validation { message: String },

    #[error("Project storage error: {reason}")]
    Storage { reason: String },
}

impl ProjectError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists { path: path.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn storage(reason: impl Into<String>) -> Self {
        Self::Storage {
            reason: reason.into(),
        }
    }

    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "project_not_found",
            Self::AlreadyExists { .. } => "project_exists",
            Self::Validation { .. } => "validation",
            Self::Storage { .. } => "storage",
        }
    }
}

// ==============================================================================
// Deployment errors
// ==============================================================================

/// Failure of a deployment sequence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeployError {
    #[error("Project path not found or not a directory: {path}")]
    PathNotFound { path: String },

    #[error("Deploy step '{step}' could not be started: {reason}")]
    SpawnFailed { step: String, reason: String },

    #[error("Deploy step '{step}' failed with exit code {exit_code:?}: {stderr}")]
    StepFailed {
        step: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Deploy step '{step}' timed out after {timeout_secs}s")]
    StepTimedOut { step: String, timeout_secs: u64 },
}

impl DeployError {
    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PathNotFound { .. } => "path_not_found",
            Self::SpawnFailed { .. } => "spawn_failed",
            Self::StepFailed { .. } => "step_failed",
            Self::StepTimedOut { .. } => "step_timed_out",
        }
    }
}
