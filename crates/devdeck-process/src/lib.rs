//! # DevDeck Process
//!
//! Low-level process operations for DevDeck.
//!
//! This crate provides cross-platform primitives for:
//! - Spawning a process as a detached session / process group leader
//! - Enumerating the descendant tree of a process
//! - Forceful termination of a process or a whole process group
//! - Process existence and identity (start time) checks
//!
//! The [`ProcessTree`] trait bundles these primitives into the single
//! capability the process manager depends on, so the lifecycle logic can be
//! exercised against a scripted fake.

pub mod check;
pub mod process_tree;
pub mod spawn;
pub mod terminate;
pub mod tree;

// Re-export main types
pub use check::*;
pub use process_tree::{ProcessTree, RootHandle, SystemProcessTree};
pub use spawn::*;
pub use terminate::*;
pub use tree::*;
