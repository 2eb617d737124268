//! The `ProcessTree` capability.
//!
//! Everything the process manager needs from the OS, behind one trait:
//!
//! ```text
//! Launcher / Terminator / Reconciler
//!       ↓ uses
//! ProcessTree trait (capability)
//!       ↓ implemented by
//! SystemProcessTree (nix + sysinfo on Unix, windows + sysinfo on Windows)
//! ```
//!
//! All methods except `spawn_detached` may block for a noticeable time (they
//! scan the OS process table); async callers run them on the blocking pool.

use crate::check::{process_is_alive, process_start_time};
use crate::spawn::{spawn_detached, LaunchSpec};
use crate::terminate::{force_kill, kill_process_group, KillOutcome};
use crate::tree::descendants_of;
use devdeck_common::ProcessResult;
use tokio::process::Child;

/// Identity of a freshly spawned root process.
#[derive(Debug)]
pub struct RootHandle {
    pub pid: u32,
    pub pgid: Option<u32>,
    /// OS start time captured right after spawn (seconds since epoch).
    pub start_time: Option<u64>,
    /// Child handle used to reap the process; `None` when the process is not
    /// a child of this manager.
    pub child: Option<Child>,
}

/// OS process capability used by the process manager.
pub trait ProcessTree: Send + Sync + 'static {
    /// Spawn a detached session / process group leader.
    fn spawn_detached(&self, spec: &LaunchSpec) -> ProcessResult<RootHandle>;

    /// All descendants of `pid`, in breadth-first discovery order.
    fn descendants_of(&self, pid: u32) -> Vec<u32>;

    /// Forcefully kill a single process.
    fn kill(&self, pid: u32) -> ProcessResult<KillOutcome>;

    /// Forcefully kill a whole process group.
    fn kill_group(&self, pgid: u32) -> ProcessResult<KillOutcome>;

    /// Whether `pid` exists and has not exited.
    fn is_alive(&self, pid: u32) -> bool;

    /// OS-reported start time of `pid`, used to detect PID reuse.
    fn start_time(&self, pid: u32) -> Option<u64>;
}

/// `ProcessTree` backed by the real operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessTree;

impl SystemProcessTree {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessTree for SystemProcessTree {
    fn spawn_detached(&self, spec: &LaunchSpec) -> ProcessResult<RootHandle> {
        let detached = spawn_detached(spec)?;
        Ok(RootHandle {
            pid: detached.pid,
            pgid: detached.pgid,
            start_time: process_start_time(detached.pid),
            child: Some(detached.child),
        })
    }

    fn descendants_of(&self, pid: u32) -> Vec<u32> {
        descendants_of(pid)
    }

    fn kill(&self, pid: u32) -> ProcessResult<KillOutcome> {
        force_kill(pid)
    }

    fn kill_group(&self, pgid: u32) -> ProcessResult<KillOutcome> {
        kill_process_group(pgid)
    }

    fn is_alive(&self, pid: u32) -> bool {
        process_is_alive(pid)
    }

    fn start_time(&self, pid: u32) -> Option<u64> {
        process_start_time(pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    #[cfg(unix)]
    async fn test_system_tree_spawn_and_kill() {
        let dir = tempfile::tempdir().unwrap();
        let tree = SystemProcessTree::new();
        let spec = LaunchSpec {
            id: "tree-test".to_string(),
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "sleep 30".to_string()],
            working_directory: dir.path().to_path_buf(),
            environment: HashMap::new(),
            output_file: None,
        };

        let mut root = tree.spawn_detached(&spec).unwrap();
        assert!(tree.is_alive(root.pid));
        assert!(root.start_time.is_some());
        assert_eq!(tree.start_time(root.pid), root.start_time);

        assert_eq!(tree.kill(root.pid).unwrap(), KillOutcome::Killed);
        let mut child = root.child.take().unwrap();
        child.wait().await.unwrap();
        assert!(!tree.is_alive(root.pid));
    }
}
