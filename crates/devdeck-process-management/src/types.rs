//! Process lifecycle data types.

use crate::exit::ExitMonitor;
use chrono::{DateTime, Utc};
use devdeck_common::ProjectKey;
use devdeck_process::ProcessTree;
use serde::Serialize;

/// A process launched for a project, tracked until it is known to be gone.
#[derive(Debug, Clone)]
pub struct ManagedProcess {
    pub key: ProjectKey,
    pub pid: u32,
    pub pgid: Option<u32>,
    pub started_at: DateTime<Utc>,
    /// OS start time captured at spawn; guards against PID reuse.
    pub os_start_time: Option<u64>,
    pub exit: ExitMonitor,
}

impl ManagedProcess {
    /// Whether the OS still runs the very process that was launched.
    ///
    /// False once the exit monitor saw the exit, when the pid is gone, or when
    /// the pid now belongs to a process with a different start time. Blocking:
    /// may read the OS process table.
    pub fn identity_matches(&self, tree: &dyn ProcessTree) -> bool {
        if self.exit.has_exited() || !tree.is_alive(self.pid) {
            return false;
        }
        match (self.os_start_time, tree.start_time(self.pid)) {
            (Some(recorded), Some(current)) => recorded == current,
            _ => true,
        }
    }

    pub fn info(&self) -> ProcessInfo {
        let uptime = Utc::now().signed_duration_since(self.started_at);
        ProcessInfo {
            key: self.key.clone(),
            pid: self.pid,
            pgid: self.pgid,
            started_at: self.started_at,
            uptime_secs: u64::try_from(uptime.num_seconds()).unwrap_or(0),
        }
    }
}

/// Serializable snapshot of a running project process
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessInfo {
    pub key: ProjectKey,
    pub pid: u32,
    pub pgid: Option<u32>,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
}

/// Outcome of a successful stop
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StopReport {
    pub key: ProjectKey,
    /// Root pid of the stopped tree.
    pub pid: u32,
    /// Every pid that was signaled, descendants first and root last.
    pub killed: Vec<u32>,
}
