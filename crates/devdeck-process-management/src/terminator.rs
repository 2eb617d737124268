//! Process tree termination.
//!
//! Stopping a project tears down the whole tree below the launched root:
//!
//! 1. Verify the tracked identity (not exited, pid alive, same start time).
//!    An unverified root is never signaled, nor is anything below its pid.
//! 2. Enumerate descendants breadth-first, then kill them in reverse order
//!    (children before parents), then the root.
//! 3. Sweep the process group to catch anything forked after enumeration.
//! 4. Wait, bounded by `kill_timeout`, for the root to be reaped.
//! 5. Drop the registry entry (compare-and-remove on the pid).

use crate::registry::ProcessRegistry;
use crate::types::{ManagedProcess, StopReport};
use devdeck_common::{KillFailure, ProjectKey, StopError};
use devdeck_process::{KillOutcome, ProcessTree};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Poll period while waiting for an untracked root to disappear
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// What the blocking kill pass did
#[derive(Debug, Default)]
struct KillSweep {
    root_verified: bool,
    killed: Vec<u32>,
    failures: Vec<KillFailure>,
}

pub struct Terminator {
    tree: Arc<dyn ProcessTree>,
    registry: ProcessRegistry,
    kill_timeout: Duration,
}

impl Terminator {
    pub fn new(tree: Arc<dyn ProcessTree>, registry: ProcessRegistry, kill_timeout: Duration) -> Self {
        Self {
            tree,
            registry,
            kill_timeout,
        }
    }

    /// Kill the tracked process tree of `key` and forget it.
    pub async fn terminate(&self, key: &ProjectKey) -> Result<StopReport, StopError> {
        let Some(process) = self.registry.get(key) else {
            return Err(StopError::not_running(key.clone()));
        };

        info!("Stopping {} (PID: {}, PGID: {:?})", key, process.pid, process.pgid);

        let sweep = {
            let tree = Arc::clone(&self.tree);
            let target = process.clone();
            match tokio::task::spawn_blocking(move || kill_tree(tree.as_ref(), &target)).await {
                Ok(sweep) => sweep,
                Err(e) => {
                    error!("Kill task for {} failed: {}", key, e);
                    KillSweep {
                        root_verified: true,
                        killed: Vec::new(),
                        failures: vec![KillFailure::new(process.pid, format!("kill task failed: {}", e))],
                    }
                }
            }
        };

        // An unverified root was not ours anymore; there is nothing to wait for
        let exited = !sweep.root_verified || self.wait_for_exit(&process).await;

        if self.registry.remove_if_pid(key, process.pid) {
            debug!("Removed registry entry for {} (PID: {})", key, process.pid);
        }

        if !exited {
            if !sweep.failures.is_empty() {
                warn!(
                    "Also failed to kill {} process(es) for {}: {:?}",
                    sweep.failures.len(),
                    key,
                    sweep.failures
                );
            }
            warn!(
                "Process {} for {} not confirmed dead after {:?}",
                process.pid, key, self.kill_timeout
            );
            return Err(StopError::kill_timed_out(
                key.clone(),
                process.pid,
                self.kill_timeout.as_millis() as u64,
            ));
        }

        if !sweep.failures.is_empty() {
            warn!("Partial kill failure for {}: {:?}", key, sweep.failures);
            return Err(StopError::partial_kill_failure(key.clone(), sweep.failures));
        }

        info!("Stopped {} (killed: {:?})", key, sweep.killed);
        Ok(StopReport {
            key: key.clone(),
            pid: process.pid,
            killed: sweep.killed,
        })
    }

    /// Wait until the root is reaped, bounded by `kill_timeout`.
    async fn wait_for_exit(&self, process: &ManagedProcess) -> bool {
        if process.exit.is_tracked() {
            match tokio::time::timeout(self.kill_timeout, process.exit.wait()).await {
                Ok(Some(exit)) => {
                    debug!("Root {} reaped (code: {:?})", process.pid, exit.code);
                    return true;
                }
                // Monitor gone without a result; fall through to polling
                Ok(None) => {}
                Err(_) => return false,
            }
        }

        let tree = Arc::clone(&self.tree);
        let pid = process.pid;
        tokio::time::timeout(self.kill_timeout, async move {
            while tree.is_alive(pid) {
                tokio::time::sleep(EXIT_POLL_INTERVAL).await;
            }
        })
        .await
        .is_ok()
    }
}

/// Blocking kill pass over the tree of `process`.
fn kill_tree(tree: &dyn ProcessTree, process: &ManagedProcess) -> KillSweep {
    let mut sweep = KillSweep {
        root_verified: process.identity_matches(tree),
        ..Default::default()
    };

    if sweep.root_verified {
        let descendants = tree.descendants_of(process.pid);
        debug!("Killing {} descendant(s) of {}: {:?}", descendants.len(), process.pid, descendants);

        for pid in descendants.iter().rev().copied().chain(std::iter::once(process.pid)) {
            match tree.kill(pid) {
                Ok(KillOutcome::Killed) => sweep.killed.push(pid),
                Ok(KillOutcome::AlreadyExited) => {
                    debug!("PID {} already exited", pid);
                    sweep.killed.push(pid);
                }
                Err(e) => {
                    warn!("Failed to kill PID {}: {}", pid, e);
                    sweep.failures.push(KillFailure::new(pid, e.to_string()));
                }
            }
        }
    } else {
        info!(
            "PID {} for {} already exited or was reused; not signaling it",
            process.pid, process.key
        );
    }

    // Only sweep a group whose leader was ours
    if let Some(pgid) = process.pgid {
        if sweep.root_verified || (process.exit.has_exited() && group_id_unclaimed(tree, pgid, process)) {
            match tree.kill_group(pgid) {
                Ok(KillOutcome::Killed) => debug!("Swept process group {}", pgid),
                Ok(KillOutcome::AlreadyExited) => debug!("Process group {} already empty", pgid),
                Err(e) => {
                    warn!("Failed to sweep process group {}: {}", pgid, e);
                    sweep.failures.push(KillFailure::new(pgid, e.to_string()));
                }
            }
        } else if process.exit.has_exited() {
            info!("PID {} now belongs to another process; not sweeping its group", pgid);
        }
    }

    sweep
}

/// The group id of an exited leader is still ours unless its pid now runs
/// something with a different start time.
fn group_id_unclaimed(tree: &dyn ProcessTree, pgid: u32, process: &ManagedProcess) -> bool {
    match tree.start_time(pgid) {
        None => true,
        Some(start) => process.os_start_time == Some(start),
    }
}
