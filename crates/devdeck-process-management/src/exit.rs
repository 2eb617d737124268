//! Exit monitoring for launched processes.
//!
//! The monitor task owns the spawned [`Child`] and awaits it, so the root
//! process is reaped as soon as it exits (no zombies) and the exit is
//! published to every clone of the [`ExitMonitor`] through a watch channel.

use chrono::{DateTime, Utc};
use devdeck_common::ProjectKey;
use tokio::process::Child;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Observed exit of a root process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit code; `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub at: DateTime<Utc>,
}

/// Read side of an exit monitor task.
#[derive(Debug, Clone)]
pub struct ExitMonitor {
    rx: Option<watch::Receiver<Option<ProcessExit>>>,
}

impl ExitMonitor {
    /// Spawn a task that reaps `child` and publishes its exit.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(key: &ProjectKey, pid: u32, mut child: Child) -> Self {
        let (tx, rx) = watch::channel(None);
        let key = key.clone();

        tokio::spawn(async move {
            debug!("Exit monitor started for {} (PID: {})", key, pid);

            match child.wait().await {
                Ok(status) => {
                    if status.success() {
                        info!("Process for {} (PID: {}) exited successfully", key, pid);
                    } else {
                        warn!("Process for {} (PID: {}) exited with status: {}", key, pid, status);
                    }
                    let _ = tx.send(Some(ProcessExit {
                        code: status.code(),
                        at: Utc::now(),
                    }));
                }
                Err(e) => {
                    // Dropping the sender tells waiters to fall back to polling
                    error!("Failed to wait for process {} (PID: {}): {}", key, pid, e);
                }
            }
        });

        Self { rx: Some(rx) }
    }

    /// A monitor for a process this manager cannot reap; it never reports an exit.
    pub fn untracked() -> Self {
        Self { rx: None }
    }

    /// A monitor whose process already exited with `code`.
    #[cfg(test)]
    pub(crate) fn exited(code: Option<i32>) -> Self {
        let (_tx, rx) = watch::channel(Some(ProcessExit { code, at: Utc::now() }));
        Self { rx: Some(rx) }
    }

    /// Whether an exit will ever be published by this monitor.
    pub fn is_tracked(&self) -> bool {
        self.rx.is_some()
    }

    pub fn has_exited(&self) -> bool {
        self.exit().is_some()
    }

    pub fn exit(&self) -> Option<ProcessExit> {
        self.rx.as_ref().and_then(|rx| *rx.borrow())
    }

    /// Wait until the exit is published.
    ///
    /// Returns `None` immediately if no exit can be published (untracked, or
    /// the monitor task failed).
    pub async fn wait(&self) -> Option<ProcessExit> {
        let mut rx = self.rx.clone()?;
        let exit = match rx.wait_for(|exit| exit.is_some()).await {
            Ok(exit) => *exit,
            Err(_) => None,
        };
        exit
    }
}
