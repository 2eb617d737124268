//! Reconciliation of the registry against the OS process table.
//!
//! Registry entries and OS processes fail independently: a project can exit
//! on its own, be killed from outside, or have its pid handed to another
//! program. Queries verify every entry they report on and drop the stale
//! ones with a compare-and-remove, so they never race a concurrent start.

use crate::registry::ProcessRegistry;
use crate::types::{ManagedProcess, ProcessInfo};
use devdeck_common::ProjectKey;
use devdeck_process::ProcessTree;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct Reconciler {
    tree: Arc<dyn ProcessTree>,
    registry: ProcessRegistry,
}

impl Reconciler {
    pub fn new(tree: Arc<dyn ProcessTree>, registry: ProcessRegistry) -> Self {
        Self { tree, registry }
    }

    /// Whether `key` has a verified live process; drops a stale entry.
    pub async fn is_running(&self, key: &ProjectKey) -> bool {
        match self.registry.get(key) {
            Some(process) => self.check(process).await.0,
            None => false,
        }
    }

    /// Reconcile every entry and report the survivors, ordered by key.
    pub async fn list_running(&self) -> Vec<ProcessInfo> {
        let mut running = Vec::new();
        for (_, process) in self.registry.list() {
            let info = process.info();
            if self.check(process).await.0 {
                running.push(info);
            }
        }
        running
    }

    /// Drop every stale entry; returns how many were removed.
    pub async fn reconcile_all(&self) -> usize {
        let mut removed = 0;
        for (key, process) in self.registry.list() {
            let pid = process.pid;
            if let (false, true) = self.check(process).await {
                debug!("Reconciled stale entry {} (PID: {})", key, pid);
                removed += 1;
            }
        }
        removed
    }

    /// Run [`Reconciler::reconcile_all`] every `interval` until `token` is cancelled.
    pub fn spawn(self, interval: Duration, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Reconciler started (interval: {:?})", interval);
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = self.reconcile_all().await;
                        if removed > 0 {
                            info!("Reconciler removed {} stale entr(ies)", removed);
                        }
                    }
                }
            }
            info!("Reconciler stopped");
        })
    }

    /// Returns `(alive, removed)`.
    async fn check(&self, process: ManagedProcess) -> (bool, bool) {
        // Cheap path: the exit monitor already saw the exit
        let alive = if process.exit.has_exited() {
            false
        } else {
            let tree = Arc::clone(&self.tree);
            let target = process.clone();
            match tokio::task::spawn_blocking(move || target.identity_matches(tree.as_ref())).await {
                Ok(alive) => alive,
                Err(e) => {
                    // Unknown; keep the entry
                    warn!("Liveness check for {} failed: {}", process.key, e);
                    true
                }
            }
        };

        let removed = !alive && self.registry.remove_if_pid(&process.key, process.pid);
        if removed {
            info!(
                "Project {} (PID: {}) is no longer running; entry removed",
                process.key, process.pid
            );
        }
        (alive, removed)
    }
}
