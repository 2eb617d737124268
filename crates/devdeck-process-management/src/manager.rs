//! ProcessManager - the process lifecycle facade.
//!
//! A lightweight handle that can be cloned and shared across request
//! handlers. It owns the process registry and serializes `start` / `stop` of
//! the same project through a per-key lock; different projects proceed in
//! parallel.
//!
//! ```text
//! HTTP handler
//!     ↓ start(key) / stop(key) / is_running(key)
//! ProcessManager ── ProjectSource (resolves key -> Project)
//!     ├── Launcher    → ProcessTree::spawn_detached
//!     ├── Terminator  → ProcessTree::{descendants_of, kill, kill_group}
//!     └── Reconciler  → ProcessTree::{is_alive, start_time}
//! ```

use crate::config::{DevDeckConfig, DuplicateStartPolicy};
use crate::launcher::Launcher;
use crate::locks::KeyLocks;
use crate::reconcile::Reconciler;
use crate::registry::ProcessRegistry;
use crate::terminator::Terminator;
use crate::types::{ProcessInfo, StopReport};
use devdeck_common::{LaunchError, Project, ProjectKey, StopError};
use devdeck_process::{ProcessTree, SystemProcessTree};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Lookup of registered projects by key.
pub trait ProjectSource: Send + Sync + 'static {
    fn get_project(&self, key: &ProjectKey) -> Option<Project>;
}

struct Inner {
    source: Arc<dyn ProjectSource>,
    registry: ProcessRegistry,
    locks: KeyLocks,
    launcher: Launcher,
    terminator: Terminator,
    reconciler: Reconciler,
    duplicate_start: DuplicateStartPolicy,
    reconcile_interval: Duration,
}

#[derive(Clone)]
pub struct ProcessManager {
    inner: Arc<Inner>,
}

impl ProcessManager {
    /// Manager driving real OS processes.
    pub fn new(config: &DevDeckConfig, source: Arc<dyn ProjectSource>) -> Self {
        Self::with_process_tree(config, source, Arc::new(SystemProcessTree::new()))
    }

    pub fn with_process_tree(
        config: &DevDeckConfig,
        source: Arc<dyn ProjectSource>,
        tree: Arc<dyn ProcessTree>,
    ) -> Self {
        let registry = ProcessRegistry::new();
        let inner = Inner {
            source,
            locks: KeyLocks::new(),
            launcher: Launcher::new(Arc::clone(&tree), config),
            terminator: Terminator::new(Arc::clone(&tree), registry.clone(), config.process.kill_timeout),
            reconciler: Reconciler::new(tree, registry.clone()),
            registry,
            duplicate_start: config.process.duplicate_start,
            reconcile_interval: config.process.reconcile_interval,
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Start the long-running process of the project registered under `key`.
    ///
    /// # Errors
    /// - `UnknownProject` if the key is not registered
    /// - `AlreadyRunning` if a verified live process exists and the duplicate
    ///   start policy is `reject`
    /// - `AlreadyRunning` under `replace` when the old root outlives `kill_timeout`
    /// - `PathNotFound` / `SpawnFailed` from the launcher
    pub async fn start(&self, key: &ProjectKey) -> Result<ProcessInfo, LaunchError> {
        let project = self
            .inner
            .source
            .get_project(key)
            .ok_or_else(|| LaunchError::unknown_project(key.clone()))?;

        let _guard = self.inner.locks.lock(key).await;

        if self.inner.reconciler.is_running(key).await {
            match self.inner.duplicate_start {
                DuplicateStartPolicy::Reject => {
                    let pid = self.inner.registry.get(key).map(|p| p.pid).unwrap_or_default();
                    return Err(LaunchError::already_running(key.clone(), pid));
                }
                DuplicateStartPolicy::Replace => {
                    info!("Replacing running process of {}", key);
                    match self.inner.terminator.terminate(key).await {
                        Ok(_) | Err(StopError::NotRunning { .. }) => {}
                        // The old root may still be alive; never run two trees
                        Err(StopError::KillTimedOut { pid, .. }) => {
                            warn!("Not replacing {}: previous root {} did not exit", key, pid);
                            return Err(LaunchError::already_running(key.clone(), pid));
                        }
                        Err(e) => warn!("Replacing {}: previous process tree: {}", key, e),
                    }
                }
            }
        }

        let process = self.inner.launcher.launch(key, &project)?;
        let info = process.info();
        if let Some(previous) = self.inner.registry.put(key.clone(), process) {
            // Only a stale entry can remain here; its tree is already gone
            warn!("Dropped stale entry for {} (PID: {})", key, previous.pid);
        }
        Ok(info)
    }

    /// Stop the process tree of `key`.
    pub async fn stop(&self, key: &ProjectKey) -> Result<StopReport, StopError> {
        let _guard = self.inner.locks.lock(key).await;
        self.inner.terminator.terminate(key).await
    }

    /// Stop every tracked project, one after the other.
    pub async fn stop_all(&self) -> Vec<(ProjectKey, Result<StopReport, StopError>)> {
        let mut results = Vec::new();
        for (key, _) in self.inner.registry.list() {
            let result = self.stop(&key).await;
            if let Err(e) = &result {
                warn!("Stopping {} on shutdown: {}", key, e);
            }
            results.push((key, result));
        }
        results
    }

    pub async fn is_running(&self, key: &ProjectKey) -> bool {
        self.inner.reconciler.is_running(key).await
    }

    /// Reconciled snapshot of all running project processes.
    pub async fn list_running(&self) -> Vec<ProcessInfo> {
        self.inner.reconciler.list_running().await
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.inner.registry
    }

    /// Start the background reconciler with the configured interval.
    ///
    /// Returns `None` when the interval is zero (disabled).
    pub fn spawn_reconciler(&self, token: CancellationToken) -> Option<JoinHandle<()>> {
        let interval = self.inner.reconcile_interval;
        if interval.is_zero() {
            info!("Background reconciler disabled");
            return None;
        }
        Some(self.inner.reconciler.clone().spawn(interval, token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_tree::MockProcessTree;
    use devdeck_common::ProjectType;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct StaticProjects(Mutex<HashMap<ProjectKey, Project>>);

    impl StaticProjects {
        fn with(paths: &[&str]) -> Arc<Self> {
            let projects = paths
                .iter()
                .map(|path| {
                    let project = Project::new("test", *path, ProjectType::NodeJs);
                    (project.key(), project)
                })
                .collect();
            Arc::new(Self(Mutex::new(projects)))
        }
    }

    impl ProjectSource for StaticProjects {
        fn get_project(&self, key: &ProjectKey) -> Option<Project> {
            self.0.lock().unwrap().get(key).cloned()
        }
    }

    struct Fixture {
        _dirs: Vec<tempfile::TempDir>,
        keys: Vec<ProjectKey>,
        tree: Arc<MockProcessTree>,
        manager: ProcessManager,
    }

    fn fixture(projects: usize, policy: DuplicateStartPolicy) -> Fixture {
        let dirs: Vec<_> = (0..projects).map(|_| tempfile::tempdir().unwrap()).collect();
        let paths: Vec<String> = dirs
            .iter()
            .map(|dir| dir.path().to_string_lossy().into_owned())
            .collect();
        let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();

        let mut config = DevDeckConfig::default();
        config.process.duplicate_start = policy;
        config.process.kill_timeout = Duration::from_millis(200);

        let tree = Arc::new(MockProcessTree::new());
        let manager = ProcessManager::with_process_tree(&config, StaticProjects::with(&path_refs), tree.clone());

        Fixture {
            _dirs: dirs,
            keys: paths.into_iter().map(ProjectKey::new).collect(),
            tree,
            manager,
        }
    }

    #[tokio::test]
    async fn test_start_then_stop() {
        let f = fixture(1, DuplicateStartPolicy::Reject);
        let key = &f.keys[0];

        let info = f.manager.start(key).await.unwrap();
        assert_eq!(info.pid, 100);
        assert!(f.manager.is_running(key).await);

        f.tree.add_child(100, 101);
        let report = f.manager.stop(key).await.unwrap();
        assert_eq!(report.killed, vec![101, 100]);
        assert!(!f.manager.is_running(key).await);
        assert!(f.manager.registry().is_empty());
    }

    #[tokio::test]
    async fn test_stop_never_started_is_not_running() {
        let f = fixture(1, DuplicateStartPolicy::Reject);
        let err = f.manager.stop(&f.keys[0]).await.unwrap_err();
        assert_eq!(err.kind(), "not_running");
    }

    #[tokio::test]
    async fn test_unknown_project_is_rejected() {
        let f = fixture(0, DuplicateStartPolicy::Reject);
        let err = f.manager.start(&ProjectKey::new("/not/registered")).await.unwrap_err();
        assert_eq!(err.kind(), "unknown_project");
        assert!(f.tree.spawned().is_empty());
    }

    #[tokio::test]
    async fn test_double_start_rejected() {
        let f = fixture(1, DuplicateStartPolicy::Reject);
        let key = &f.keys[0];

        f.manager.start(key).await.unwrap();
        let err = f.manager.start(key).await.unwrap_err();
        assert_eq!(err, LaunchError::already_running(key.clone(), 100));
        assert_eq!(f.tree.spawned().len(), 1);
    }

    #[tokio::test]
    async fn test_double_start_replaces_tree() {
        let f = fixture(1, DuplicateStartPolicy::Replace);
        let key = &f.keys[0];

        f.manager.start(key).await.unwrap();
        f.tree.add_child(100, 101);
        let second = f.manager.start(key).await.unwrap();

        assert_eq!(second.pid, 200);
        assert!(!f.tree.alive(100));
        assert!(!f.tree.alive(101));
        assert_eq!(f.manager.registry().len(), 1);
        assert_eq!(f.manager.registry().get(key).map(|p| p.pid), Some(200));
    }

    #[tokio::test]
    async fn test_replace_aborts_when_old_root_survives() {
        let f = fixture(1, DuplicateStartPolicy::Replace);
        let key = &f.keys[0];

        f.manager.start(key).await.unwrap();
        f.tree.ignore_kills_of(100);

        let err = f.manager.start(key).await.unwrap_err();
        assert_eq!(err, LaunchError::already_running(key.clone(), 100));
        assert_eq!(f.tree.spawned().len(), 1);
        assert!(f.manager.registry().get(key).is_none());
    }

    #[tokio::test]
    async fn test_restart_after_out_of_band_exit() {
        let f = fixture(1, DuplicateStartPolicy::Reject);
        let key = &f.keys[0];

        f.manager.start(key).await.unwrap();
        f.tree.exit(100);
        assert!(!f.manager.is_running(key).await);

        let info = f.manager.start(key).await.unwrap();
        assert_eq!(info.pid, 200);
    }

    #[tokio::test]
    async fn test_concurrent_starts_on_distinct_keys() {
        let f = fixture(4, DuplicateStartPolicy::Reject);

        let starts = f.keys.iter().map(|key| {
            let manager = f.manager.clone();
            let key = key.clone();
            tokio::spawn(async move { manager.start(&key).await })
        });
        for handle in starts.collect::<Vec<_>>() {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(f.manager.list_running().await.len(), 4);
    }

    #[tokio::test]
    async fn test_concurrent_start_and_stop_leave_consistent_state() {
        let f = fixture(1, DuplicateStartPolicy::Reject);
        let key = f.keys[0].clone();

        for _ in 0..10 {
            let (start, stop) = tokio::join!(f.manager.start(&key), f.manager.stop(&key));
            // Whatever the interleaving, the registry never keeps an entry
            // that does not match a live process
            if let Some(entry) = f.manager.registry().get(&key) {
                assert!(f.tree.alive(entry.pid));
                assert!(start.is_ok());
                assert!(stop.is_err());
            }
            let _ = f.manager.stop(&key).await;
            assert!(f.manager.registry().is_empty());
        }
    }

    #[tokio::test]
    async fn test_stop_all() {
        let f = fixture(3, DuplicateStartPolicy::Reject);
        for key in &f.keys {
            f.manager.start(key).await.unwrap();
        }

        let results = f.manager.stop_all().await;
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|(_, result)| result.is_ok()));
        assert!(f.manager.registry().is_empty());
        for pid in [100, 200, 300] {
            assert!(!f.tree.alive(pid));
        }
    }

    #[tokio::test]
    async fn test_reconciler_disabled_with_zero_interval() {
        let mut config = DevDeckConfig::default();
        config.process.reconcile_interval = Duration::ZERO;
        let manager = ProcessManager::with_process_tree(
            &config,
            StaticProjects::with(&[]),
            Arc::new(MockProcessTree::new()),
        );
        assert!(manager.spawn_reconciler(CancellationToken::new()).is_none());
    }
}
