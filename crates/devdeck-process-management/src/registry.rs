//! In-memory registry of live project processes.
//!
//! One entry per project key. Cloning the registry shares the same map.
//! Not persisted: the registry starts empty on every server start.

use crate::types::ManagedProcess;
use dashmap::DashMap;
use devdeck_common::ProjectKey;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct ProcessRegistry {
    entries: Arc<DashMap<ProjectKey, ManagedProcess>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `key`, returning the previous one.
    pub fn put(&self, key: ProjectKey, process: ManagedProcess) -> Option<ManagedProcess> {
        self.entries.insert(key, process)
    }

    pub fn get(&self, key: &ProjectKey) -> Option<ManagedProcess> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, key: &ProjectKey) -> Option<ManagedProcess> {
        self.entries.remove(key).map(|(_, process)| process)
    }

    /// Remove the entry for `key` only if it still tracks `pid`.
    ///
    /// Returns whether an entry was removed. A newer entry installed for the
    /// same key by a concurrent start is left alone.
    pub fn remove_if_pid(&self, key: &ProjectKey, pid: u32) -> bool {
        self.entries
            .remove_if(key, |_, process| process.pid == pid)
            .is_some()
    }

    /// Snapshot of all entries, ordered by key.
    pub fn list(&self) -> Vec<(ProjectKey, ManagedProcess)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
