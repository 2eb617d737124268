//! Scriptable in-memory `ProcessTree` for unit tests.

use devdeck_common::{ProcessError, ProcessResult};
use devdeck_process::{collect_descendants, KillOutcome, LaunchSpec, ProcessTree, RootHandle};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Default)]
struct MockState {
    next_pid: u32,
    /// pid -> (start time, process group)
    alive: HashMap<u32, (u64, u32)>,
    parents: HashMap<u32, u32>,
    failing: HashSet<u32>,
    stubborn: HashSet<u32>,
    spawn_error: Option<String>,
    kills: Vec<u32>,
    group_kills: Vec<u32>,
    spawned: Vec<LaunchSpec>,
}

/// Roots are spawned as pid 100, 200, 300, ...
pub(crate) struct MockProcessTree {
    state: Mutex<MockState>,
}

impl MockProcessTree {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                next_pid: 100,
                ..Default::default()
            }),
        }
    }

    /// Register `child` as a live child of `parent`, in the parent's group.
    pub(crate) fn add_child(&self, parent: u32, child: u32) {
        let mut state = self.state.lock().unwrap();
        let group = state.alive.get(&parent).map(|(_, group)| *group).unwrap_or(parent);
        state.alive.insert(child, (child as u64, group));
        state.parents.insert(child, parent);
    }

    /// Make every kill of `pid` fail.
    pub(crate) fn fail_kills_of(&self, pid: u32) {
        self.state.lock().unwrap().failing.insert(pid);
    }

    /// Make `pid` survive every signal.
    pub(crate) fn ignore_kills_of(&self, pid: u32) {
        self.state.lock().unwrap().stubborn.insert(pid);
    }

    pub(crate) fn fail_spawns(&self, reason: &str) {
        self.state.lock().unwrap().spawn_error = Some(reason.to_string());
    }

    /// Simulate an exit that this manager did not cause.
    pub(crate) fn exit(&self, pid: u32) {
        self.state.lock().unwrap().alive.remove(&pid);
    }

    /// Simulate the OS handing `pid` to an unrelated process.
    pub(crate) fn reuse_pid(&self, pid: u32) {
        let mut state = self.state.lock().unwrap();
        state.alive.insert(pid, (u64::MAX, 1));
        state.parents.retain(|_, parent| *parent != pid);
    }

    pub(crate) fn kills(&self) -> Vec<u32> {
        self.state.lock().unwrap().kills.clone()
    }

    pub(crate) fn group_kills(&self) -> Vec<u32> {
        self.state.lock().unwrap().group_kills.clone()
    }

    pub(crate) fn spawned(&self) -> Vec<LaunchSpec> {
        self.state.lock().unwrap().spawned.clone()
    }

    pub(crate) fn alive(&self, pid: u32) -> bool {
        self.state.lock().unwrap().alive.contains_key(&pid)
    }
}

impl ProcessTree for MockProcessTree {
    fn spawn_detached(&self, spec: &LaunchSpec) -> ProcessResult<RootHandle> {
        let mut state = self.state.lock().unwrap();
        if let Some(reason) = &state.spawn_error {
            return Err(ProcessError::spawn_failed(&spec.id, reason.clone()));
        }
        let pid = state.next_pid;
        state.next_pid += 100;
        state.alive.insert(pid, (pid as u64, pid));
        state.spawned.push(spec.clone());
        Ok(RootHandle {
            pid,
            pgid: Some(pid),
            start_time: Some(pid as u64),
            child: None,
        })
    }

    fn descendants_of(&self, pid: u32) -> Vec<u32> {
        let state = self.state.lock().unwrap();
        let edges = state
            .parents
            .iter()
            .filter(|(child, _)| state.alive.contains_key(child))
            .map(|(child, parent)| (*child, *parent));
        collect_descendants(pid, edges)
    }

    fn kill(&self, pid: u32) -> ProcessResult<KillOutcome> {
        let mut state = self.state.lock().unwrap();
        state.kills.push(pid);
        if state.failing.contains(&pid) {
            return Err(ProcessError::kill_failed(pid, "Operation not permitted"));
        }
        if !state.alive.contains_key(&pid) {
            return Ok(KillOutcome::AlreadyExited);
        }
        if !state.stubborn.contains(&pid) {
            state.alive.remove(&pid);
        }
        Ok(KillOutcome::Killed)
    }

    fn kill_group(&self, pgid: u32) -> ProcessResult<KillOutcome> {
        let mut state = self.state.lock().unwrap();
        state.group_kills.push(pgid);
        let members: Vec<u32> = state
            .alive
            .iter()
            .filter(|(_, (_, group))| *group == pgid)
            .map(|(pid, _)| *pid)
            .collect();
        if members.is_empty() {
            return Ok(KillOutcome::AlreadyExited);
        }
        for pid in members {
            if !state.stubborn.contains(&pid) && !state.failing.contains(&pid) {
                state.alive.remove(&pid);
            }
        }
        Ok(KillOutcome::Killed)
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.state.lock().unwrap().alive.contains_key(&pid)
    }

    fn start_time(&self, pid: u32) -> Option<u64> {
        self.state.lock().unwrap().alive.get(&pid).map(|(start, _)| *start)
    }
}
