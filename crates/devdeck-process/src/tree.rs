//! Descendant process enumeration.
//!
//! The OS process table is read once through `sysinfo` and turned into a
//! parent -> children map; the tree below the root is then walked
//! breadth-first. Discovery order guarantees that every process appears
//! after all of its ancestors, so iterating the result in reverse visits
//! every descendant before its parent.

use std::collections::{HashMap, HashSet, VecDeque};
use sysinfo::{ProcessRefreshKind, System};
use tracing::debug;

/// Enumerate all descendants of `pid` (not including `pid` itself).
///
/// The result is in breadth-first discovery order. An unknown or exited
/// `pid` yields an empty list.
pub fn descendants_of(pid: u32) -> Vec<u32> {
    let mut system = System::new();
    system.refresh_processes_specifics(ProcessRefreshKind::new());

    let edges = system.processes().iter().filter_map(|(child, process)| {
        process
            .parent()
            .map(|parent| (child.as_u32(), parent.as_u32()))
    });

    let descendants = collect_descendants(pid, edges);
    debug!("Found {} descendants of PID {}: {:?}", descendants.len(), pid, descendants);
    descendants
}

/// Walk `(child, parent)` edges breadth-first from `root`.
///
/// Siblings are visited in ascending PID order so the result is
/// deterministic for a given snapshot. Self-parented entries and cycles
/// (possible in a torn snapshot) are ignored.
pub fn collect_descendants(root: u32, edges: impl IntoIterator<Item = (u32, u32)>) -> Vec<u32> {
    let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
    for (child, parent) in edges {
        if child != parent {
            children.entry(parent).or_default().push(child);
        }
    }
    for siblings in children.values_mut() {
        siblings.sort_unstable();
    }

    let mut seen = HashSet::from([root]);
    let mut queue = VecDeque::from([root]);
    let mut order = Vec::new();

    while let Some(current) = queue.pop_front() {
        let Some(siblings) = children.get(&current) else {
            continue;
        };
        for &child in siblings {
            if seen.insert(child) {
                order.push(child);
                queue.push_back(child);
            }
        }
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_descendants_breadth_first() {
        // 100 -> {101, 102}, 101 -> {103}, 103 -> {104}; 200 is unrelated
        let edges = vec![(101, 100), (102, 100), (103, 101), (104, 103), (201, 200)];
        assert_eq!(collect_descendants(100, edges), vec![101, 102, 103, 104]);
    }

    #[test]
    fn test_collect_descendants_leaf_and_unknown_root() {
        let edges = vec![(101, 100)];
        assert!(collect_descendants(101, edges.clone()).is_empty());
        assert!(collect_descendants(999, edges).is_empty());
    }

    #[test]
    fn test_collect_descendants_ignores_cycles() {
        let edges = vec![(101, 100), (100, 101), (102, 102)];
        assert_eq!(collect_descendants(100, edges), vec![101]);
    }

    #[test]
    fn test_reverse_order_kills_children_first() {
        let edges = vec![(101, 100), (102, 101), (103, 100)];
        let order = collect_descendants(100, edges);
        let reversed: Vec<u32> = order.into_iter().rev().collect();
        let position = |pid| reversed.iter().position(|&p| p == pid).unwrap();
        assert!(position(102) < position(101));
    }

    #[test]
    #[cfg(unix)]
    fn test_descendants_of_shell_with_child() {
        let mut shell = std::process::Command::new("sh")
            .arg("-c")
            .arg("sleep 30 & wait")
            .spawn()
            .unwrap();
        let pid = shell.id();

        let mut found = Vec::new();
        for _ in 0..50 {
            found = descendants_of(pid);
            if !found.is_empty() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        assert!(!found.is_empty(), "sleep child of PID {} not found", pid);

        for child in found.iter().rev() {
            let _ = crate::force_kill(*child);
        }
        let _ = shell.kill();
        let _ = shell.wait();
    }
}
