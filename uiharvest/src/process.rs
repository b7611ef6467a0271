//! Tracking the set of processes that make up one running application.
//!
//! Launchers often hand off to a child (stub launchers, renderer and helper
//! processes), so a single pid is rarely enough to find the window. The set
//! is always recomputed from the live process table: children spawned after
//! launch must be picked up by later snapshot and close calls.

use crate::platforms::ProcessOps;
use crate::types::ProcessInfo;
use crate::HarvestError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// All pids believed to belong to one logical application instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSet {
    pids: BTreeSet<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exe_path: Option<PathBuf>,
}

impl ProcessSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pids(pids: impl IntoIterator<Item = u32>) -> Self {
        Self {
            pids: pids.into_iter().collect(),
            exe_path: None,
        }
    }

    pub fn with_exe_path(mut self, exe_path: impl Into<PathBuf>) -> Self {
        self.exe_path = Some(exe_path.into());
        self
    }

    pub fn exe_path(&self) -> Option<&Path> {
        self.exe_path.as_deref()
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.pids.contains(&pid)
    }

    /// Returns true when the pid was not already tracked.
    pub fn insert(&mut self, pid: u32) -> bool {
        self.pids.insert(pid)
    }

    pub fn extend(&mut self, pids: impl IntoIterator<Item = u32>) {
        self.pids.extend(pids);
    }

    /// Explicit removal; the set never shrinks any other way.
    pub fn remove(&mut self, pid: u32) -> bool {
        self.pids.remove(&pid)
    }

    pub fn clear(&mut self) {
        self.pids.clear();
    }

    pub fn len(&self) -> usize {
        self.pids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.pids.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<u32> {
        self.pids.iter().copied().collect()
    }
}

impl FromIterator<u32> for ProcessSet {
    fn from_iter<T: IntoIterator<Item = u32>>(iter: T) -> Self {
        Self::from_pids(iter)
    }
}

/// Seeds plus every process reachable through the parent → children
/// relation. Processes that vanish or deny access mid-walk are skipped; the
/// seeds themselves are always kept.
#[instrument(skip(processes))]
pub fn expand(processes: &dyn ProcessOps, seeds: &[u32]) -> ProcessSet {
    let mut set = ProcessSet::from_pids(seeds.iter().copied());
    let mut queue: VecDeque<u32> = seeds.iter().copied().collect();
    let mut visited = BTreeSet::new();

    while let Some(pid) = queue.pop_front() {
        // Pid reuse can make the parent relation cyclic.
        if !visited.insert(pid) {
            continue;
        }
        match processes.children_of(pid) {
            Ok(children) => {
                for child in children {
                    if set.insert(child) {
                        debug!("discovered child process {} of {}", child, pid);
                    }
                    queue.push_back(child);
                }
            }
            Err(e @ (HarvestError::ProcessNotFound(_) | HarvestError::AccessDenied(_))) => {
                debug!("skipping pid {} during expansion: {}", pid, e);
            }
            Err(e) => {
                debug!("could not list children of {}: {}", pid, e);
            }
        }
    }

    debug!("expanded {:?} to {} processes", seeds, set.len());
    set
}

/// Canonical form of an executable path, used to compare processes by the
/// file they run rather than by name.
pub fn canonical_exe_path(path: &Path) -> PathBuf {
    match std::fs::canonicalize(path) {
        Ok(canonical) => canonical,
        Err(_) => std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf()),
    }
}

fn same_executable(candidate: &Path, target: &Path) -> bool {
    let candidate = canonical_exe_path(candidate);
    if cfg!(target_os = "windows") {
        candidate.to_string_lossy().to_lowercase() == target.to_string_lossy().to_lowercase()
    } else {
        candidate == target
    }
}

/// Every live process whose canonical executable path equals `exe_path`, in
/// process-table order.
pub fn processes_for_executable(
    processes: &dyn ProcessOps,
    exe_path: &Path,
) -> Result<Vec<ProcessInfo>, HarvestError> {
    let target = canonical_exe_path(exe_path);
    Ok(processes
        .list_processes()?
        .into_iter()
        .filter(|info| {
            info.exe_path
                .as_deref()
                .is_some_and(|exe| same_executable(exe, &target))
        })
        .collect())
}
