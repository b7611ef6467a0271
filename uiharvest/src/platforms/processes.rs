//! Process primitive backed by `sysinfo`.

use super::ProcessOps;
use crate::types::ProcessInfo;
use crate::HarvestError;
use std::path::Path;
use std::process::{Command, Stdio};
use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System, UpdateKind};

/// Reads the process table fresh on every call; nothing is cached between
/// requests.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcesses;

impl SystemProcesses {
    pub fn new() -> Self {
        Self
    }

    fn snapshot() -> System {
        let mut system = System::new();
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_exe(UpdateKind::OnlyIfNotSet),
        );
        system
    }

    #[cfg(not(target_os = "windows"))]
    fn descendants(system: &System, pid: u32) -> Vec<u32> {
        let mut found = Vec::new();
        let mut frontier = vec![pid];
        while let Some(current) = frontier.pop() {
            for (child_pid, process) in system.processes() {
                if process.parent().map(|p| p.as_u32()) == Some(current)
                    && child_pid.as_u32() != pid
                    && !found.contains(&child_pid.as_u32())
                {
                    found.push(child_pid.as_u32());
                    frontier.push(child_pid.as_u32());
                }
            }
        }
        found
    }
}

fn is_running(status: ProcessStatus) -> bool {
    !matches!(status, ProcessStatus::Zombie | ProcessStatus::Dead)
}

impl ProcessOps for SystemProcesses {
    fn spawn(&self, path: &Path) -> Result<u32, HarvestError> {
        let mut child = Command::new(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| HarvestError::LaunchFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        let pid = child.id();
        // Reap the child when it exits so it never lingers as a zombie.
        std::thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(pid)
    }

    fn list_processes(&self) -> Result<Vec<ProcessInfo>, HarvestError> {
        let system = Self::snapshot();
        let mut processes: Vec<ProcessInfo> = system
            .processes()
            .iter()
            .filter(|(_, process)| is_running(process.status()))
            .map(|(pid, process)| ProcessInfo {
                pid: pid.as_u32(),
                parent_pid: process.parent().map(|p| p.as_u32()),
                name: process.name().to_string_lossy().to_string(),
                exe_path: process.exe().map(Path::to_path_buf),
                start_time: Some(process.start_time()),
            })
            .collect();
        processes.sort_by_key(|info| info.pid);
        Ok(processes)
    }

    fn children_of(&self, pid: u32) -> Result<Vec<u32>, HarvestError> {
        let system = Self::snapshot();
        if system.process(Pid::from_u32(pid)).is_none() {
            return Err(HarvestError::ProcessNotFound(pid));
        }
        Ok(system
            .processes()
            .iter()
            .filter(|(_, process)| process.parent().map(|p| p.as_u32()) == Some(pid))
            .map(|(child, _)| child.as_u32())
            .collect())
    }

    fn is_alive(&self, pid: u32) -> bool {
        let mut system = System::new();
        let target = [Pid::from_u32(pid)];
        system.refresh_processes(ProcessesToUpdate::Some(&target), true);
        system
            .process(Pid::from_u32(pid))
            .map(|process| is_running(process.status()))
            .unwrap_or(false)
    }

    #[cfg(target_os = "windows")]
    fn kill_tree(&self, pid: u32) -> Result<(), HarvestError> {
        tracing::debug!("taskkill /PID {} /T /F", pid);
        let output = Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/T", "/F"])
            .stdin(Stdio::null())
            .output()
            .map_err(|e| HarvestError::PlatformError(format!("Failed to run taskkill: {e}")))?;
        if output.status.success() {
            return Ok(());
        }
        if !self.is_alive(pid) {
            return Err(HarvestError::ProcessNotFound(pid));
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(HarvestError::PlatformError(format!(
            "taskkill exited with {}: {stderr}",
            output.status
        )))
    }

    #[cfg(not(target_os = "windows"))]
    fn kill_tree(&self, pid: u32) -> Result<(), HarvestError> {
        let system = Self::snapshot();
        let root = system
            .process(Pid::from_u32(pid))
            .ok_or(HarvestError::ProcessNotFound(pid))?;

        // Children first so nothing gets re-parented mid-walk.
        let mut failed = Vec::new();
        for child in Self::descendants(&system, pid).into_iter().rev() {
            if let Some(process) = system.process(Pid::from_u32(child)) {
                if !process.kill() {
                    failed.push(child);
                }
            }
        }
        if !root.kill() {
            failed.push(pid);
        }

        if failed.is_empty() {
            Ok(())
        } else {
            tracing::warn!("kill signal refused for pids {:?}", failed);
            Err(HarvestError::PlatformError(format!(
                "Failed to signal pids {failed:?}"
            )))
        }
    }

    fn kill(&self, pid: u32) -> Result<(), HarvestError> {
        let mut system = System::new();
        let target = [Pid::from_u32(pid)];
        system.refresh_processes(ProcessesToUpdate::Some(&target), true);
        let process = system
            .process(Pid::from_u32(pid))
            .ok_or(HarvestError::ProcessNotFound(pid))?;
        if process.kill() {
            Ok(())
        } else if !self.is_alive(pid) {
            Err(HarvestError::ProcessNotFound(pid))
        } else {
            Err(HarvestError::AccessDenied(pid))
        }
    }
}
