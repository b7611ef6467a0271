//! Escalating termination: Graceful → Signal → Force.
//!
//! Each tier runs only when the previous one did not confirm that the
//! process is gone. Confirmation is the liveness check after the tier's
//! settle interval. A process that exits on its own at any point is a
//! success, never a failure.

use crate::platforms::{ProcessOps, WindowOps};
use crate::process::expand;
use crate::types::WindowInfo;
use crate::HarvestError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// The step that confirmed the process was gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosedBy {
    AlreadyExited,
    WindowClose,
    CloseSignal,
    KillTree,
    DirectKill,
}

impl ClosedBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClosedBy::AlreadyExited => "already_exited",
            ClosedBy::WindowClose => "window_close",
            ClosedBy::CloseSignal => "close_signal",
            ClosedBy::KillTree => "kill_tree",
            ClosedBy::DirectKill => "direct_kill",
        }
    }
}

impl fmt::Display for ClosedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationOutcome {
    pub pid: u32,
    pub closed_by: ClosedBy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Graceful,
    Signal,
    Force,
}

pub struct Terminator<'a> {
    processes: &'a dyn ProcessOps,
    windows: &'a dyn WindowOps,
    settle: Duration,
}

impl<'a> Terminator<'a> {
    pub fn new(processes: &'a dyn ProcessOps, windows: &'a dyn WindowOps, settle: Duration) -> Self {
        Self {
            processes,
            windows,
            settle,
        }
    }

    #[instrument(skip(self))]
    pub fn terminate(&self, pid: u32) -> Result<TerminationOutcome, HarvestError> {
        let mut tier = Tier::Graceful;
        // Set once a tier has actually acted on the process.
        let mut acted: Option<ClosedBy> = None;
        loop {
            if !self.processes.is_alive(pid) {
                let closed_by = acted.unwrap_or(ClosedBy::AlreadyExited);
                info!("Process {} closed ({})", pid, closed_by);
                return Ok(TerminationOutcome { pid, closed_by });
            }
            tier = match tier {
                Tier::Graceful => {
                    if self.close_first_window(pid) {
                        acted = Some(ClosedBy::WindowClose);
                    }
                    Tier::Signal
                }
                Tier::Signal => {
                    if self.signal_windows(pid) {
                        acted = Some(ClosedBy::CloseSignal);
                    }
                    Tier::Force
                }
                Tier::Force => {
                    let closed_by = self.force(pid)?;
                    info!("Process {} closed ({})", pid, closed_by);
                    return Ok(TerminationOutcome { pid, closed_by });
                }
            };
        }
    }

    /// Every pid runs through the full protocol on its own; one failure
    /// never stops the rest.
    pub fn terminate_many(&self, pids: &[u32]) -> Vec<(u32, Result<TerminationOutcome, HarvestError>)> {
        pids.iter().map(|&pid| (pid, self.terminate(pid))).collect()
    }

    fn settle(&self) {
        if !self.settle.is_zero() {
            std::thread::sleep(self.settle);
        }
    }

    fn windows_of(&self, pid: u32) -> Vec<WindowInfo> {
        match self.windows.top_level_windows() {
            Ok(windows) => windows.into_iter().filter(|w| w.pid == pid).collect(),
            Err(e) => {
                debug!("window enumeration failed for {}: {}", pid, e);
                Vec::new()
            }
        }
    }

    fn close_first_window(&self, pid: u32) -> bool {
        let Some(window) = self.windows_of(pid).into_iter().find(|w| w.supports_close) else {
            debug!("no closable window for {}", pid);
            return false;
        };
        debug!("Attempting window close on {} for {}", window.handle, pid);
        match self.windows.close_window(window.handle) {
            Ok(()) => {
                self.settle();
                true
            }
            Err(e) => {
                debug!("window close failed for {}: {}", pid, e);
                false
            }
        }
    }

    fn signal_windows(&self, pid: u32) -> bool {
        let mut posted = false;
        for window in self.windows_of(pid).into_iter().filter(|w| w.is_visible) {
            debug!("Posting close request to {} (PID: {})", window.handle, pid);
            match self.windows.post_close_signal(window.handle) {
                Ok(()) => posted = true,
                Err(e) => debug!("close request to {} failed: {}", window.handle, e),
            }
        }
        if posted {
            self.settle();
        } else {
            debug!("no close request delivered for {}", pid);
        }
        posted
    }

    fn force(&self, pid: u32) -> Result<ClosedBy, HarvestError> {
        // Collected before anything dies so orphans can still be found.
        let descendants: Vec<u32> = expand(self.processes, &[pid])
            .iter()
            .filter(|&p| p != pid)
            .collect();

        match self.processes.kill_tree(pid) {
            Ok(()) => {
                self.settle();
                if !self.processes.is_alive(pid) {
                    return Ok(ClosedBy::KillTree);
                }
                warn!("Process {} survived tree kill, falling back to direct kill", pid);
            }
            Err(e) if e.is_process_gone() => return Ok(ClosedBy::KillTree),
            Err(e) => warn!("Tree kill failed for {}: {}, falling back to direct kill", pid, e),
        }

        for child in descendants.iter().rev() {
            match self.processes.kill(*child) {
                Ok(()) => {}
                Err(e) if e.is_process_gone() => {}
                Err(e) => debug!("direct kill of descendant {} failed: {}", child, e),
            }
        }
        match self.processes.kill(pid) {
            Ok(()) => {}
            Err(e) if e.is_process_gone() => return Ok(ClosedBy::DirectKill),
            Err(e) => {
                return Err(HarvestError::TerminationFailed {
                    pid,
                    reason: e.to_string(),
                })
            }
        }
        self.settle();
        if self.processes.is_alive(pid) {
            Err(HarvestError::TerminationFailed {
                pid,
                reason: "process still running after every termination step".to_string(),
            })
        } else {
            Ok(ClosedBy::DirectKill)
        }
    }
}
