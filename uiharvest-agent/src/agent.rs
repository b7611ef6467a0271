//! The agent's capabilities. Every method is synchronous and meant to run
//! on the blocking pool; nothing here keeps state between calls beyond the
//! immutable configuration.

use crate::types::{CloseReport, CloseStatus, LaunchStatus};
use chrono::Local;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use uiharvest::process::canonical_exe_path;
use uiharvest::tree::{list_controls, ControlSummary};
use uiharvest::{
    expand, extract_window, processes_for_executable, Extraction, HarvestError, KeywordTable,
    Platform, ProcessInfo, ProcessSet, Resolution, Terminator, WindowInfo, WindowResolver,
};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Where screenshots are written and served from.
    pub shared_dir: PathBuf,
    /// Wait between spawning an executable and looking for its window.
    pub launch_settle: Duration,
    /// Wait after each termination step before checking liveness.
    pub close_settle: Duration,
    /// Never closed, whatever a client asks.
    pub self_pid: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            shared_dir: PathBuf::from("shared"),
            launch_settle: Duration::from_millis(2000),
            close_settle: Duration::from_millis(1000),
            self_pid: std::process::id(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LaunchOutcome {
    pub status: LaunchStatus,
    pub path: PathBuf,
    pub pid: u32,
    pub window: Option<Resolution>,
    pub processes: ProcessSet,
}

impl LaunchOutcome {
    pub fn window_title(&self) -> &str {
        self.window
            .as_ref()
            .map(|r| r.window.title.as_str())
            .unwrap_or("Unknown")
    }
}

#[derive(Debug, Clone)]
pub struct SavedScreenshot {
    pub filename: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Introspection {
    pub app_name: String,
    pub resolution: Resolution,
    pub extraction: Extraction,
}

#[derive(Debug, Clone)]
pub struct ControlListing {
    pub window: WindowInfo,
    pub controls: Vec<ControlSummary>,
}

pub struct Agent {
    platform: Platform,
    keywords: Arc<KeywordTable>,
    config: AgentConfig,
}

impl Agent {
    pub fn new(platform: Platform, keywords: Arc<KeywordTable>, config: AgentConfig) -> Self {
        Self {
            platform,
            keywords,
            config,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    fn resolver(&self) -> WindowResolver<'_> {
        WindowResolver::new(self.platform.windows.as_ref(), &self.keywords)
    }

    fn terminator(&self) -> Terminator<'_> {
        Terminator::new(
            self.platform.processes.as_ref(),
            self.platform.windows.as_ref(),
            self.config.close_settle,
        )
    }

    /// Reuse a running instance of `path` or start a new one, then resolve
    /// its window. A window that cannot be resolved is not an error: the
    /// launched pid is reported with `Unknown` as title.
    #[instrument(skip(self))]
    pub fn launch(&self, path: &Path) -> Result<LaunchOutcome, HarvestError> {
        if path.as_os_str().is_empty() {
            return Err(HarvestError::InvalidArgument("path must not be empty".to_string()));
        }
        let exe = canonical_exe_path(path);
        let hint = exe
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let processes = self.platform.processes.as_ref();

        let running = processes_for_executable(processes, &exe)?;
        let (status, stub_pid, seeds) = match running.first() {
            Some(main) => {
                info!("App already running: {} (PID: {})", exe.display(), main.pid);
                let seeds: Vec<u32> = running.iter().map(|p| p.pid).collect();
                (LaunchStatus::AlreadyRunning, main.pid, seeds)
            }
            None => {
                info!("Opening app: {}", exe.display());
                let pid = processes.spawn(&exe)?;
                info!("Started stub process PID: {}", pid);
                if !self.config.launch_settle.is_zero() {
                    std::thread::sleep(self.config.launch_settle);
                }
                (LaunchStatus::Launched, pid, vec![pid])
            }
        };

        let mut set = expand(processes, &seeds).with_exe_path(&exe);
        let window = match self.resolver().resolve(&set, Some(&hint)) {
            Ok(resolution) => {
                info!(
                    "App UI PID: {}, Window: {}",
                    resolution.window.pid, resolution.window.title
                );
                set.insert(resolution.window.pid);
                Some(resolution)
            }
            Err(e) => {
                warn!("No UI window found for {}, using stub PID {}: {}", exe.display(), stub_pid, e);
                None
            }
        };

        Ok(LaunchOutcome {
            status,
            path: exe,
            pid: window.as_ref().map(|r| r.window.pid).unwrap_or(stub_pid),
            window,
            processes: set,
        })
    }

    /// Capture the primary display into a new, uniquely named PNG file.
    #[instrument(skip(self))]
    pub fn snapshot(&self) -> Result<SavedScreenshot, HarvestError> {
        let png = self.platform.screen.grab_screen()?;
        std::fs::create_dir_all(&self.config.shared_dir)?;

        loop {
            let filename = screenshot_filename();
            let path = self.config.shared_dir.join(&filename);
            // create_new: concurrent captures must never overwrite each other.
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(&png)?;
                    info!("Saved screenshot {} ({} bytes)", path.display(), png.len());
                    return Ok(SavedScreenshot { filename, path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Location of a previously saved screenshot. Names that could escape
    /// the shared directory are rejected.
    pub fn screenshot_path(&self, filename: &str) -> Result<Option<PathBuf>, HarvestError> {
        if filename.is_empty()
            || filename.contains(['/', '\\'])
            || filename.contains("..")
            || !filename.ends_with(".png")
        {
            return Err(HarvestError::InvalidArgument(format!(
                "invalid screenshot name: {filename}"
            )));
        }
        let path = self.config.shared_dir.join(filename);
        Ok(path.is_file().then_some(path))
    }

    /// Expand `pids`, resolve the window and extract its accessibility tree.
    #[instrument(skip(self))]
    pub fn introspect(&self, app_name: &str, pids: &[u32]) -> Result<Introspection, HarvestError> {
        if pids.is_empty() {
            return Err(HarvestError::InvalidArgument("pids must not be empty".to_string()));
        }
        info!("Getting UI tree for app: {}, PIDs: {:?}", app_name, pids);
        let set = expand(self.platform.processes.as_ref(), pids);
        let resolution = self.resolver().resolve(&set, Some(app_name))?;
        let extraction = extract_window(self.platform.windows.as_ref(), resolution.window.handle)?;
        if extraction.is_partial() {
            warn!(
                "Partial UI tree for '{}': {} unreadable nodes",
                resolution.window.title, extraction.stats.unreadable
            );
        }
        Ok(Introspection {
            app_name: app_name.to_string(),
            resolution,
            extraction,
        })
    }

    /// One-level listing of the first top-level window owned by `pid`.
    pub fn list_controls(&self, pid: u32) -> Result<ControlListing, HarvestError> {
        let windows = self.platform.windows.as_ref();
        let window = windows
            .top_level_windows()?
            .into_iter()
            .find(|w| w.pid == pid)
            .ok_or_else(|| HarvestError::WindowNotFound(format!("No window found with pid {pid}")))?;
        let root = windows.accessible_root(window.handle).map_err(|e| {
            HarvestError::ExtractionFailed(format!("No accessibility root for {}: {e}", window.handle))
        })?;
        let controls = list_controls(root.as_ref())
            .map_err(|e| HarvestError::ExtractionFailed(e.to_string()))?;
        Ok(ControlListing { window, controls })
    }

    pub fn processes_by_exe(&self, path: &Path) -> Result<Vec<ProcessInfo>, HarvestError> {
        if path.as_os_str().is_empty() {
            return Err(HarvestError::InvalidArgument("path must not be empty".to_string()));
        }
        processes_for_executable(self.platform.processes.as_ref(), path)
    }

    #[instrument(skip(self))]
    pub fn click(&self, x: i32, y: i32) -> Result<(), HarvestError> {
        self.platform.input.click(x, y)
    }

    /// Run the termination protocol for `pid`, refusing to touch the agent
    /// itself.
    #[instrument(skip(self))]
    pub fn close(&self, pid: u32) -> Result<CloseReport, HarvestError> {
        if pid == self.config.self_pid {
            warn!("Refusing to close agent process {}", pid);
            return Ok(CloseReport {
                status: CloseStatus::Skipped,
                pid,
                closed_by: None,
                message: "Refusing to close agent process".to_string(),
            });
        }
        let outcome = self.terminator().terminate(pid)?;
        Ok(CloseReport {
            status: CloseStatus::Ok,
            pid,
            closed_by: Some(outcome.closed_by),
            message: format!("Terminated via {}", outcome.closed_by),
        })
    }

    /// Close every pid independently; failures are reported per pid.
    pub fn close_many(&self, pids: &[u32]) -> Vec<CloseReport> {
        pids.iter()
            .map(|&pid| {
                self.close(pid).unwrap_or_else(|e| {
                    error!("Failed to close {}: {}", pid, e);
                    CloseReport {
                        status: CloseStatus::Error,
                        pid,
                        closed_by: None,
                        message: e.to_string(),
                    }
                })
            })
            .collect()
    }
}

/// `screenshot_<YYYYmmdd_HHMMSS_mmm>_<8 hex>.png`
pub fn screenshot_filename() -> String {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S_%3f");
    let suffix = Uuid::new_v4().simple().to_string();
    format!("screenshot_{}_{}.png", timestamp, &suffix[..8])
}
