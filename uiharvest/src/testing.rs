//! In-memory desktop used by tests across the workspace.
//!
//! `FakeDesktop` implements every platform primitive against a small
//! mutable model of processes, top-level windows and accessibility trees,
//! and records what was done to it so tests can assert on the exact steps.

use crate::platforms::{AccessibleNode, InputOps, Platform, ProcessOps, ScreenCapture, WindowOps};
use crate::types::{Point, ProcessInfo, Rect, WindowId, WindowInfo};
use crate::HarvestError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Smallest input that reaches a process's exit. Ordered from most to
/// least cooperative: a process also dies to every later step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExitsOn {
    WindowClose,
    CloseSignal,
    KillTree,
    DirectKill,
    Never,
}

#[derive(Debug, Clone)]
pub struct FakeProcess {
    pub pid: u32,
    pub parent: Option<u32>,
    pub name: String,
    pub exe: Option<PathBuf>,
    pub exits_on: ExitsOn,
    pub alive: bool,
}

impl FakeProcess {
    pub fn new(pid: u32, name: &str) -> Self {
        Self {
            pid,
            parent: None,
            name: name.to_string(),
            exe: None,
            exits_on: ExitsOn::WindowClose,
            alive: true,
        }
    }

    pub fn child_of(mut self, parent: u32) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn exe(mut self, exe: impl Into<PathBuf>) -> Self {
        self.exe = Some(exe.into());
        self
    }

    pub fn exits_on(mut self, exits_on: ExitsOn) -> Self {
        self.exits_on = exits_on;
        self
    }

    pub fn exited(mut self) -> Self {
        self.alive = false;
        self
    }
}

/// Accessibility element model. Flags let a test break individual reads.
#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    pub name: String,
    pub control_type: String,
    pub automation_id: String,
    pub enabled: bool,
    pub offscreen: bool,
    pub focusable: bool,
    pub rect: Rect,
    pub clickable: Option<Point>,
    pub runtime_id: Option<String>,
    pub unreadable: bool,
    pub children_fail: bool,
    pub children: Vec<FakeElement>,
}

impl FakeElement {
    pub fn new(control_type: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            control_type: control_type.to_string(),
            enabled: true,
            rect: Rect::new(0, 0, 100, 30),
            ..Default::default()
        }
    }

    pub fn rect(mut self, left: i32, top: i32, right: i32, bottom: i32) -> Self {
        self.rect = Rect::new(left, top, right, bottom);
        self
    }

    pub fn offscreen(mut self) -> Self {
        self.offscreen = true;
        self
    }

    pub fn runtime_id(mut self, id: &str) -> Self {
        self.runtime_id = Some(id.to_string());
        self
    }

    pub fn unreadable(mut self) -> Self {
        self.unreadable = true;
        self
    }

    pub fn children_fail(mut self) -> Self {
        self.children_fail = true;
        self
    }

    pub fn child(mut self, child: FakeElement) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Debug, Clone)]
pub struct FakeWindow {
    pub info: WindowInfo,
    pub root: Option<FakeElement>,
}

impl FakeWindow {
    /// A visible, closable window with a window pattern.
    pub fn new(handle: isize, pid: u32, title: &str) -> Self {
        Self {
            info: WindowInfo {
                handle: WindowId(handle),
                pid,
                title: title.to_string(),
                is_offscreen: false,
                is_visible: true,
                supports_close: true,
                supports_window_pattern: true,
            },
            root: Some(FakeElement::new("WindowControl", title).rect(0, 0, 800, 600)),
        }
    }

    /// A helper-style window: offscreen, invisible, no window pattern.
    pub fn hidden(handle: isize, pid: u32, title: &str) -> Self {
        let mut window = Self::new(handle, pid, title);
        window.info.is_offscreen = true;
        window.info.is_visible = false;
        window.info.supports_close = false;
        window.info.supports_window_pattern = false;
        window
    }

    pub fn root(mut self, root: FakeElement) -> Self {
        self.root = Some(root);
        self
    }

    pub fn without_root(mut self) -> Self {
        self.root = None;
        self
    }
}

/// What spawning an executable does to the model.
#[derive(Debug, Clone)]
pub struct LaunchScript {
    /// The pid `spawn` returns; must be among `processes`.
    pub pid: u32,
    pub processes: Vec<FakeProcess>,
    pub windows: Vec<FakeWindow>,
    pub focus: Option<isize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeAction {
    Spawn(PathBuf),
    CloseWindow(WindowId),
    CloseSignal(WindowId),
    KillTree(u32),
    Kill(u32),
    Click(i32, i32),
    Capture,
}

#[derive(Default)]
struct DesktopState {
    processes: Vec<FakeProcess>,
    windows: Vec<FakeWindow>,
    foreground: Option<WindowId>,
    launches: HashMap<PathBuf, LaunchScript>,
    actions: Vec<FakeAction>,
    capture_fails: bool,
    enumeration_fails: bool,
}

impl DesktopState {
    fn process(&self, pid: u32) -> Option<&FakeProcess> {
        self.processes.iter().find(|p| p.pid == pid && p.alive)
    }

    fn descendants(&self, pid: u32) -> Vec<u32> {
        let mut found = Vec::new();
        let mut frontier = vec![pid];
        while let Some(current) = frontier.pop() {
            for process in self.processes.iter().filter(|p| p.alive) {
                if process.parent == Some(current) && process.pid != pid && !found.contains(&process.pid) {
                    found.push(process.pid);
                    frontier.push(process.pid);
                }
            }
        }
        found
    }

    /// Kill `pid` if it yields to `step`; returns whether it died.
    fn deliver(&mut self, pid: u32, step: ExitsOn) -> bool {
        let Some(process) = self.processes.iter_mut().find(|p| p.pid == pid && p.alive) else {
            return false;
        };
        if process.exits_on > step {
            return false;
        }
        process.alive = false;
        self.windows.retain(|w| w.info.pid != pid);
        if self
            .foreground
            .is_some_and(|fg| !self.windows.iter().any(|w| w.info.handle == fg))
        {
            self.foreground = None;
        }
        true
    }

    fn window(&self, handle: WindowId) -> Result<&FakeWindow, HarvestError> {
        self.windows
            .iter()
            .find(|w| w.info.handle == handle)
            .ok_or_else(|| HarvestError::WindowNotFound(format!("no window {handle}")))
    }
}

#[derive(Default, Clone)]
pub struct FakeDesktop {
    state: Arc<Mutex<DesktopState>>,
}

impl FakeDesktop {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, DesktopState> {
        // A panicking test thread poisons the lock; the data is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn platform(&self) -> Platform {
        Platform {
            processes: Arc::new(self.clone()),
            windows: Arc::new(self.clone()),
            screen: Arc::new(self.clone()),
            input: Arc::new(self.clone()),
        }
    }

    pub fn add_process(&self, process: FakeProcess) -> &Self {
        self.state().processes.push(process);
        self
    }

    pub fn add_window(&self, window: FakeWindow) -> &Self {
        self.state().windows.push(window);
        self
    }

    pub fn set_foreground(&self, handle: Option<isize>) -> &Self {
        self.state().foreground = handle.map(WindowId);
        self
    }

    pub fn on_launch(&self, path: impl Into<PathBuf>, script: LaunchScript) -> &Self {
        self.state().launches.insert(path.into(), script);
        self
    }

    pub fn fail_capture(&self, fails: bool) -> &Self {
        self.state().capture_fails = fails;
        self
    }

    pub fn fail_enumeration(&self, fails: bool) -> &Self {
        self.state().enumeration_fails = fails;
        self
    }

    /// Make a running process exit on its own.
    pub fn exit_process(&self, pid: u32) {
        self.state().deliver(pid, ExitsOn::Never);
    }

    pub fn alive(&self, pid: u32) -> bool {
        self.state().process(pid).is_some()
    }

    pub fn actions(&self) -> Vec<FakeAction> {
        self.state().actions.clone()
    }

    pub fn clear_actions(&self) {
        self.state().actions.clear();
    }
}

impl ProcessOps for FakeDesktop {
    fn spawn(&self, path: &Path) -> Result<u32, HarvestError> {
        let mut state = self.state();
        state.actions.push(FakeAction::Spawn(path.to_path_buf()));
        let script = state
            .launches
            .get(path)
            .cloned()
            .ok_or_else(|| HarvestError::LaunchFailed {
                path: path.display().to_string(),
                reason: "The system cannot find the file specified.".to_string(),
            })?;
        state.processes.extend(script.processes);
        state.windows.extend(script.windows);
        if let Some(focus) = script.focus {
            state.foreground = Some(WindowId(focus));
        }
        Ok(script.pid)
    }

    fn list_processes(&self) -> Result<Vec<ProcessInfo>, HarvestError> {
        let state = self.state();
        let mut processes: Vec<ProcessInfo> = state
            .processes
            .iter()
            .filter(|p| p.alive)
            .map(|p| ProcessInfo {
                pid: p.pid,
                parent_pid: p.parent,
                name: p.name.clone(),
                exe_path: p.exe.clone(),
                start_time: None,
            })
            .collect();
        processes.sort_by_key(|info| info.pid);
        Ok(processes)
    }

    fn children_of(&self, pid: u32) -> Result<Vec<u32>, HarvestError> {
        let state = self.state();
        state.process(pid).ok_or(HarvestError::ProcessNotFound(pid))?;
        Ok(state
            .processes
            .iter()
            .filter(|p| p.alive && p.parent == Some(pid))
            .map(|p| p.pid)
            .collect())
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.alive(pid)
    }

    fn kill_tree(&self, pid: u32) -> Result<(), HarvestError> {
        let mut state = self.state();
        state.actions.push(FakeAction::KillTree(pid));
        let exits_on = state
            .process(pid)
            .map(|p| p.exits_on)
            .ok_or(HarvestError::ProcessNotFound(pid))?;
        if exits_on > ExitsOn::KillTree {
            return Err(HarvestError::PlatformError(format!(
                "tree kill of {pid} was refused"
            )));
        }
        for child in state.descendants(pid) {
            state.deliver(child, ExitsOn::KillTree);
        }
        state.deliver(pid, ExitsOn::KillTree);
        Ok(())
    }

    fn kill(&self, pid: u32) -> Result<(), HarvestError> {
        let mut state = self.state();
        state.actions.push(FakeAction::Kill(pid));
        state.process(pid).ok_or(HarvestError::ProcessNotFound(pid))?;
        if state.deliver(pid, ExitsOn::DirectKill) {
            Ok(())
        } else {
            Err(HarvestError::AccessDenied(pid))
        }
    }
}

impl WindowOps for FakeDesktop {
    fn top_level_windows(&self) -> Result<Vec<WindowInfo>, HarvestError> {
        let state = self.state();
        if state.enumeration_fails {
            return Err(HarvestError::PlatformError(
                "window enumeration failed".to_string(),
            ));
        }
        Ok(state.windows.iter().map(|w| w.info.clone()).collect())
    }

    fn foreground_window(&self) -> Result<Option<WindowInfo>, HarvestError> {
        let state = self.state();
        Ok(state
            .foreground
            .and_then(|handle| state.window(handle).ok())
            .map(|w| w.info.clone()))
    }

    fn post_close_signal(&self, handle: WindowId) -> Result<(), HarvestError> {
        let mut state = self.state();
        state.actions.push(FakeAction::CloseSignal(handle));
        let pid = state.window(handle)?.info.pid;
        state.deliver(pid, ExitsOn::CloseSignal);
        Ok(())
    }

    fn close_window(&self, handle: WindowId) -> Result<(), HarvestError> {
        let mut state = self.state();
        state.actions.push(FakeAction::CloseWindow(handle));
        let window = state.window(handle)?;
        if !window.info.supports_close {
            return Err(HarvestError::ElementUnavailable(format!(
                "window {handle} has no close operation"
            )));
        }
        let pid = window.info.pid;
        state.deliver(pid, ExitsOn::WindowClose);
        Ok(())
    }

    fn accessible_root(&self, handle: WindowId) -> Result<Box<dyn AccessibleNode>, HarvestError> {
        let state = self.state();
        let root = state.window(handle)?.root.clone().ok_or_else(|| {
            HarvestError::ElementUnavailable(format!("window {handle} has no accessible root"))
        })?;
        Ok(Box::new(FakeNode(Arc::new(root))))
    }
}

impl ScreenCapture for FakeDesktop {
    fn grab_screen(&self) -> Result<Vec<u8>, HarvestError> {
        let mut state = self.state();
        state.actions.push(FakeAction::Capture);
        if state.capture_fails {
            return Err(HarvestError::CaptureFailed(
                "Could not find primary monitor".to_string(),
            ));
        }
        Ok(FAKE_PNG.to_vec())
    }
}

impl InputOps for FakeDesktop {
    fn click(&self, x: i32, y: i32) -> Result<(), HarvestError> {
        self.state().actions.push(FakeAction::Click(x, y));
        Ok(())
    }
}

/// Bytes returned by the fake capture: the PNG signature only.
pub const FAKE_PNG: &[u8] = b"\x89PNG\r\n\x1a\n";

struct FakeNode(Arc<FakeElement>);

impl FakeNode {
    fn read<T>(&self, value: impl FnOnce(&FakeElement) -> T) -> Result<T, HarvestError> {
        if self.0.unreadable {
            return Err(HarvestError::ElementUnavailable(
                "element is no longer available".to_string(),
            ));
        }
        Ok(value(&self.0))
    }
}

impl AccessibleNode for FakeNode {
    fn name(&self) -> Result<String, HarvestError> {
        self.read(|e| e.name.clone())
    }

    fn control_type(&self) -> Result<String, HarvestError> {
        self.read(|e| e.control_type.clone())
    }

    fn automation_id(&self) -> Result<String, HarvestError> {
        self.read(|e| e.automation_id.clone())
    }

    fn is_enabled(&self) -> Result<bool, HarvestError> {
        self.read(|e| e.enabled)
    }

    fn is_offscreen(&self) -> Result<bool, HarvestError> {
        self.read(|e| e.offscreen)
    }

    fn is_focusable(&self) -> Result<bool, HarvestError> {
        self.read(|e| e.focusable)
    }

    fn bounding_rect(&self) -> Result<Rect, HarvestError> {
        self.read(|e| e.rect)
    }

    fn clickable_point(&self) -> Result<Option<Point>, HarvestError> {
        self.read(|e| e.clickable)
    }

    fn runtime_id(&self) -> Option<String> {
        self.0.runtime_id.clone()
    }

    fn children(&self) -> Result<Vec<Box<dyn AccessibleNode>>, HarvestError> {
        if self.0.children_fail {
            return Err(HarvestError::ElementUnavailable(
                "child list unavailable".to_string(),
            ));
        }
        Ok(self
            .0
            .children
            .iter()
            .map(|child| Box::new(FakeNode(Arc::new(child.clone()))) as Box<dyn AccessibleNode>)
            .collect())
    }
}
