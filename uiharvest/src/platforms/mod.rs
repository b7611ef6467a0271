use crate::types::{Point, ProcessInfo, Rect, WindowId, WindowInfo};
use crate::HarvestError;
use std::path::Path;
use std::sync::Arc;

pub mod processes;
#[cfg(target_os = "windows")]
pub mod windows;

pub use processes::SystemProcesses;

/// Process launch, enumeration and termination.
///
/// Every method must tolerate a pid that has already exited: report
/// [`HarvestError::ProcessNotFound`] instead of panicking.
pub trait ProcessOps: Send + Sync {
    /// Spawn the executable detached from our stdio and return its pid.
    fn spawn(&self, path: &Path) -> Result<u32, HarvestError>;

    /// Snapshot of the process table.
    fn list_processes(&self) -> Result<Vec<ProcessInfo>, HarvestError>;

    /// Direct children of `pid`.
    fn children_of(&self, pid: u32) -> Result<Vec<u32>, HarvestError>;

    fn is_alive(&self, pid: u32) -> bool;

    /// Kill `pid` and its whole descendant tree with the OS facility.
    fn kill_tree(&self, pid: u32) -> Result<(), HarvestError>;

    /// Kill a single process.
    fn kill(&self, pid: u32) -> Result<(), HarvestError>;
}

/// Top-level window enumeration and window-level actions.
pub trait WindowOps: Send + Sync {
    /// All top-level windows, in the order the OS enumerates them.
    fn top_level_windows(&self) -> Result<Vec<WindowInfo>, HarvestError>;

    /// The window that currently has the input focus, if any.
    fn foreground_window(&self) -> Result<Option<WindowInfo>, HarvestError>;

    /// Fire-and-forget close request (no acknowledgment expected).
    fn post_close_signal(&self, handle: WindowId) -> Result<(), HarvestError>;

    /// Close through the window's own close operation.
    fn close_window(&self, handle: WindowId) -> Result<(), HarvestError>;

    /// Accessibility root of a top-level window.
    fn accessible_root(&self, handle: WindowId) -> Result<Box<dyn AccessibleNode>, HarvestError>;
}

/// One live element of the accessibility tree.
///
/// Each accessor may fail for a stale element; such failures are scoped to
/// the node and must not invalidate the rest of the query.
pub trait AccessibleNode {
    fn name(&self) -> Result<String, HarvestError>;
    fn control_type(&self) -> Result<String, HarvestError>;
    fn automation_id(&self) -> Result<String, HarvestError>;
    fn is_enabled(&self) -> Result<bool, HarvestError>;
    fn is_offscreen(&self) -> Result<bool, HarvestError>;
    fn is_focusable(&self) -> Result<bool, HarvestError>;
    fn bounding_rect(&self) -> Result<Rect, HarvestError>;
    fn clickable_point(&self) -> Result<Option<Point>, HarvestError>;

    /// Identity of the element for the lifetime of its UI, when available.
    fn runtime_id(&self) -> Option<String>;

    fn children(&self) -> Result<Vec<Box<dyn AccessibleNode>>, HarvestError>;
}

pub trait ScreenCapture: Send + Sync {
    /// Capture the primary display as PNG-encoded bytes.
    fn grab_screen(&self) -> Result<Vec<u8>, HarvestError>;
}

pub trait InputOps: Send + Sync {
    fn click(&self, x: i32, y: i32) -> Result<(), HarvestError>;
}

/// The full set of OS primitives one agent works against.
#[derive(Clone)]
pub struct Platform {
    pub processes: Arc<dyn ProcessOps>,
    pub windows: Arc<dyn WindowOps>,
    pub screen: Arc<dyn ScreenCapture>,
    pub input: Arc<dyn InputOps>,
}

/// Create the platform backend for the current OS.
pub fn create_platform() -> Result<Platform, HarvestError> {
    #[cfg(target_os = "windows")]
    {
        let windows = Arc::new(windows::UiaWindows::new()?);
        Ok(Platform {
            processes: Arc::new(SystemProcesses::new()),
            windows,
            screen: Arc::new(windows::XcapScreen),
            input: Arc::new(windows::MouseInput),
        })
    }
    #[cfg(not(target_os = "windows"))]
    {
        Err(HarvestError::UnsupportedPlatform(format!(
            "window and accessibility primitives are only implemented for Windows (running on {})",
            std::env::consts::OS
        )))
    }
}
