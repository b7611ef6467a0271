//! Windows backend: UI Automation for windows and accessibility nodes,
//! Win32 messages for cooperative close, xcap for screen capture.

mod capture;
mod node;

pub use capture::XcapScreen;
pub use node::UiaNode;

use super::{AccessibleNode, InputOps, WindowOps};
use crate::types::{WindowId, WindowInfo};
use crate::HarvestError;
use std::rc::Rc;
use tracing::debug;
use uiautomation::inputs::Mouse;
use uiautomation::patterns::UIWindowPattern;
use uiautomation::types::{Handle, Point};
use uiautomation::{UIAutomation, UIElement};
use windows::Win32::Foundation::{HWND, LPARAM, WPARAM};
use windows::Win32::UI::WindowsAndMessaging::{
    GetForegroundWindow, IsWindowVisible, PostMessageW, WM_CLOSE,
};

impl From<uiautomation::Error> for HarvestError {
    fn from(error: uiautomation::Error) -> Self {
        HarvestError::ElementUnavailable(format!("UIAutomation error: {error}"))
    }
}

fn to_hwnd(handle: WindowId) -> HWND {
    HWND(handle.0 as *mut core::ffi::c_void)
}

fn window_id(element: &UIElement) -> Option<WindowId> {
    let handle = element.get_native_window_handle().ok()?;
    let hwnd: HWND = handle.into();
    if hwnd.is_invalid() {
        None
    } else {
        Some(WindowId(hwnd.0 as isize))
    }
}

/// Top-level window primitive over UI Automation. A fresh automation
/// client is created per call so every blocking worker thread gets its own
/// COM apartment.
pub struct UiaWindows;

impl UiaWindows {
    pub fn new() -> Result<Self, HarvestError> {
        UIAutomation::new().map_err(|e| {
            HarvestError::PlatformError(format!("Failed to initialize UI Automation: {e}"))
        })?;
        Ok(Self)
    }

    fn automation() -> Result<UIAutomation, HarvestError> {
        UIAutomation::new()
            .map_err(|e| HarvestError::PlatformError(format!("UI Automation unavailable: {e}")))
    }

    fn describe(element: &UIElement) -> Result<WindowInfo, HarvestError> {
        let handle = window_id(element).ok_or_else(|| {
            HarvestError::ElementUnavailable("top-level element has no native handle".to_string())
        })?;
        let supports_window_pattern = element.get_pattern::<UIWindowPattern>().is_ok();
        let is_visible = unsafe { IsWindowVisible(to_hwnd(handle)).as_bool() };
        Ok(WindowInfo {
            handle,
            pid: element.get_process_id()?,
            title: element.get_name().unwrap_or_default(),
            is_offscreen: element.is_offscreen().unwrap_or(true),
            is_visible,
            supports_close: supports_window_pattern,
            supports_window_pattern,
        })
    }

    fn element_for(
        automation: &UIAutomation,
        handle: WindowId,
    ) -> Result<UIElement, HarvestError> {
        let uia_handle: Handle = to_hwnd(handle).into();
        automation
            .element_from_handle(uia_handle)
            .map_err(|e| HarvestError::WindowNotFound(format!("window {handle}: {e}")))
    }
}

impl WindowOps for UiaWindows {
    fn top_level_windows(&self) -> Result<Vec<WindowInfo>, HarvestError> {
        let automation = Self::automation()?;
        let root = automation.get_root_element()?;
        let walker = automation.get_control_view_walker()?;

        let mut windows = Vec::new();
        let mut next = walker.get_first_child(&root).ok();
        while let Some(element) = next {
            match Self::describe(&element) {
                Ok(info) => windows.push(info),
                Err(e) => debug!("skipping top-level element: {}", e),
            }
            next = walker.get_next_sibling(&element).ok();
        }
        Ok(windows)
    }

    fn foreground_window(&self) -> Result<Option<WindowInfo>, HarvestError> {
        let hwnd = unsafe { GetForegroundWindow() };
        if hwnd.is_invalid() {
            return Ok(None);
        }
        let automation = Self::automation()?;
        let element = Self::element_for(&automation, WindowId(hwnd.0 as isize))?;
        Self::describe(&element).map(Some)
    }

    fn post_close_signal(&self, handle: WindowId) -> Result<(), HarvestError> {
        unsafe { PostMessageW(Some(to_hwnd(handle)), WM_CLOSE, WPARAM(0), LPARAM(0)) }
            .map_err(|e| HarvestError::PlatformError(format!("PostMessageW(WM_CLOSE): {e}")))
    }

    fn close_window(&self, handle: WindowId) -> Result<(), HarvestError> {
        let automation = Self::automation()?;
        let element = Self::element_for(&automation, handle)?;
        let pattern = element.get_pattern::<UIWindowPattern>()?;
        pattern.close()?;
        Ok(())
    }

    fn accessible_root(&self, handle: WindowId) -> Result<Box<dyn AccessibleNode>, HarvestError> {
        let automation = Self::automation()?;
        let element = Self::element_for(&automation, handle)?;
        let walker = Rc::new(automation.get_control_view_walker()?);
        Ok(Box::new(UiaNode::new(element, walker)))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MouseInput;

impl InputOps for MouseInput {
    fn click(&self, x: i32, y: i32) -> Result<(), HarvestError> {
        Mouse::default()
            .click(Point::new(x, y))
            .map_err(|e| HarvestError::PlatformError(format!("Mouse click failed: {e}")))
    }
}
