use serde::{Deserialize, Serialize};
use uiharvest::tree::ControlSummary;
use uiharvest::{ClosedBy, ExtractionStats, ProcessInfo, ResolvedBy, UINode, WindowInfo};

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathRequest {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiTreeRequest {
    pub name: String,
    /// Accepted for compatibility; resolution works from `pids`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub pids: Vec<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PidRequest {
    pub pid: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PidListRequest {
    pub pids: Vec<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClickRequest {
    pub x: i32,
    pub y: i32,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LaunchStatus {
    #[serde(rename = "launched")]
    Launched,
    #[serde(rename = "already-running")]
    AlreadyRunning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAppResponse {
    pub status: LaunchStatus,
    pub path: String,
    /// Owner of the resolved window, or the launched pid when none resolved.
    pub pid: u32,
    pub window_title: String,
    pub window_resolved: bool,
    pub pids: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotResponse {
    pub status: String,
    pub filename: String,
    pub path: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiTreeResponse {
    pub status: String,
    pub app_name: String,
    pub window: WindowInfo,
    pub resolved_by: ResolvedBy,
    pub ui_tree: UINode,
    pub stats: ExtractionStats,
    pub partial: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlListResponse {
    pub status: String,
    pub app_name: String,
    pub pid: u32,
    pub control_list: Vec<ControlSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessesResponse {
    pub status: String,
    pub processes: Vec<ProcessInfo>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickResponse {
    pub status: String,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseStatus {
    Ok,
    Skipped,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseReport {
    pub status: CloseStatus,
    pub pid: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_by: Option<ClosedBy>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseManyResponse {
    pub status: String,
    pub results: Vec<CloseReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub error: ErrorDetail,
}
