//! Orchestrator runs against an in-memory agent.

use async_trait::async_trait;
use image::{ImageFormat, RgbImage};
use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;
use std::sync::Mutex;
use tempfile::TempDir;
use uiharvest::tree::ElementProperties;
use uiharvest::{
    ClosedBy, ElementCandidate, ExtractionStats, NodeElement, ProcessInfo, Rect, ResolvedBy,
    UINode, WindowId, WindowInfo,
};
use uiharvest_agent::types::{
    ClickResponse, CloseManyResponse, CloseReport, CloseStatus, HealthResponse, LaunchStatus,
    OpenAppResponse, ProcessesResponse, ScreenshotResponse, UiTreeResponse,
};
use uiharvest_cli::{
    AgentApi, ClientError, ElementPicker, ExploreConfig, LayoutFile, Orchestrator,
    SessionOutcome, SessionReport,
};

const EXE: &str = r"C:\Apps\notepad.exe";

#[derive(Default)]
struct AgentState {
    calls: Vec<String>,
    launches: u32,
    running: Vec<u32>,
    /// Launch numbers (1-based) that fail.
    failing_launches: HashSet<u32>,
    /// Upcoming `get_ui_tree` calls that fail with this error kind.
    tree_failures: Vec<&'static str>,
    /// Refuses to close the first time it is asked.
    stubborn: Option<u32>,
    /// Spawned by the first click.
    spawned_on_click: Option<u32>,
    /// Windows contain nothing clickable.
    bare_tree: bool,
}

#[derive(Default)]
struct FakeAgent {
    state: Mutex<AgentState>,
}

impl FakeAgent {
    fn with(configure: impl FnOnce(&mut AgentState)) -> Self {
        let agent = FakeAgent::default();
        configure(&mut agent.state.lock().unwrap());
        agent
    }

    fn log(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }
}

fn agent_error(status: u16, kind: &str) -> ClientError {
    ClientError::Agent {
        status,
        kind: kind.to_string(),
        message: format!("fake {kind}"),
    }
}

fn png() -> Vec<u8> {
    let mut bytes = Vec::new();
    RgbImage::new(64, 64)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

fn element(depth: usize, control_type: &str, name: &str, rect: Rect, children: Vec<UINode>) -> UINode {
    UINode {
        depth,
        element: NodeElement::Readable(ElementProperties {
            name: name.to_string(),
            control_type: control_type.to_string(),
            automation_id: String::new(),
            is_enabled: true,
            is_offscreen: false,
            is_focusable: true,
            rect,
            clickable: None,
        }),
        children,
    }
}

fn tree_response(pid: u32, bare: bool) -> UiTreeResponse {
    let mut children = vec![element(
        1,
        "EditControl",
        "Text Editor",
        Rect::new(0, 20, 60, 60),
        vec![],
    )];
    if !bare {
        children.insert(
            0,
            element(1, "ButtonControl", "OK", Rect::new(10, 10, 30, 20), vec![]),
        );
    }
    let ui_tree = element(
        0,
        "WindowControl",
        "Untitled - Notepad",
        Rect::new(0, 0, 63, 63),
        children,
    );
    UiTreeResponse {
        status: "ok".to_string(),
        app_name: "notepad".to_string(),
        window: WindowInfo {
            handle: WindowId(1),
            pid,
            title: "Untitled - Notepad".to_string(),
            is_offscreen: false,
            is_visible: true,
            supports_close: true,
            supports_window_pattern: true,
        },
        resolved_by: ResolvedBy::Foreground,
        ui_tree,
        stats: ExtractionStats {
            nodes: 3,
            max_depth: 1,
            ..Default::default()
        },
        partial: false,
    }
}

#[async_trait]
impl AgentApi for FakeAgent {
    async fn health(&self) -> Result<HealthResponse, ClientError> {
        Ok(HealthResponse {
            status: "ok".to_string(),
            version: "test".to_string(),
        })
    }

    async fn open_app(&self, path: &str) -> Result<OpenAppResponse, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("open_app".to_string());
        state.launches += 1;
        if state.failing_launches.contains(&state.launches) {
            return Err(agent_error(500, "launch_failed"));
        }
        let stub = 100 + state.launches * 10;
        // The stub hands over to a child that owns the window, and starts a
        // helper outside its own tree.
        state.running.extend([stub, stub + 1, stub + 5]);
        Ok(OpenAppResponse {
            status: LaunchStatus::Launched,
            path: path.to_string(),
            pid: stub + 1,
            window_title: "Untitled - Notepad".to_string(),
            window_resolved: true,
            pids: vec![stub, stub + 1],
        })
    }

    async fn screenshot(&self) -> Result<ScreenshotResponse, ClientError> {
        self.log("screenshot".to_string());
        Ok(ScreenshotResponse {
            status: "ok".to_string(),
            filename: "shot.png".to_string(),
            path: "shared/shot.png".to_string(),
            url: "http://agent/screenshot/shot.png".to_string(),
        })
    }

    async fn fetch_screenshot(&self, filename: &str) -> Result<Vec<u8>, ClientError> {
        self.log(format!("fetch {filename}"));
        Ok(png())
    }

    async fn get_ui_tree(
        &self,
        _name: &str,
        _path: &str,
        pids: &[u32],
    ) -> Result<UiTreeResponse, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("get_ui_tree".to_string());
        if !state.tree_failures.is_empty() {
            let kind = state.tree_failures.remove(0);
            return Err(agent_error(404, kind));
        }
        let owner = pids.iter().copied().max().unwrap_or(0);
        Ok(tree_response(owner, state.bare_tree))
    }

    async fn processes_by_exe(&self, _path: &str) -> Result<ProcessesResponse, ClientError> {
        let state = self.state.lock().unwrap();
        let processes: Vec<ProcessInfo> = state
            .running
            .iter()
            .map(|&pid| ProcessInfo {
                pid,
                parent_pid: None,
                name: "notepad.exe".to_string(),
                exe_path: None,
                start_time: None,
            })
            .collect();
        Ok(ProcessesResponse {
            status: "ok".to_string(),
            count: processes.len(),
            processes,
        })
    }

    async fn click(&self, x: i32, y: i32) -> Result<ClickResponse, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("click {x},{y}"));
        if let Some(pid) = state.spawned_on_click.take() {
            state.running.push(pid);
        }
        Ok(ClickResponse {
            status: "clicked".to_string(),
            x,
            y,
        })
    }

    async fn close_app(&self, pid: u32) -> Result<CloseReport, ClientError> {
        let mut results = self.close_apps(&[pid]).await?.results;
        Ok(results.remove(0))
    }

    async fn close_apps(&self, pids: &[u32]) -> Result<CloseManyResponse, ClientError> {
        let mut state = self.state.lock().unwrap();
        let mut sorted = pids.to_vec();
        sorted.sort_unstable();
        state.calls.push(format!("close_apps {sorted:?}"));
        let mut results = Vec::new();
        for &pid in pids {
            if state.stubborn == Some(pid) {
                state.stubborn = None;
                results.push(CloseReport {
                    status: CloseStatus::Error,
                    pid,
                    closed_by: None,
                    message: "Access is denied".to_string(),
                });
                continue;
            }
            state.running.retain(|&p| p != pid);
            results.push(CloseReport {
                status: CloseStatus::Ok,
                pid,
                closed_by: Some(ClosedBy::WindowClose),
                message: "Terminated via window_close".to_string(),
            });
        }
        Ok(CloseManyResponse {
            status: "ok".to_string(),
            results,
        })
    }
}

/// Always picks the last candidate.
struct LastPicker;

impl ElementPicker for LastPicker {
    fn pick<'a>(&mut self, candidates: &'a [ElementCandidate]) -> Option<&'a ElementCandidate> {
        candidates.last()
    }
}

fn config(root: &Path, cycles: u32) -> ExploreConfig {
    let mut config = ExploreConfig::new("notepad", EXE);
    config.data_root = root.to_path_buf();
    config.cycles = cycles;
    config.wait_time_secs = 0;
    config.retry_backoff_secs = 0;
    config.close_settle_secs = 0;
    config.interaction_settle_secs = 0;
    config
}

fn report_files(dir: &Path) -> Vec<SessionReport> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| {
            let path = entry.unwrap().path();
            let name = path.file_name()?.to_str()?.to_string();
            (name.starts_with("session_") && name.ends_with(".json"))
                .then(|| serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap())
        })
        .collect()
}

async fn run(agent: FakeAgent, config: ExploreConfig) -> (SessionReport, Vec<String>, Vec<u32>) {
    let state = std::sync::Arc::new(agent);
    let mut orchestrator = Orchestrator::new(SharedAgent(state.clone()), config)
        .unwrap()
        .with_picker(Box::new(LastPicker));
    let report = orchestrator.run_session().await.unwrap();
    assert!(orchestrator.processes().is_empty());
    let inner = state.state.lock().unwrap();
    (report, inner.calls.clone(), inner.running.clone())
}

/// Lets a test keep a handle on the fake after the orchestrator owns it.
struct SharedAgent(std::sync::Arc<FakeAgent>);

#[async_trait]
impl AgentApi for SharedAgent {
    async fn health(&self) -> Result<HealthResponse, ClientError> {
        self.0.health().await
    }
    async fn open_app(&self, path: &str) -> Result<OpenAppResponse, ClientError> {
        self.0.open_app(path).await
    }
    async fn screenshot(&self) -> Result<ScreenshotResponse, ClientError> {
        self.0.screenshot().await
    }
    async fn fetch_screenshot(&self, filename: &str) -> Result<Vec<u8>, ClientError> {
        self.0.fetch_screenshot(filename).await
    }
    async fn get_ui_tree(
        &self,
        name: &str,
        path: &str,
        pids: &[u32],
    ) -> Result<UiTreeResponse, ClientError> {
        self.0.get_ui_tree(name, path, pids).await
    }
    async fn processes_by_exe(&self, path: &str) -> Result<ProcessesResponse, ClientError> {
        self.0.processes_by_exe(path).await
    }
    async fn click(&self, x: i32, y: i32) -> Result<ClickResponse, ClientError> {
        self.0.click(x, y).await
    }
    async fn close_app(&self, pid: u32) -> Result<CloseReport, ClientError> {
        self.0.close_app(pid).await
    }
    async fn close_apps(&self, pids: &[u32]) -> Result<CloseManyResponse, ClientError> {
        self.0.close_apps(pids).await
    }
}

#[tokio::test]
async fn test_completed_session_persists_every_capture() {
    let dir = TempDir::new().unwrap();
    let (report, calls, running) = run(FakeAgent::default(), config(dir.path(), 2)).await;

    assert_eq!(report.outcome, SessionOutcome::Completed);
    assert!(report.skipped_cycles.is_empty());
    assert!(report.interactions.is_empty());
    let labels: Vec<_> = report
        .artifacts
        .iter()
        .map(|a| (a.label.as_str(), a.sequence))
        .collect();
    assert_eq!(labels, vec![("initial", 0), ("after", 1), ("after", 2)]);

    for artifact in &report.artifacts {
        assert!(artifact.screenshot.exists());
        let layout: LayoutFile =
            serde_json::from_slice(&std::fs::read(&artifact.layout).unwrap()).unwrap();
        assert_eq!(layout.app_name, "notepad");
        assert_eq!(layout.resolved_by, ResolvedBy::Foreground);
        assert!(artifact.overlay.as_ref().unwrap().exists());
    }
    assert!(report.artifacts[0]
        .screenshot
        .starts_with(dir.path().join("notepad")));

    // One launch per capture, no click without `interact`.
    assert_eq!(calls.iter().filter(|c| *c == "open_app").count(), 3);
    assert!(!calls.iter().any(|c| c.starts_with("click")));
    assert!(running.is_empty());

    let saved = report_files(&dir.path().join("notepad"));
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].artifacts, report.artifacts);
}

#[tokio::test]
async fn test_session_close_covers_helpers_outside_the_launch_tree() {
    let dir = TempDir::new().unwrap();
    let (_, calls, running) = run(FakeAgent::default(), config(dir.path(), 0)).await;

    // Stub 110, window owner 111, helper 115 discovered by executable.
    assert!(calls.contains(&"close_apps [110, 111, 115]".to_string()));
    assert!(running.is_empty());
}

#[tokio::test]
async fn test_leftover_processes_are_closed_again() {
    let dir = TempDir::new().unwrap();
    let agent = FakeAgent::with(|state| state.stubborn = Some(111));
    let (report, calls, running) = run(agent, config(dir.path(), 0)).await;

    assert!(report.is_completed());
    let closes: Vec<_> = calls.iter().filter(|c| c.starts_with("close_apps")).collect();
    assert_eq!(closes, vec!["close_apps [110, 111, 115]", "close_apps [111]"]);
    assert!(running.is_empty());
}

#[tokio::test]
async fn test_failed_launch_aborts_with_report() {
    let dir = TempDir::new().unwrap();
    let agent = FakeAgent::with(|state| {
        state.failing_launches.insert(1);
    });
    let (report, calls, _) = run(agent, config(dir.path(), 3)).await;

    match &report.outcome {
        SessionOutcome::Aborted { reason } => assert!(reason.contains("launch_failed")),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(report.artifacts.is_empty());
    assert_eq!(calls.iter().filter(|c| *c == "open_app").count(), 1);
    assert_eq!(report_files(&dir.path().join("notepad")).len(), 1);
}

#[tokio::test]
async fn test_baseline_capture_retries_until_window_appears() {
    let dir = TempDir::new().unwrap();
    let agent = FakeAgent::with(|state| {
        state.tree_failures = vec!["window_not_found", "window_not_found"];
    });
    let (report, calls, _) = run(agent, config(dir.path(), 0)).await;

    assert!(report.is_completed());
    assert_eq!(report.artifacts.len(), 1);
    assert_eq!(calls.iter().filter(|c| *c == "get_ui_tree").count(), 3);
}

#[tokio::test]
async fn test_baseline_gives_up_after_capture_attempts() {
    let dir = TempDir::new().unwrap();
    let agent = FakeAgent::with(|state| {
        state.tree_failures = vec!["window_not_found"; 3];
    });
    let (report, calls, running) = run(agent, config(dir.path(), 5)).await;

    assert!(matches!(report.outcome, SessionOutcome::Aborted { .. }));
    assert_eq!(calls.iter().filter(|c| *c == "get_ui_tree").count(), 3);
    // The aborted session was still closed.
    assert!(calls.iter().any(|c| c.starts_with("close_apps")));
    assert!(running.is_empty());
}

#[tokio::test]
async fn test_agent_side_capture_failures_are_retried() {
    let dir = TempDir::new().unwrap();
    let agent = FakeAgent::with(|state| {
        state.tree_failures = vec!["capture_failed", "extraction_failed"];
    });
    let (report, calls, _) = run(agent, config(dir.path(), 0)).await;

    assert!(report.is_completed());
    assert_eq!(report.artifacts.len(), 1);
    assert_eq!(calls.iter().filter(|c| *c == "get_ui_tree").count(), 3);
}

#[tokio::test]
async fn test_persistent_capture_failure_uses_every_attempt() {
    let dir = TempDir::new().unwrap();
    let agent = FakeAgent::with(|state| {
        state.tree_failures = vec!["extraction_failed"; 3];
    });
    let (report, calls, _) = run(agent, config(dir.path(), 0)).await;

    assert!(!report.is_completed());
    assert_eq!(calls.iter().filter(|c| *c == "get_ui_tree").count(), 3);
}

#[tokio::test]
async fn test_failed_cycle_launch_is_skipped() {
    let dir = TempDir::new().unwrap();
    let agent = FakeAgent::with(|state| {
        state.failing_launches.insert(2);
    });
    let (report, _, _) = run(agent, config(dir.path(), 2)).await;

    assert!(report.is_completed());
    assert_eq!(report.skipped_cycles.len(), 1);
    assert_eq!(report.skipped_cycles[0].cycle, 1);
    let sequences: Vec<_> = report.artifacts.iter().map(|a| a.sequence).collect();
    assert_eq!(sequences, vec![0, 2]);
}

#[tokio::test]
async fn test_interaction_clicks_candidate_center() {
    let dir = TempDir::new().unwrap();
    let mut config = config(dir.path(), 1);
    config.interact = true;
    let agent = FakeAgent::with(|state| state.spawned_on_click = Some(900));
    let (report, calls, running) = run(agent, config).await;

    assert!(report.is_completed());
    assert_eq!(report.interactions.len(), 1);
    let interaction = &report.interactions[0];
    assert_eq!(interaction.element.name, "OK");
    assert_eq!((interaction.x, interaction.y), (20, 15));
    assert!(calls.contains(&"click 20,15".to_string()));

    // The process started by the click was tracked and closed with the rest.
    assert!(calls.contains(&"close_apps [120, 121, 125, 900]".to_string()));
    assert!(running.is_empty());
}

#[tokio::test]
async fn test_baseline_candidates_exclude_non_interactive_controls() {
    let dir = TempDir::new().unwrap();
    let agent = FakeAgent::default();
    let mut orchestrator = Orchestrator::new(agent, config(dir.path(), 0)).unwrap();
    orchestrator.run_session().await.unwrap();

    let names: Vec<_> = orchestrator
        .candidates()
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(names, vec!["OK"]);
}

#[tokio::test]
async fn test_cycles_without_candidates_are_skipped() {
    let dir = TempDir::new().unwrap();
    let agent = FakeAgent::with(|state| state.bare_tree = true);
    let (report, calls, running) = run(agent, config(dir.path(), 2)).await;

    assert!(report.is_completed());
    assert_eq!(report.artifacts.len(), 1);
    assert_eq!(report.artifacts[0].label, "initial");
    let skipped: Vec<_> = report.skipped_cycles.iter().map(|s| s.cycle).collect();
    assert_eq!(skipped, vec![1, 2]);
    assert!(report.skipped_cycles[0].reason.contains("No clickable elements"));
    // Each cycle still launched and closed the application.
    assert_eq!(calls.iter().filter(|c| *c == "open_app").count(), 3);
    assert_eq!(calls.iter().filter(|c| *c == "get_ui_tree").count(), 1);
    assert!(running.is_empty());
}
