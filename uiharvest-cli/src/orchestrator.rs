//! The exploration loop: launch, capture, optionally click, close, and
//! again, persisting an artifact per capture.

use crate::artifacts::ArtifactStore;
use crate::client::AgentApi;
use crate::config::ExploreConfig;
use crate::errors::ClientError;
use crate::picker::{ElementPicker, RandomPicker};
use crate::report::{Interaction, SessionOutcome, SessionReport, SkippedCycle};
use chrono::Local;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use uiharvest::{clickable_elements, ElementCandidate, ProcessSet};
use uiharvest_agent::types::{CloseStatus, OpenAppResponse, UiTreeResponse};

pub struct Orchestrator<A> {
    agent: A,
    config: ExploreConfig,
    store: ArtifactStore,
    picker: Box<dyn ElementPicker>,
    processes: ProcessSet,
    candidates: Vec<ElementCandidate>,
    /// A launch was attempted and not yet followed by a close.
    open: bool,
}

impl<A: AgentApi> Orchestrator<A> {
    pub fn new(agent: A, config: ExploreConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let store = ArtifactStore::new(&config.data_root, &config.app_name, config.overlay)?;
        Ok(Self {
            agent,
            config,
            store,
            picker: Box::new(RandomPicker::new()),
            processes: ProcessSet::new(),
            candidates: Vec::new(),
            open: false,
        })
    }

    pub fn with_picker(mut self, picker: Box<dyn ElementPicker>) -> Self {
        self.picker = picker;
        self
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn processes(&self) -> &ProcessSet {
        &self.processes
    }

    /// Clickable elements of the baseline capture.
    pub fn candidates(&self) -> &[ElementCandidate] {
        &self.candidates
    }

    /// Run one session to the end. An aborted session still returns its
    /// report; only failing to write the report is an error.
    #[instrument(skip_all, fields(app = %self.config.app_name))]
    pub async fn run_session(&mut self) -> Result<SessionReport, ClientError> {
        let mut report = SessionReport::start(&self.config);

        if let Err(reason) = self.explore(&mut report).await {
            error!("Session aborted: {}", reason);
            report.outcome = SessionOutcome::Aborted { reason };
        }
        if self.open {
            self.close_session().await;
        }

        report.finished_at = Local::now();
        self.store.write_report(&report)?;
        info!(
            "Session finished: {} artifacts, {} skipped cycles",
            report.artifacts.len(),
            report.skipped_cycles.len()
        );
        Ok(report)
    }

    async fn explore(&mut self, report: &mut SessionReport) -> Result<(), String> {
        let launched = self
            .launch()
            .await
            .map_err(|e| format!("Launch failed: {e}"))?;
        info!(
            "Application {:?}: pid {} window '{}'",
            launched.status, launched.pid, launched.window_title
        );
        sleep(self.config.wait_time()).await;

        let (png, tree) = self
            .capture()
            .await
            .map_err(|e| format!("Baseline capture failed: {e}"))?;
        let artifact = self
            .store
            .save("initial", 0, &png, &tree)
            .map_err(|e| e.to_string())?;
        report.artifacts.push(artifact);
        self.candidates = clickable_elements(&tree.ui_tree);
        info!("Baseline captured, {} clickable elements", self.candidates.len());

        self.close_session().await;
        sleep(self.config.close_settle()).await;

        for cycle in 1..=self.config.cycles {
            info!("Cycle {}/{}", cycle, self.config.cycles);
            let result = self.run_cycle(cycle, report).await;
            self.close_session().await;
            sleep(self.config.close_settle()).await;
            if let Err(e) = result {
                warn!("Cycle {} skipped: {}", cycle, e);
                report.skipped_cycles.push(SkippedCycle {
                    cycle,
                    reason: e.to_string(),
                });
            }
        }
        Ok(())
    }

    async fn run_cycle(&mut self, cycle: u32, report: &mut SessionReport) -> Result<(), ClientError> {
        self.launch().await?;
        sleep(self.config.wait_time()).await;

        // Nothing on screen to explore from.
        if self.candidates.is_empty() {
            return Err(ClientError::NoCandidates);
        }

        if self.config.interact {
            if let Some(interaction) = self.interact(cycle).await? {
                report.interactions.push(interaction);
            }
        }

        let (png, tree) = self.capture().await?;
        let artifact = self.store.save("after", cycle, &png, &tree)?;
        report.artifacts.push(artifact);
        Ok(())
    }

    /// Launch (or attach to) the application and record the pids that make
    /// it up, including processes of the executable that appeared meanwhile.
    pub async fn launch(&mut self) -> Result<OpenAppResponse, ClientError> {
        let before = self.exe_pids().await;
        self.open = true;
        let response = self.agent.open_app(&self.config.exe_path).await?;

        self.processes.extend(response.pids.iter().copied());
        self.processes.insert(response.pid);
        for pid in self.exe_pids().await {
            if !before.contains(&pid) {
                self.processes.insert(pid);
            }
        }
        if !response.window_resolved {
            warn!("No window resolved for {}", self.config.exe_path);
        }
        debug!("Process set: {:?}", self.processes.to_vec());
        Ok(response)
    }

    /// Screenshot and UI tree, attempted up to `capture_attempts` times
    /// whatever the failure.
    pub async fn capture(&mut self) -> Result<(Vec<u8>, UiTreeResponse), ClientError> {
        let attempts = self.config.capture_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.capture_once().await {
                Ok(captured) => return Ok(captured),
                Err(e) if attempt < attempts => {
                    if e.is_retryable() {
                        warn!("Capture attempt {}/{} failed: {}", attempt, attempts, e);
                    } else {
                        error!("Capture attempt {}/{} failed: {}", attempt, attempts, e);
                    }
                    sleep(self.config.retry_backoff()).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn capture_once(&mut self) -> Result<(Vec<u8>, UiTreeResponse), ClientError> {
        let shot = self.agent.screenshot().await?;
        let png = self.agent.fetch_screenshot(&shot.filename).await?;
        let tree = self
            .agent
            .get_ui_tree(
                &self.config.app_name,
                &self.config.exe_path,
                &self.processes.to_vec(),
            )
            .await?;
        // A keyword match may belong to a process we have not seen yet.
        self.processes.insert(tree.window.pid);
        if tree.partial {
            warn!(
                "Partial UI tree: {} unreadable nodes, {} child list failures",
                tree.stats.unreadable, tree.stats.child_list_failures
            );
        }
        Ok((png, tree))
    }

    async fn interact(&mut self, cycle: u32) -> Result<Option<Interaction>, ClientError> {
        let Some(element) = self.picker.pick(&self.candidates).cloned() else {
            warn!("No element picked for cycle {}", cycle);
            return Ok(None);
        };
        let point = element.center();
        info!(
            "Clicking {} '{}' at ({}, {})",
            element.control_type, element.name, point.x, point.y
        );
        self.agent.click(point.x, point.y).await?;
        sleep(self.config.interaction_settle()).await;

        let known: HashSet<u32> = self.processes.iter().collect();
        for pid in self.exe_pids().await {
            if !known.contains(&pid) {
                debug!("New process after click: {}", pid);
                self.processes.insert(pid);
            }
        }
        Ok(Some(Interaction {
            cycle,
            element,
            x: point.x,
            y: point.y,
        }))
    }

    /// Close every tracked pid, then whatever is left of the executable.
    /// Failures are logged; the process set is cleared regardless.
    pub async fn close_session(&mut self) {
        let pids = self.processes.to_vec();
        if !pids.is_empty() {
            self.close_pids(&pids).await;
        }
        let leftovers: Vec<u32> = self.exe_pids().await.into_iter().collect();
        if !leftovers.is_empty() {
            info!("Closing {} leftover processes", leftovers.len());
            self.close_pids(&leftovers).await;
        }
        self.processes.clear();
        self.open = false;
    }

    async fn close_pids(&self, pids: &[u32]) {
        match self.agent.close_apps(pids).await {
            Ok(response) => {
                for result in response.results {
                    match result.status {
                        CloseStatus::Error => {
                            warn!("Failed to close {}: {}", result.pid, result.message)
                        }
                        _ => debug!("Closed {}: {}", result.pid, result.message),
                    }
                }
            }
            Err(e) => warn!("Close request for {:?} failed: {}", pids, e),
        }
    }

    async fn exe_pids(&self) -> HashSet<u32> {
        match self.agent.processes_by_exe(&self.config.exe_path).await {
            Ok(response) => response.processes.iter().map(|p| p.pid).collect(),
            Err(e) => {
                warn!("Could not list processes of {}: {}", self.config.exe_path, e);
                HashSet::new()
            }
        }
    }
}

/// Wall-clock length of a session with the given config, ignoring the
/// time spent inside agent calls.
pub fn minimum_duration(config: &ExploreConfig) -> Duration {
    let per_cycle = config.wait_time()
        + config.close_settle()
        + if config.interact {
            config.interaction_settle()
        } else {
            Duration::ZERO
        };
    config.wait_time() + config.close_settle() + per_cycle * config.cycles
}
