use crate::artifacts::CaptureArtifact;
use crate::config::ExploreConfig;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uiharvest::ElementCandidate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionOutcome {
    Completed,
    Aborted { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedCycle {
    pub cycle: u32,
    pub reason: String,
}

/// A click performed during a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub cycle: u32,
    pub element: ElementCandidate,
    pub x: i32,
    pub y: i32,
}

/// Written as `session_<timestamp>.json` when a session ends, whatever
/// the outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub app_name: String,
    pub exe_path: String,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub outcome: SessionOutcome,
    pub artifacts: Vec<CaptureArtifact>,
    pub skipped_cycles: Vec<SkippedCycle>,
    pub interactions: Vec<Interaction>,
}

impl SessionReport {
    pub fn start(config: &ExploreConfig) -> Self {
        let now = Local::now();
        Self {
            app_name: config.app_name.clone(),
            exe_path: config.exe_path.clone(),
            started_at: now,
            finished_at: now,
            outcome: SessionOutcome::Completed,
            artifacts: Vec::new(),
            skipped_cycles: Vec::new(),
            interactions: Vec::new(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == SessionOutcome::Completed
    }
}
