//! On-disk layout of an exploration run:
//!
//! ```text
//! <data_root>/<app_name>/<label>_<seq>_<timestamp>_screenshot.png
//!                       /<label>_<seq>_<timestamp>_layout.json
//!                       /<label>_<seq>_<timestamp>_overlay.png
//!                       /session_<timestamp>.json
//! ```

use crate::errors::ClientError;
use crate::overlay;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uiharvest::{ExtractionStats, ResolvedBy, UINode, WindowInfo};
use uiharvest_agent::types::UiTreeResponse;

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";

/// Write `bytes` to a file that must not exist yet.
fn write_new(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(bytes)
}

/// First `<prefix>_<timestamp>[-n]` whose `<stem><suffix>` could be created,
/// along with the timestamp used. The file is created with `bytes`.
fn claim(
    dir: &Path,
    prefix: &str,
    timestamp: &str,
    suffix: &str,
    bytes: &[u8],
) -> std::io::Result<(String, PathBuf)> {
    let mut n = 0u32;
    loop {
        let stamp = match n {
            0 => timestamp.to_string(),
            n => format!("{timestamp}-{n}"),
        };
        let path = dir.join(format!("{prefix}_{stamp}{suffix}"));
        match write_new(&path, bytes) {
            Ok(()) => return Ok((stamp, path)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(e),
        }
    }
}

/// Content of a `_layout.json` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutFile {
    pub app_name: String,
    pub captured_at: DateTime<Local>,
    pub window: WindowInfo,
    pub resolved_by: ResolvedBy,
    pub stats: ExtractionStats,
    pub partial: bool,
    pub ui_tree: UINode,
}

impl LayoutFile {
    pub fn new(tree: &UiTreeResponse, captured_at: DateTime<Local>) -> Self {
        Self {
            app_name: tree.app_name.clone(),
            captured_at,
            window: tree.window.clone(),
            resolved_by: tree.resolved_by,
            stats: tree.stats,
            partial: tree.partial,
            ui_tree: tree.ui_tree.clone(),
        }
    }
}

/// A persisted (screenshot, layout) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureArtifact {
    pub label: String,
    pub sequence: u32,
    pub timestamp: String,
    pub screenshot: PathBuf,
    pub layout: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay: Option<PathBuf>,
}

pub struct ArtifactStore {
    dir: PathBuf,
    overlay: bool,
}

impl ArtifactStore {
    /// Store under `<data_root>/<app_name>`, created on demand.
    pub fn new(data_root: &Path, app_name: &str, overlay: bool) -> Result<Self, ClientError> {
        let dir = data_root.join(app_name);
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, overlay })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write screenshot and layout together. If either write fails neither
    /// file is left behind. Existing files are never overwritten. The
    /// overlay is best effort.
    pub fn save(
        &self,
        label: &str,
        sequence: u32,
        png: &[u8],
        tree: &UiTreeResponse,
    ) -> Result<CaptureArtifact, ClientError> {
        let now = Local::now();
        let prefix = format!("{label}_{sequence}");
        let (timestamp, screenshot) = claim(
            &self.dir,
            &prefix,
            &now.format(TIMESTAMP_FORMAT).to_string(),
            "_screenshot.png",
            png,
        )
        .map_err(|e| ClientError::Artifact(format!("Failed to write {prefix} screenshot: {e}")))?;
        let stem = format!("{prefix}_{timestamp}");
        let layout = self.dir.join(format!("{stem}_layout.json"));

        let written = serde_json::to_vec_pretty(&LayoutFile::new(tree, now))
            .map_err(ClientError::from)
            .and_then(|json| Ok(write_new(&layout, &json)?));
        if let Err(e) = written {
            // The layout may belong to someone else if it already existed.
            let _ = fs::remove_file(&screenshot);
            return Err(ClientError::Artifact(format!(
                "Failed to write artifact {stem}: {e}"
            )));
        }
        info!("Screenshot saved: {}", screenshot.display());
        info!("Layout saved: {}", layout.display());

        let overlay = if self.overlay {
            let path = self.dir.join(format!("{stem}_overlay.png"));
            match overlay::render(png, &tree.ui_tree)
                .and_then(|bytes| Ok(write_new(&path, &bytes)?))
            {
                Ok(()) => {
                    info!("Overlay saved: {}", path.display());
                    Some(path)
                }
                Err(e) => {
                    warn!("Error creating overlay: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(CaptureArtifact {
            label: label.to_string(),
            sequence,
            timestamp,
            screenshot,
            layout,
            overlay,
        })
    }

    /// Write the session report as `session_<timestamp>.json`.
    pub fn write_report<T: Serialize>(&self, report: &T) -> Result<PathBuf, ClientError> {
        let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        let json = serde_json::to_vec_pretty(report)?;
        let (_, path) = claim(&self.dir, "session", &timestamp, ".json", &json)?;
        info!("Session report saved: {}", path.display());
        Ok(path)
    }
}
