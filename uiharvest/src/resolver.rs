//! Process set → top-level window resolution.
//!
//! Rules are tried in a fixed order and the first one that yields a
//! candidate decides; later rules are never consulted after that. Pid-based
//! matching is authoritative. Title keywords are only a fallback for
//! launchers whose stub process never owns a window.

use crate::keywords::KeywordTable;
use crate::platforms::WindowOps;
use crate::process::ProcessSet;
use crate::types::WindowInfo;
use crate::HarvestError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Which rule produced the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedBy {
    /// The focused window belongs to the process set.
    Foreground,
    /// A pid-matching window that is visible and supports the window pattern.
    VisibleProcessWindow,
    /// First pid-matching window in enumeration order.
    FirstProcessWindow,
    /// Title matched a keyword for the name hint.
    TitleKeyword,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub window: WindowInfo,
    pub resolved_by: ResolvedBy,
}

impl Resolution {
    /// Whether the window is known to belong to the process set.
    pub fn is_process_match(&self) -> bool {
        self.resolved_by != ResolvedBy::TitleKeyword
    }
}

pub struct WindowResolver<'a> {
    windows: &'a dyn WindowOps,
    keywords: &'a KeywordTable,
}

impl<'a> WindowResolver<'a> {
    pub fn new(windows: &'a dyn WindowOps, keywords: &'a KeywordTable) -> Self {
        Self { windows, keywords }
    }

    #[instrument(skip(self, processes), fields(pids = ?processes.to_vec()))]
    pub fn resolve(
        &self,
        processes: &ProcessSet,
        name_hint: Option<&str>,
    ) -> Result<Resolution, HarvestError> {
        // 1. Foreground shortcut.
        match self.windows.foreground_window() {
            Ok(Some(window)) if processes.contains(window.pid) => {
                info!(
                    "Found foreground window: '{}' (PID: {})",
                    window.title, window.pid
                );
                return Ok(Resolution {
                    window,
                    resolved_by: ResolvedBy::Foreground,
                });
            }
            Ok(_) => {}
            Err(e) => debug!("Error getting foreground window: {}", e),
        }

        // 2. Pid membership over all top-level windows.
        let top_level = self.windows.top_level_windows()?;
        let matching: Vec<&WindowInfo> = top_level
            .iter()
            .filter(|w| processes.contains(w.pid))
            .collect();

        if let Some(window) = matching
            .iter()
            .find(|w| w.supports_window_pattern && !w.is_offscreen)
        {
            info!("Selected visible window: '{}' (PID: {})", window.title, window.pid);
            return Ok(Resolution {
                window: (*window).clone(),
                resolved_by: ResolvedBy::VisibleProcessWindow,
            });
        }
        if let Some(window) = matching.first() {
            info!(
                "No visible windows found, using first available: '{}' (PID: {})",
                window.title, window.pid
            );
            return Ok(Resolution {
                window: (*window).clone(),
                resolved_by: ResolvedBy::FirstProcessWindow,
            });
        }

        // 3. Title keywords for the name hint.
        if let Some(hint) = name_hint.filter(|h| !h.trim().is_empty()) {
            let keywords = self.keywords.keywords_for(hint);
            debug!("Searching by keywords: {:?}", keywords);
            let top_level = self.windows.top_level_windows()?;
            if let Some(window) = top_level.into_iter().find(|w| {
                let title = w.title.to_lowercase();
                keywords.iter().any(|k| title.contains(k.as_str()))
            }) {
                warn!(
                    "No window owned by {:?}; matched '{}' (PID: {}) by title keyword",
                    processes.to_vec(),
                    window.title,
                    window.pid
                );
                return Ok(Resolution {
                    window,
                    resolved_by: ResolvedBy::TitleKeyword,
                });
            }
        }

        Err(HarvestError::WindowNotFound(format!(
            "No window found for {} with PIDs {:?}",
            name_hint.unwrap_or("application"),
            processes.to_vec()
        )))
    }
}
