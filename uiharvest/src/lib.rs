//! Process tracking, window resolution and accessibility-tree capture for
//! desktop applications.
//!
//! The engines in this crate work against the primitives in [`platforms`],
//! so the same resolution, extraction and termination logic runs against
//! Windows UI Automation in production and an in-memory desktop in tests.

pub mod errors;
pub mod keywords;
pub mod platforms;
pub mod process;
pub mod resolver;
pub mod termination;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
#[cfg(test)]
mod tests;
pub mod tree;
pub mod types;

pub use errors::HarvestError;
pub use keywords::KeywordTable;
pub use platforms::{create_platform, Platform};
pub use process::{expand, processes_for_executable, ProcessSet};
pub use resolver::{Resolution, ResolvedBy, WindowResolver};
pub use termination::{ClosedBy, TerminationOutcome, Terminator};
pub use tree::{
    clickable_elements, extract, extract_window, ElementCandidate, Extraction, ExtractionStats,
    NodeElement, UINode,
};
pub use types::{Point, ProcessInfo, Rect, WindowId, WindowInfo};

/// Crate version, reported by the agent's health probe.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
