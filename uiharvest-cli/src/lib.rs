//! Client side of uiharvest: drives a remote agent through repeated
//! launch, capture and close cycles and stores what it sees.

pub mod artifacts;
pub mod client;
pub mod config;
pub mod errors;
pub mod orchestrator;
pub mod overlay;
pub mod picker;
pub mod report;

pub use artifacts::{ArtifactStore, CaptureArtifact, LayoutFile};
pub use client::{AgentApi, HttpAgentClient};
pub use config::ExploreConfig;
pub use errors::ClientError;
pub use orchestrator::Orchestrator;
pub use picker::{ElementPicker, RandomPicker};
pub use report::{Interaction, SessionOutcome, SessionReport, SkippedCycle};
