use thiserror::Error;

/// Every value [`HarvestError::kind`] can return.
pub const ERROR_KINDS: &[&str] = &[
    "window_not_found",
    "process_not_found",
    "access_denied",
    "element_unavailable",
    "extraction_failed",
    "launch_failed",
    "termination_failed",
    "capture_failed",
    "invalid_argument",
    "unsupported_platform",
    "platform_error",
    "io_error",
    "internal",
];

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Window not found: {0}")]
    WindowNotFound(String),

    #[error("Process not found: {0}")]
    ProcessNotFound(u32),

    #[error("Access denied to process {0}")]
    AccessDenied(u32),

    #[error("Element unavailable: {0}")]
    ElementUnavailable(String),

    #[error("UI tree extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Failed to launch '{path}': {reason}")]
    LaunchFailed { path: String, reason: String },

    #[error("Failed to terminate process {pid}: {reason}")]
    TerminationFailed { pid: u32, reason: String },

    #[error("Screen capture failed: {0}")]
    CaptureFailed(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Platform-specific error: {0}")]
    PlatformError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HarvestError {
    /// Stable machine-readable discriminator used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            HarvestError::WindowNotFound(_) => "window_not_found",
            HarvestError::ProcessNotFound(_) => "process_not_found",
            HarvestError::AccessDenied(_) => "access_denied",
            HarvestError::ElementUnavailable(_) => "element_unavailable",
            HarvestError::ExtractionFailed(_) => "extraction_failed",
            HarvestError::LaunchFailed { .. } => "launch_failed",
            HarvestError::TerminationFailed { .. } => "termination_failed",
            HarvestError::CaptureFailed(_) => "capture_failed",
            HarvestError::InvalidArgument(_) => "invalid_argument",
            HarvestError::UnsupportedPlatform(_) => "unsupported_platform",
            HarvestError::PlatformError(_) => "platform_error",
            HarvestError::Io(_) => "io_error",
            HarvestError::Internal(_) => "internal",
        }
    }

    /// Not-found conditions are usually transient while an application is
    /// still starting up, so callers may retry them.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HarvestError::WindowNotFound(_)
                | HarvestError::ProcessNotFound(_)
                | HarvestError::ElementUnavailable(_)
        )
    }

    /// True when the error only says that the process is already gone.
    pub fn is_process_gone(&self) -> bool {
        matches!(self, HarvestError::ProcessNotFound(_))
    }
}
