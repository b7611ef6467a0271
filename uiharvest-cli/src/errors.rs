use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// The agent could not be reached or the connection broke.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The agent answered with its error envelope.
    #[error("Agent error ({kind}, HTTP {status}): {message}")]
    Agent {
        status: u16,
        kind: String,
        message: String,
    },

    #[error("Unexpected response from agent: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("No clickable elements in the baseline capture")]
    NoCandidates,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Not-found conditions and transport failures are worth another
    /// attempt; everything else is reported as is.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Agent { kind, .. } => matches!(
                kind.as_str(),
                "window_not_found" | "process_not_found" | "element_unavailable"
            ),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            ClientError::Decode(error.to_string())
        } else {
            ClientError::Transport(error.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(error: serde_json::Error) -> Self {
        ClientError::Decode(error.to_string())
    }
}
