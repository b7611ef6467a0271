use crate::errors::ClientError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_wait_time() -> u64 {
    3
}

fn default_agent_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_data_root() -> PathBuf {
    PathBuf::from("data")
}

fn default_cycles() -> u32 {
    15
}

fn default_capture_attempts() -> u32 {
    3
}

fn default_five_secs() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

/// One exploration run. Loaded from YAML or JSON; every field except the
/// application itself has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExploreConfig {
    pub app_name: String,
    pub exe_path: String,
    /// Settle time after each launch, in seconds.
    #[serde(default = "default_wait_time", alias = "wait_time")]
    pub wait_time_secs: u64,
    #[serde(default = "default_agent_url")]
    pub agent_url: String,
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,
    #[serde(default = "default_cycles")]
    pub cycles: u32,
    #[serde(default = "default_capture_attempts")]
    pub capture_attempts: u32,
    #[serde(default = "default_five_secs")]
    pub retry_backoff_secs: u64,
    #[serde(default = "default_five_secs")]
    pub close_settle_secs: u64,
    #[serde(default)]
    pub interact: bool,
    #[serde(default = "default_five_secs")]
    pub interaction_settle_secs: u64,
    #[serde(default = "default_true")]
    pub overlay: bool,
}

impl ExploreConfig {
    pub fn new(app_name: impl Into<String>, exe_path: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            exe_path: exe_path.into(),
            wait_time_secs: default_wait_time(),
            agent_url: default_agent_url(),
            data_root: default_data_root(),
            cycles: default_cycles(),
            capture_attempts: default_capture_attempts(),
            retry_backoff_secs: default_five_secs(),
            close_settle_secs: default_five_secs(),
            interact: false,
            interaction_settle_secs: default_five_secs(),
            overlay: true,
        }
    }

    /// Parse a config file. YAML is a superset of JSON, so both work.
    pub fn load(path: &Path) -> Result<Self, ClientError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&content)
            .map_err(|e| ClientError::Config(format!("{}: {e}", path.display())))
    }

    pub fn parse(content: &str) -> Result<Self, ClientError> {
        let config: Self =
            serde_yaml::from_str(content).map_err(|e| ClientError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.app_name.trim().is_empty() {
            return Err(ClientError::Config("app_name must not be empty".to_string()));
        }
        if self.exe_path.trim().is_empty() {
            return Err(ClientError::Config("exe_path must not be empty".to_string()));
        }
        if self.capture_attempts == 0 {
            return Err(ClientError::Config(
                "capture_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn wait_time(&self) -> Duration {
        Duration::from_secs(self.wait_time_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }

    pub fn close_settle(&self) -> Duration {
        Duration::from_secs(self.close_settle_secs)
    }

    pub fn interaction_settle(&self) -> Duration {
        Duration::from_secs(self.interaction_settle_secs)
    }
}
