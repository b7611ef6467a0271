//! Talking to a remote agent.

use crate::errors::ClientError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;
use uiharvest_agent::types::{
    ClickResponse, CloseManyResponse, CloseReport, ErrorResponse, HealthResponse,
    OpenAppResponse, ProcessesResponse, ScreenshotResponse, UiTreeResponse,
};

/// The agent operations the orchestrator relies on.
#[async_trait]
pub trait AgentApi: Send + Sync {
    async fn health(&self) -> Result<HealthResponse, ClientError>;
    async fn open_app(&self, path: &str) -> Result<OpenAppResponse, ClientError>;
    async fn screenshot(&self) -> Result<ScreenshotResponse, ClientError>;
    /// PNG bytes of a screenshot previously taken by the agent.
    async fn fetch_screenshot(&self, filename: &str) -> Result<Vec<u8>, ClientError>;
    async fn get_ui_tree(
        &self,
        name: &str,
        path: &str,
        pids: &[u32],
    ) -> Result<UiTreeResponse, ClientError>;
    async fn processes_by_exe(&self, path: &str) -> Result<ProcessesResponse, ClientError>;
    async fn click(&self, x: i32, y: i32) -> Result<ClickResponse, ClientError>;
    async fn close_app(&self, pid: u32) -> Result<CloseReport, ClientError>;
    async fn close_apps(&self, pids: &[u32]) -> Result<CloseManyResponse, ClientError>;
}

pub struct HttpAgentClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpAgentClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            // A full tree walk of a large window can take a while.
            .timeout(Duration::from_secs(300))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, route: &str) -> String {
        format!("{}/{}", self.base_url, route)
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        route: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        debug!("POST {}", route);
        let response = self.http.post(self.url(route)).json(body).send().await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    let bytes = response.bytes().await?;
    if status.is_success() {
        return Ok(serde_json::from_slice(&bytes)?);
    }
    match serde_json::from_slice::<ErrorResponse>(&bytes) {
        Ok(envelope) => Err(ClientError::Agent {
            status: status.as_u16(),
            kind: envelope.error.kind,
            message: envelope.error.message,
        }),
        Err(_) => Err(ClientError::Agent {
            status: status.as_u16(),
            kind: "unknown".to_string(),
            message: String::from_utf8_lossy(&bytes).into_owned(),
        }),
    }
}

#[async_trait]
impl AgentApi for HttpAgentClient {
    async fn health(&self) -> Result<HealthResponse, ClientError> {
        let response = self.http.get(self.url("health")).send().await?;
        decode(response).await
    }

    async fn open_app(&self, path: &str) -> Result<OpenAppResponse, ClientError> {
        self.post("open_app", &json!({ "path": path })).await
    }

    async fn screenshot(&self) -> Result<ScreenshotResponse, ClientError> {
        self.post("screenshot", &json!({})).await
    }

    async fn fetch_screenshot(&self, filename: &str) -> Result<Vec<u8>, ClientError> {
        // Built from our own base URL: the agent's advertised host may not be
        // routable from here.
        let response = self
            .http
            .get(self.url(&format!("screenshot/{filename}")))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return decode::<Vec<u8>>(response).await;
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn get_ui_tree(
        &self,
        name: &str,
        path: &str,
        pids: &[u32],
    ) -> Result<UiTreeResponse, ClientError> {
        self.post(
            "get_ui_tree",
            &json!({ "name": name, "path": path, "pids": pids }),
        )
        .await
    }

    async fn processes_by_exe(&self, path: &str) -> Result<ProcessesResponse, ClientError> {
        self.post("get_processes_by_exe", &json!({ "path": path })).await
    }

    async fn click(&self, x: i32, y: i32) -> Result<ClickResponse, ClientError> {
        self.post("click", &json!({ "x": x, "y": y })).await
    }

    async fn close_app(&self, pid: u32) -> Result<CloseReport, ClientError> {
        self.post("close_app", &json!({ "pid": pid })).await
    }

    async fn close_apps(&self, pids: &[u32]) -> Result<CloseManyResponse, ClientError> {
        self.post("close_apps", &json!({ "pids": pids })).await
    }
}
