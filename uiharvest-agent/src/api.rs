use axum::{
    body::Body,
    extract::{rejection::JsonRejection, FromRequest, Path as UrlPath, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};
use uiharvest::HarvestError;

use crate::agent::Agent;
use crate::types::{
    ClickRequest, ClickResponse, CloseManyResponse, CloseReport, ControlListResponse,
    ErrorDetail, ErrorResponse, HealthResponse, OpenAppResponse, PathRequest, PidListRequest,
    PidRequest, ProcessesResponse, ScreenshotResponse, UiTreeRequest, UiTreeResponse,
};

/// Shared state behind every route.
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
    /// Base of the screenshot URLs handed out; the request's `Host` header
    /// is used when unset.
    pub public_url: Option<String>,
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Harvest(#[from] HarvestError),

    #[error("{0}")]
    NotFound(String),

    /// A request body that is not valid JSON for the route.
    #[error("Invalid request body: {0}")]
    BadRequest(String),

    #[error("Worker task failed: {0}")]
    Worker(String),
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self {
            ApiError::Harvest(e) => e.kind(),
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "invalid_argument",
            ApiError::Worker(_) => "internal",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Harvest(HarvestError::WindowNotFound(_))
            | ApiError::Harvest(HarvestError::ProcessNotFound(_))
            | ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Harvest(HarvestError::InvalidArgument(_)) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        error!("{} ({}): {}", status, self.kind(), self);
        (
            status,
            Json(ErrorResponse {
                status: "error".to_string(),
                error: ErrorDetail {
                    kind: self.kind().to_string(),
                    message: self.to_string(),
                },
            }),
        )
            .into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// `Json` whose rejections use the error envelope.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

/// Run a capability on the blocking pool.
async fn blocking<T, F>(agent: &Arc<Agent>, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Agent) -> Result<T, HarvestError> + Send + 'static,
{
    let agent = Arc::clone(agent);
    tokio::task::spawn_blocking(move || f(&agent))
        .await
        .map_err(|e| ApiError::Worker(e.to_string()))?
        .map_err(ApiError::from)
}

// ============================================================================
// Health Check
// ============================================================================

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Applications
// ============================================================================

pub async fn open_app(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<PathRequest>,
) -> Result<Json<OpenAppResponse>, ApiError> {
    info!("POST /open_app - path: {}", request.path);
    let path = PathBuf::from(request.path);
    let outcome = blocking(&state.agent, move |agent| agent.launch(&path)).await?;

    Ok(Json(OpenAppResponse {
        status: outcome.status,
        path: outcome.path.display().to_string(),
        pid: outcome.pid,
        window_title: outcome.window_title().to_string(),
        window_resolved: outcome.window.is_some(),
        pids: outcome.processes.to_vec(),
    }))
}

pub async fn get_processes_by_exe(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<PathRequest>,
) -> Result<Json<ProcessesResponse>, ApiError> {
    let path = PathBuf::from(request.path);
    let processes = blocking(&state.agent, move |agent| agent.processes_by_exe(&path)).await?;
    Ok(Json(ProcessesResponse {
        status: "ok".to_string(),
        count: processes.len(),
        processes,
    }))
}

pub async fn close_app(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<PidRequest>,
) -> Result<Json<CloseReport>, ApiError> {
    info!("POST /close_app - pid: {}", request.pid);
    let report = blocking(&state.agent, move |agent| agent.close(request.pid)).await?;
    Ok(Json(report))
}

pub async fn close_apps(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<PidListRequest>,
) -> Result<Json<CloseManyResponse>, ApiError> {
    info!("POST /close_apps - pids: {:?}", request.pids);
    let results = blocking(&state.agent, move |agent| Ok(agent.close_many(&request.pids))).await?;
    Ok(Json(CloseManyResponse {
        status: "ok".to_string(),
        results,
    }))
}

// ============================================================================
// Capture
// ============================================================================

pub async fn screenshot(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ScreenshotResponse>, ApiError> {
    let saved = blocking(&state.agent, |agent| agent.snapshot()).await?;

    let base = match &state.public_url {
        Some(url) => url.trim_end_matches('/').to_string(),
        None => {
            let host = headers
                .get(header::HOST)
                .and_then(|h| h.to_str().ok())
                .unwrap_or("localhost");
            format!("http://{host}")
        }
    };

    Ok(Json(ScreenshotResponse {
        status: "ok".to_string(),
        url: format!("{}/screenshot/{}", base, saved.filename),
        filename: saved.filename,
        path: saved.path.display().to_string(),
    }))
}

pub async fn serve_screenshot(
    State(state): State<AppState>,
    UrlPath(filename): UrlPath<String>,
) -> Result<Response, ApiError> {
    let path = state
        .agent
        .screenshot_path(&filename)?
        .ok_or_else(|| ApiError::NotFound(format!("file not found: {filename}")))?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| ApiError::Harvest(e.into()))?;
    Ok(([(header::CONTENT_TYPE, "image/png")], Body::from(bytes)).into_response())
}

pub async fn get_ui_tree(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<UiTreeRequest>,
) -> Result<Json<UiTreeResponse>, ApiError> {
    info!("POST /get_ui_tree - app: {}, pids: {:?}", request.name, request.pids);
    let UiTreeRequest { name, pids, .. } = request;
    let introspection = blocking(&state.agent, move |agent| agent.introspect(&name, &pids)).await?;
    let partial = introspection.extraction.is_partial();
    info!(
        "Successfully extracted UI tree for window: {}",
        introspection.resolution.window.title
    );

    Ok(Json(UiTreeResponse {
        status: "ok".to_string(),
        app_name: introspection.app_name,
        window: introspection.resolution.window,
        resolved_by: introspection.resolution.resolved_by,
        ui_tree: introspection.extraction.root,
        stats: introspection.extraction.stats,
        partial,
    }))
}

pub async fn get_ui(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<PidRequest>,
) -> Result<Json<ControlListResponse>, ApiError> {
    let listing = blocking(&state.agent, move |agent| agent.list_controls(request.pid)).await?;
    Ok(Json(ControlListResponse {
        status: "ok".to_string(),
        app_name: listing.window.title,
        pid: request.pid,
        control_list: listing.controls,
    }))
}

// ============================================================================
// Input
// ============================================================================

pub async fn click(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ClickRequest>,
) -> Result<Json<ClickResponse>, ApiError> {
    info!("POST /click - ({}, {})", request.x, request.y);
    let ClickRequest { x, y } = request;
    blocking(&state.agent, move |agent| agent.click(x, y)).await?;
    Ok(Json(ClickResponse {
        status: "clicked".to_string(),
        x,
        y,
    }))
}
