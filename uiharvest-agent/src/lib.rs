//! HTTP agent exposing launch, capture, introspection and termination of
//! desktop applications to a remote orchestrator.

#[cfg(feature = "server")]
pub mod agent;
#[cfg(feature = "server")]
pub mod api;
pub mod types;
pub mod utils;

#[cfg(feature = "server")]
pub use agent::{Agent, AgentConfig};
#[cfg(feature = "server")]
pub use api::{AppState, ApiError};

#[cfg(feature = "server")]
use axum::{
    routing::{get, post},
    Router,
};
#[cfg(feature = "server")]
use tower_http::cors::{Any, CorsLayer};
#[cfg(feature = "server")]
use tower_http::trace::TraceLayer;

/// Build the agent's router.
#[cfg(feature = "server")]
pub fn router(state: AppState, cors: bool) -> Router {
    let mut app = Router::new()
        .route("/health", get(api::health))
        // Applications
        .route("/open_app", post(api::open_app))
        .route("/get_processes_by_exe", post(api::get_processes_by_exe))
        .route("/close_app", post(api::close_app))
        .route("/close_apps", post(api::close_apps))
        // Capture
        .route("/screenshot", post(api::screenshot))
        .route("/screenshot/{filename}", get(api::serve_screenshot))
        .route("/get_ui_tree", post(api::get_ui_tree))
        .route("/get_ui", post(api::get_ui))
        // Input
        .route("/click", post(api::click))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if cors {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }
    app
}
