// HTTP API: snapshot reads, status, runtime settings and the change stream

use aqua_core::config::ServerConfig;
use aqua_core::SystemStatus;
use aqua_eye::{AnalysisControl, FrameError, LoopStatsView, RuntimeSettings, SettingsUpdate, SnapshotStore};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<SnapshotStore>,
    pub settings: Arc<RuntimeSettings>,
    pub control: AnalysisControl,
    /// Poll interval for each stream consumer
    pub stream_poll: Duration,
    /// Flips to true when the server begins shutting down
    pub shutdown: watch::Receiver<bool>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    analysis_running: bool,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: SystemStatus,
    version: u64,
    frame_count: u64,
    last_updated: DateTime<Utc>,
    analysis_running: bool,
    stats: LoopStatsView,
    recent_errors: Vec<FrameError>,
}

/// Router with every route and no middleware
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/api/v1/snapshot", get(snapshot_handler))
        .route("/api/v1/status", get(status_handler))
        .route("/api/v1/settings", get(get_settings_handler).put(update_settings_handler))
        .route("/analyze_stream", get(crate::sse::analyze_stream_handler))
        .route("/stop_analysis", post(stop_analysis_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

/// Router plus the layers selected by the server configuration
pub fn build_app(state: ApiState, config: &ServerConfig) -> Router {
    let router = create_router(state);
    if config.enable_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

async fn root_handler() -> impl IntoResponse {
    Json(MessageResponse {
        message: "AquaAnalyzer API is up and running!".to_string(),
    })
}

async fn health_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        analysis_running: state.control.is_running(),
    })
}

/// Last published snapshot. Keeps serving the last good one while the loop
/// recovers from a failed frame.
async fn snapshot_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let snapshot = state.store.read();
    Json(snapshot.as_ref().clone())
}

async fn status_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let snapshot = state.store.read();
    Json(StatusResponse {
        status: snapshot.status,
        version: snapshot.version,
        frame_count: snapshot.frame_count,
        last_updated: snapshot.last_updated,
        analysis_running: state.control.is_running(),
        stats: state.control.stats(),
        recent_errors: state.control.recent_errors(),
    })
}

async fn get_settings_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.settings.view())
}

async fn update_settings_handler(
    State(state): State<ApiState>,
    payload: Result<Json<SettingsUpdate>, JsonRejection>,
) -> impl IntoResponse {
    match payload {
        Ok(Json(update)) => (StatusCode::OK, Json(state.settings.apply(update))).into_response(),
        Err(rejection) => {
            warn!("Rejected settings update: {}", rejection);
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "Invalid settings payload".to_string(),
                    code: "INVALID_SETTINGS".to_string(),
                }),
            )
                .into_response()
        }
    }
}

async fn stop_analysis_handler(State(state): State<ApiState>) -> impl IntoResponse {
    info!("Stop requested over HTTP");
    state.control.stop();
    (
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: "Analysis stop requested".to_string(),
        }),
    )
}

async fn not_found_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "Not found".to_string(),
            code: "NOT_FOUND".to_string(),
        }),
    )
}
