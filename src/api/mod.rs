//! HTTP gateway exposing the pipeline as a single request/response operation.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod server;

use crate::pipeline::Pipeline;
use crate::upload::UploadResponse;
use crate::utils::validate_and_normalize_url;

pub use error::{ApiError, ApiErrorResponse, ApiResult};
pub use server::{serve, ApiServerConfig};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    /// Runs in flight; drained before the server exits
    pub runs: TaskTracker,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            runs: TaskTracker::new(),
        }
    }

    /// Stop accepting runs and wait for those in flight to finish cleanup
    pub async fn drain(&self) {
        self.runs.close();
        if !self.runs.is_empty() {
            tracing::info!("Waiting for {} run(s) to finish", self.runs.len());
        }
        self.runs.wait().await;
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessReelRequest {
    reel_url: Option<String>,
}

/// Build the gateway router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/process-reel", post(process_reel))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Run the pipeline for `reelUrl` and relay the downstream body.
async fn process_reel(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    // Parsed by hand so malformed JSON gets the same error shape as a missing field
    let request: ProcessReelRequest = serde_json::from_slice(&body)
        .map_err(|_| ApiError::bad_request("Missing reelUrl in request body"))?;
    let reel_url = validate_and_normalize_url(request.reel_url.as_deref().unwrap_or_default())?;

    // The run owns its resources: a client hanging up drops this handler, not the run
    let pipeline = state.pipeline.clone();
    let report = state
        .runs
        .spawn(async move { pipeline.execute(&reel_url).await })
        .await
        .map_err(|e| ApiError::internal(format!("Pipeline task aborted: {}", e)))?;

    match report.result {
        Ok(response) => Ok(relay(response)),
        Err(err) => Err(ApiError::pipeline(&err, report.failed_stage)),
    }
}

/// Pass the downstream body through unmodified.
fn relay(response: UploadResponse) -> Response {
    let content_type = if serde_json::from_slice::<serde_json::Value>(&response.body).is_ok() {
        "application/json"
    } else {
        "text/plain; charset=utf-8"
    };
    (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], response.body).into_response()
}
