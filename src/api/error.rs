//! API error handling.
//!
//! Maps pipeline failures onto consistent JSON error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::{ErrorKind, PipelineError};
use crate::pipeline::Stage;

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    /// Short summary
    pub error: String,
    /// Machine-checkable failure kind
    pub kind: ErrorKind,
    /// Underlying failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Stage the run failed in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
}

/// API error type that can be converted to HTTP responses.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ApiErrorResponse,
}

impl ApiError {
    /// Create a 400 Bad Request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ApiErrorResponse {
                error: message.into(),
                kind: ErrorKind::ValidationError,
                details: None,
                stage: None,
            },
        }
    }

    /// Create a 500 error for a failed run.
    pub fn pipeline(err: &PipelineError, stage: Option<Stage>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ApiErrorResponse {
                error: "Failed to process reel".to_string(),
                kind: err.kind(),
                details: Some(err.to_string()),
                stage,
            },
        }
    }

    /// Create a 500 error that never reached the pipeline.
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ApiErrorResponse {
                error: "Failed to process reel".to_string(),
                kind: ErrorKind::IoError,
                details: Some(message.into()),
                stage: None,
            },
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Validation(msg) => ApiError::bad_request(msg),
            other => ApiError::pipeline(&other, None),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
