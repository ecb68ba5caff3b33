//! API error types and JSON error response formatting.
//!
//! ApiError provides a consistent JSON error response format across all
//! endpoints. Engine errors are mapped by their [`ErrorKind`].

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use curaloop_engine::{EngineError, ErrorKind};

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "validation_error", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// Body the JSON extractor refused, keeping axum's status (400, 413,
    /// 415 or 422).
    Rejected { status: StatusCode, message: String },
    /// Any error raised by the session engine.
    Engine(EngineError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Rejected { status, .. } => *status,
            ApiError::Engine(err) => match err {
                EngineError::InvalidPlan(_) | EngineError::InvalidConfig(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                _ => match err.kind() {
                    ErrorKind::Validation => StatusCode::BAD_REQUEST,
                    ErrorKind::NotFound => StatusCode::NOT_FOUND,
                    ErrorKind::State => StatusCode::CONFLICT,
                    ErrorKind::Dependency => StatusCode::SERVICE_UNAVAILABLE,
                    ErrorKind::Integrity => StatusCode::INTERNAL_SERVER_ERROR,
                },
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Rejected { message, .. } => ErrorBody {
                error: "bad_request".to_string(),
                message,
                details: None,
            },
            ApiError::Engine(err) => {
                let kind = err.kind();
                if kind == ErrorKind::Integrity {
                    tracing::error!(error = %err, "integrity violation");
                }
                ErrorBody {
                    error: kind.as_str().to_string(),
                    message: err.to_string(),
                    details: Some(serde_json::json!({ "retryable": kind.is_retryable() })),
                }
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::Engine(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}
