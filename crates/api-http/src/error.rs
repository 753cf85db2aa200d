//! HTTP error types.
//!
//! [`ApiError`] maps application failures to status codes with plain-text
//! bodies. Subprocess details stay in the server log; callers get a generic
//! message.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use std::time::Duration;
use tracing::warn;

use cfmid_core::port::ExecutionError;
use cfmid_core::AppError;

/// HTTP-facing error
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Non-POST on /predict (405).
    #[error("Only POST allowed")]
    MethodNotAllowed,

    /// Malformed request (400).
    #[error("{0}")]
    BadRequest(String),

    /// Rate limit exceeded (429).
    #[error("Rate limit exceeded. Please slow down.")]
    Throttled { retry_after: Duration },

    /// All prediction slots busy (503).
    #[error("{0}")]
    Unavailable(String),

    /// Prediction tool ran past its deadline (504).
    #[error("Prediction timed out")]
    Timeout,

    /// Anything else server-side (500).
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Throttled { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = (status, self.to_string()).into_response();

        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        match &self {
            ApiError::MethodNotAllowed => {
                headers.insert(header::ALLOW, HeaderValue::from_static("POST"));
            }
            ApiError::Throttled { retry_after } => {
                let secs = retry_after.as_secs_f64().ceil().max(1.0) as u64;
                headers.insert(header::RETRY_AFTER, HeaderValue::from(secs));
            }
            _ => {}
        }

        response
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Domain(e) => ApiError::BadRequest(e.to_string()),
            AppError::Busy(msg) => ApiError::Unavailable(msg),
            AppError::Execution(ExecutionError::Timeout(_)) => ApiError::Timeout,
            AppError::Execution(_) | AppError::ToolFailed { .. } => {
                ApiError::Internal("Prediction failed".to_string())
            }
            AppError::Scratch(e) => ApiError::Internal(e.to_string()),
            AppError::Internal(msg) => {
                warn!(error = %msg, "Internal error while serving request");
                ApiError::Internal("Internal server error".to_string())
            }
        }
    }
}
