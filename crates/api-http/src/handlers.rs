//! Route handlers.

use axum::body::Body;
use axum::extract::rejection::FormRejection;
use axum::extract::{Form, State};
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::debug;

use cfmid_core::application::PredictionOutput;
use cfmid_core::domain::PredictionRequest;

use crate::error::ApiError;
use crate::state::AppState;
use crate::types::PredictForm;

pub const HEALTH_BODY: &str = "OK";
const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, HEALTH_BODY)
}

/// Any non-POST method on /predict
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// POST /predict
///
/// Fields are read from the form body only; query-string parameters are ignored.
pub async fn predict(
    State(state): State<AppState>,
    form: Result<Form<PredictForm>, FormRejection>,
) -> Result<Response, ApiError> {
    if !state.rate_limiter.check() {
        return Err(ApiError::Throttled {
            retry_after: state.rate_limiter.retry_after(),
        });
    }

    let Form(form) = form.map_err(|e| {
        debug!(error = %e, "Rejected form body");
        ApiError::BadRequest("Bad form data".to_string())
    })?;

    let request =
        PredictionRequest::from_form(form.smiles.as_deref(), form.prob_thresh.as_deref())
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    match state.service.execute(request).await? {
        PredictionOutput::Buffered(prediction) => {
            let mut response = (
                [(header::CONTENT_TYPE, TEXT_PLAIN)],
                prediction.spectrum,
            )
                .into_response();
            if let Ok(value) = HeaderValue::from_str(&prediction.request_id) {
                response.headers_mut().insert(X_REQUEST_ID, value);
            }
            Ok(response)
        }
        PredictionOutput::Streaming(stream) => {
            Ok(([(header::CONTENT_TYPE, TEXT_PLAIN)], Body::from_stream(stream)).into_response())
        }
    }
}
