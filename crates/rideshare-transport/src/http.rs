//! HTTP error mapping and request-body extraction.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rideshare_core::error::DomainError;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorBody {
    /// Builds a response with `status` and this body.
    pub fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

/// HTTP-layer wrapper around `DomainError` that implements `IntoResponse`.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl ApiError {
    /// Status code and stable error code for the wrapped error.
    #[must_use]
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            DomainError::AggregateNotFound(_) => (StatusCode::NOT_FOUND, "aggregate_not_found"),
            DomainError::ConcurrencyConflict { .. } => {
                (StatusCode::CONFLICT, "concurrency_conflict")
            }
            DomainError::InvalidTransition { .. } => (StatusCode::CONFLICT, "invalid_transition"),
            DomainError::DuplicateEvent { .. } => (StatusCode::CONFLICT, "duplicate_event"),
            DomainError::OutOfOrder { .. } => (StatusCode::CONFLICT, "out_of_order"),
            DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            DomainError::Dependency(_) => (StatusCode::SERVICE_UNAVAILABLE, "dependency_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();

        ErrorBody {
            error: error_code,
            message: self.0.to_string(),
        }
        .into_response_with(status)
    }
}

/// A JSON body extractor whose failures (unreadable body, malformed JSON,
/// missing or mistyped fields) are all `400 validation_error`.
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(request, state)
            .await
            .map_err(|e| ApiError(DomainError::Validation(e.body_text())))?;
        serde_json::from_slice(&bytes)
            .map(ValidJson)
            .map_err(|e| ApiError(DomainError::Validation(format!("invalid request body: {e}"))))
    }
}
