//! Gateway error types and their HTTP mapping.
//!
//! Internal services' messages are passed through verbatim in `message`;
//! the `error` code is stable.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rideshare_messaging::error::MessagingError;
use rideshare_transport::error::RpcError;
use rideshare_transport::http::ErrorBody;
use thiserror::Error;
use tracing::{error, warn};

use crate::signature::SignatureError;

/// Failure while forwarding a request to an internal service.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request was rejected before any forwarding.
    #[error("{0}")]
    Validation(String),

    /// An RPC call failed.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// A REST call answered with a non-success status.
    #[error("{message}")]
    Http {
        /// Status returned by the internal service.
        status: u16,
        /// Message returned by the internal service.
        message: String,
    },

    /// A REST call could not be completed.
    #[error("{0}")]
    Unreachable(String),
}

impl GatewayError {
    /// Status code and stable error code for this error.
    #[must_use]
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            Self::Rpc(err) => match err.code() {
                tonic::Code::InvalidArgument => (StatusCode::BAD_REQUEST, "validation_error"),
                tonic::Code::NotFound => (StatusCode::NOT_FOUND, "not_found"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "downstream_error"),
            },
            Self::Http { status: 400, .. } => (StatusCode::BAD_REQUEST, "validation_error"),
            Self::Http { status: 404, .. } => (StatusCode::NOT_FOUND, "not_found"),
            Self::Http { .. } | Self::Unreachable(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "downstream_error")
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();
        if status.is_server_error() {
            error!(error = %self, "downstream call failed");
        }

        ErrorBody {
            error: error_code,
            message: self.to_string(),
        }
        .into_response_with(status)
    }
}

/// Failure while ingesting a payment webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// No webhook secret is configured.
    #[error("payment webhook ingestion is not configured")]
    Disabled,

    /// The signature did not verify.
    #[error(transparent)]
    Signature(#[from] SignatureError),

    /// The verified payload is not a usable provider event.
    #[error("invalid webhook payload: {0}")]
    Payload(String),

    /// The settlement event could not be published after retries.
    #[error("could not publish settlement: {0}")]
    Publish(#[from] MessagingError),
}

impl WebhookError {
    /// Status code and stable error code for this error.
    #[must_use]
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Disabled => (StatusCode::SERVICE_UNAVAILABLE, "webhook_disabled"),
            Self::Signature(_) => (StatusCode::BAD_REQUEST, "signature_error"),
            Self::Payload(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            Self::Publish(_) => (StatusCode::INTERNAL_SERVER_ERROR, "dependency_error"),
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();
        match &self {
            Self::Publish(err) => error!(error = %err, "verified settlement not published"),
            other => warn!(error = %other, "webhook rejected"),
        }

        ErrorBody {
            error: error_code,
            message: self.to_string(),
        }
        .into_response_with(status)
    }
}
