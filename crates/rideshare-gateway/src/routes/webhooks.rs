//! `POST /webhooks/payment`: provider webhook ingestion.
//!
//! The body is taken as raw bytes and verified before it is parsed. Only a
//! verified settlement becomes a broker event; it is acknowledged to the
//! provider after the publish is confirmed.

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use tracing::{info, instrument};

use crate::error::WebhookError;
use crate::signature::{SIGNATURE_HEADER, SignatureError};
use crate::state::AppState;
use crate::webhook::{self, ProviderEvent};

/// POST /webhooks/payment
#[instrument(skip_all)]
async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, WebhookError> {
    let verifier = state
        .webhook_verifier
        .as_deref()
        .ok_or(WebhookError::Disabled)?;
    let signature = headers
        .get(SIGNATURE_HEADER)
        .map(|value| {
            value
                .to_str()
                .map_err(|e| SignatureError::Malformed(e.to_string()))
        })
        .transpose()?;
    verifier.verify(&body, signature)?;

    let event = ProviderEvent::parse(&body)?;
    let Some(outcome) = event.settlement() else {
        info!(event_id = %event.id, event_type = %event.event_type, "ignoring webhook event");
        return Ok(StatusCode::OK);
    };

    let envelope = event.settlement_envelope(outcome)?;
    webhook::publish_with_retry(state.publisher.as_ref(), &envelope, state.publish_retry).await?;

    info!(
        event_id = %event.id,
        topic = envelope.topic(),
        owner_id = envelope.owner_id(),
        message_id = %envelope.message_id(),
        "settlement published"
    );
    Ok(StatusCode::OK)
}

/// Returns the router for webhook endpoints.
pub fn router() -> Router<AppState> {
    Router::new().route("/payment", post(payment_webhook))
}
