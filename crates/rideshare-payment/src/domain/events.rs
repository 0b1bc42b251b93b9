//! Domain events for the payment context.

use rideshare_core::event::{DomainEvent, EventMetadata};
use serde::{Deserialize, Serialize};

/// Event type for a session being opened.
pub const SESSION_OPENED_EVENT_TYPE: &str = "payment.session_opened";
/// Event type for a confirmed payment.
pub const SESSION_SUCCEEDED_EVENT_TYPE: &str = "payment.session_succeeded";
/// Event type for a failed or expired payment.
pub const SESSION_FAILED_EVENT_TYPE: &str = "payment.session_failed";

/// Emitted when a checkout session is opened for a trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOpened {
    /// The rider.
    pub user_id: String,
    /// The driver.
    pub driver_id: String,
    /// Amount in minor units.
    pub amount_in_cents: i64,
    /// Currency code.
    pub currency: String,
    /// Provider session ID, or a mock placeholder.
    pub session_id: String,
    /// `true` when the provider was unavailable and a placeholder was used.
    pub mocked: bool,
}

/// Emitted when the provider confirms payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSucceeded {}

/// Emitted when the provider reports failure or expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionFailed {
    /// Provider event type or error summary.
    pub reason: String,
}

/// Event payload variants for the payment context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PaymentEventKind {
    /// A session was opened.
    SessionOpened(SessionOpened),
    /// Payment succeeded.
    SessionSucceeded(SessionSucceeded),
    /// Payment failed.
    SessionFailed(SessionFailed),
}

/// Domain event envelope for the payment context.
#[derive(Debug, Clone)]
pub struct PaymentEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: PaymentEventKind,
}

impl DomainEvent for PaymentEvent {
    fn event_type(&self) -> &'static str {
        match &self.kind {
            PaymentEventKind::SessionOpened(_) => SESSION_OPENED_EVENT_TYPE,
            PaymentEventKind::SessionSucceeded(_) => SESSION_SUCCEEDED_EVENT_TYPE,
            PaymentEventKind::SessionFailed(_) => SESSION_FAILED_EVENT_TYPE,
        }
    }

    fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(&self.kind).unwrap_or_default()
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
