//! Query handlers for the payment context.

use chrono::{DateTime, Utc};
use rideshare_core::error::DomainError;
use rideshare_core::repository::EventRepository;
use serde::Serialize;
use uuid::Uuid;

use crate::application::command_handlers;
use crate::domain::aggregates::{PaymentSession, PaymentStatus};

/// Read-only view of a payment session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentSessionView {
    /// The trip.
    pub trip_id: Uuid,
    /// Current status.
    pub status: PaymentStatus,
    /// The rider.
    pub user_id: String,
    /// The driver.
    pub driver_id: String,
    /// Amount in minor units.
    pub amount_in_cents: i64,
    /// Currency code.
    pub currency: String,
    /// Provider session ID, or a mock placeholder.
    pub session_id: Option<String>,
    /// `true` when `session_id` is a placeholder.
    pub mocked: bool,
    /// Set when payment failed.
    pub failure_reason: Option<String>,
    /// When the session was opened.
    pub opened_at: Option<DateTime<Utc>>,
    /// When the provider settled it.
    pub settled_at: Option<DateTime<Utc>>,
    /// Current version (event count).
    pub version: i64,
}

impl From<&PaymentSession> for PaymentSessionView {
    fn from(session: &PaymentSession) -> Self {
        let details = session.details.clone().unwrap_or_default();
        Self {
            trip_id: session.id,
            status: session.status,
            user_id: details.user_id,
            driver_id: details.driver_id,
            amount_in_cents: details.amount_in_cents,
            currency: details.currency,
            session_id: session.session_id.clone(),
            mocked: session.mocked,
            failure_reason: session.failure_reason.clone(),
            opened_at: session.opened_at,
            settled_at: session.settled_at,
            version: session.version,
        }
    }
}

/// Retrieves the payment session opened for `trip_id`.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if no session was opened and
/// `DomainError::Dependency` if loading or deserialization fails.
pub async fn get_session_by_trip_id(
    trip_id: Uuid,
    repo: &dyn EventRepository,
) -> Result<PaymentSessionView, DomainError> {
    let stored_events = repo.load_events(trip_id).await?;
    if stored_events.is_empty() {
        return Err(DomainError::AggregateNotFound(trip_id));
    }
    let session = command_handlers::reconstitute(trip_id, &stored_events)?;
    Ok(PaymentSessionView::from(&session))
}
