//! Command handlers for the payment context.

use rideshare_core::aggregate::AggregateRoot;
use rideshare_core::clock::Clock;
use rideshare_core::error::DomainError;
use rideshare_core::payment::SessionRequest;
use rideshare_core::repository::{EventRepository, StoredEvent};
use tracing::info;
use uuid::Uuid;

use crate::application::query_handlers::PaymentSessionView;
use crate::domain::aggregates::PaymentSession;
use crate::domain::commands::{OpenPaymentSession, SettlePaymentSession};
use crate::domain::events::{PaymentEvent, PaymentEventKind};
use crate::gateway::GatewayAdapter;

/// Result of a successfully handled command.
#[derive(Debug)]
pub struct PaymentCommandResult {
    /// The session after the command.
    pub session: PaymentSessionView,
    /// The stored events produced and persisted; empty when a redelivered
    /// trigger found the session already open.
    pub stored_events: Vec<StoredEvent>,
}

/// Reconstitutes a `PaymentSession` from stored events.
///
/// # Errors
///
/// Returns `DomainError::Dependency` if event deserialization fails.
pub(crate) fn reconstitute(
    trip_id: Uuid,
    existing_events: &[StoredEvent],
) -> Result<PaymentSession, DomainError> {
    let mut session = PaymentSession::new(trip_id);
    for stored in existing_events {
        let kind: PaymentEventKind = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DomainError::Dependency(format!("event deserialization failed: {e}")))?;
        session.apply(&PaymentEvent {
            metadata: stored.metadata(),
            kind,
        });
    }
    Ok(session)
}

async fn save(
    session: &mut PaymentSession,
    repo: &dyn EventRepository,
) -> Result<Vec<StoredEvent>, DomainError> {
    let pending = session.uncommitted_events().to_vec();
    let stored_events: Vec<StoredEvent> = pending.iter().map(StoredEvent::from_domain).collect();

    repo.append_events(session.id, session.version(), &stored_events)
        .await?;

    for event in &pending {
        session.apply(event);
    }
    session.clear_uncommitted_events();
    Ok(stored_events)
}

/// Handles the `OpenPaymentSession` command: asks the gateway adapter for a
/// session and persists it as pending.
///
/// A trip that already has a session gets that session back without a second
/// provider call.
///
/// # Errors
///
/// Returns `DomainError::Validation` for unchargeable details and
/// `DomainError::Dependency` or `DomainError::ConcurrencyConflict` from the
/// store. Provider failures never surface here.
pub async fn handle_open_session(
    command: &OpenPaymentSession,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    gateway: &GatewayAdapter,
) -> Result<PaymentCommandResult, DomainError> {
    command.details.validate()?;

    let existing_events = repo.load_events(command.trip_id).await?;
    let mut session = reconstitute(command.trip_id, &existing_events)?;
    if !session.is_new() {
        info!(
            trip_id = %command.trip_id,
            session_id = session.session_id().unwrap_or_default(),
            "payment session already open"
        );
        return Ok(PaymentCommandResult {
            session: PaymentSessionView::from(&session),
            stored_events: Vec::new(),
        });
    }

    let request = SessionRequest {
        amount_in_cents: command.details.amount_in_cents,
        currency: command.details.currency.clone(),
        trip_id: command.trip_id,
        user_id: command.details.user_id.clone(),
        driver_id: command.details.driver_id.clone(),
    };
    let outcome = gateway.open_session(&request).await;
    let mocked = outcome.is_fallback();
    let session_id = outcome.into_value();

    session.open(
        command.details.clone(),
        &session_id,
        mocked,
        command.correlation_id,
        command.message_id,
        clock,
    )?;
    let stored_events = save(&mut session, repo).await?;

    info!(
        trip_id = %command.trip_id,
        %session_id,
        mocked,
        "payment session opened"
    );

    Ok(PaymentCommandResult {
        session: PaymentSessionView::from(&session),
        stored_events,
    })
}

/// Handles the `SettlePaymentSession` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if no session was opened for the
/// trip, plus any error from the transition or the store.
pub async fn handle_settle_session(
    command: &SettlePaymentSession,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<PaymentCommandResult, DomainError> {
    let existing_events = repo.load_events(command.trip_id).await?;
    let mut session = reconstitute(command.trip_id, &existing_events)?;
    session.settle(
        command.settlement.clone(),
        command.session_id.as_deref(),
        command.correlation_id,
        command.message_id,
        clock,
    )?;
    let stored_events = save(&mut session, repo).await?;

    info!(
        trip_id = %command.trip_id,
        status = %session.status(),
        "payment session settled"
    );

    Ok(PaymentCommandResult {
        session: PaymentSessionView::from(&session),
        stored_events,
    })
}
