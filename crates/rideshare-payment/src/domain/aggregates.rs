//! Aggregate roots for the payment context.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use rideshare_core::aggregate::AggregateRoot;
use rideshare_core::clock::Clock;
use rideshare_core::error::DomainError;
use rideshare_core::event::EventMetadata;
use serde::Serialize;
use uuid::Uuid;

use super::events::{
    PaymentEvent, PaymentEventKind, SESSION_FAILED_EVENT_TYPE, SESSION_OPENED_EVENT_TYPE,
    SESSION_SUCCEEDED_EVENT_TYPE, SessionFailed, SessionOpened, SessionSucceeded,
};

/// Lifecycle of a payment session. `Succeeded` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Nothing persisted yet.
    Unopened,
    /// Session opened, waiting for the provider.
    Pending,
    /// The provider confirmed payment.
    Succeeded,
    /// The provider reported failure or expiry.
    Failed,
}

impl PaymentStatus {
    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unopened => "unopened",
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the provider settled a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// Paid.
    Succeeded,
    /// Failed or expired.
    Failed {
        /// Provider event type or error summary.
        reason: String,
    },
}

impl Settlement {
    fn status(&self) -> PaymentStatus {
        match self {
            Self::Succeeded => PaymentStatus::Succeeded,
            Self::Failed { .. } => PaymentStatus::Failed,
        }
    }
}

/// What is being charged, and to whom.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionDetails {
    /// The rider.
    pub user_id: String,
    /// The driver.
    pub driver_id: String,
    /// Amount in minor units.
    pub amount_in_cents: i64,
    /// Currency code.
    pub currency: String,
}

impl SessionDetails {
    /// Checks the details are chargeable.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for blank identities or currency and
    /// for a non-positive amount.
    pub fn validate(&self) -> Result<(), DomainError> {
        for (field, value) in [
            ("user_id", &self.user_id),
            ("driver_id", &self.driver_id),
            ("currency", &self.currency),
        ] {
            if value.trim().is_empty() {
                return Err(DomainError::Validation(format!("{field} must not be empty")));
            }
        }
        if self.amount_in_cents <= 0 {
            return Err(DomainError::Validation(format!(
                "amount_in_cents must be positive, got {}",
                self.amount_in_cents
            )));
        }
        Ok(())
    }
}

/// The checkout session opened for one trip. Its ID is the trip ID.
#[derive(Debug)]
pub struct PaymentSession {
    /// Aggregate identifier (the trip).
    pub id: Uuid,
    /// Current version (event count).
    pub(crate) version: i64,
    pub(crate) status: PaymentStatus,
    pub(crate) details: Option<SessionDetails>,
    pub(crate) session_id: Option<String>,
    pub(crate) mocked: bool,
    pub(crate) failure_reason: Option<String>,
    pub(crate) opened_at: Option<DateTime<Utc>>,
    pub(crate) settled_at: Option<DateTime<Utc>>,
    handled_messages: HashSet<Uuid>,
    uncommitted_events: Vec<PaymentEvent>,
}

impl PaymentSession {
    /// Creates an unopened session for `trip_id`.
    #[must_use]
    pub fn new(trip_id: Uuid) -> Self {
        Self {
            id: trip_id,
            version: 0,
            status: PaymentStatus::Unopened,
            details: None,
            session_id: None,
            mocked: false,
            failure_reason: None,
            opened_at: None,
            settled_at: None,
            handled_messages: HashSet::new(),
            uncommitted_events: Vec::new(),
        }
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    /// Provider session ID once opened.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    #[allow(clippy::cast_possible_wrap)]
    fn next_sequence_number(&self) -> i64 {
        self.version + self.uncommitted_events.len() as i64 + 1
    }

    fn record(
        &mut self,
        event_type: &str,
        kind: PaymentEventKind,
        correlation_id: Uuid,
        causation_id: Uuid,
        clock: &dyn Clock,
    ) {
        let event = PaymentEvent {
            metadata: EventMetadata::record(
                event_type,
                self.id,
                self.next_sequence_number(),
                correlation_id,
                causation_id,
                clock,
            ),
            kind,
        };
        self.uncommitted_events.push(event);
    }

    /// Opens the session (`Unopened → Pending`).
    ///
    /// # Errors
    ///
    /// Returns `DomainError::DuplicateEvent` if a session is already open for
    /// the trip and `DomainError::Validation` for unchargeable details or a
    /// blank session ID.
    pub fn open(
        &mut self,
        details: SessionDetails,
        session_id: &str,
        mocked: bool,
        correlation_id: Uuid,
        causation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if !self.is_new() {
            return Err(DomainError::duplicate(self.id, "payment session already opened"));
        }
        details.validate()?;
        if session_id.trim().is_empty() {
            return Err(DomainError::Validation("session_id must not be empty".into()));
        }

        self.record(
            SESSION_OPENED_EVENT_TYPE,
            PaymentEventKind::SessionOpened(SessionOpened {
                user_id: details.user_id,
                driver_id: details.driver_id,
                amount_in_cents: details.amount_in_cents,
                currency: details.currency,
                session_id: session_id.to_owned(),
                mocked,
            }),
            correlation_id,
            causation_id,
            clock,
        );
        Ok(())
    }

    /// Settles the session (`Pending → Succeeded | Failed`).
    ///
    /// `session_id`, when the provider reported one, must match the open
    /// session.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` if no session was opened,
    /// `DomainError::Validation` for a mismatched session ID,
    /// `DomainError::DuplicateEvent` for a repeated settlement and
    /// `DomainError::InvalidTransition` for a contradicting one.
    pub fn settle(
        &mut self,
        settlement: Settlement,
        session_id: Option<&str>,
        correlation_id: Uuid,
        causation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.status == PaymentStatus::Unopened {
            return Err(DomainError::AggregateNotFound(self.id));
        }
        if self.handled_messages.contains(&causation_id) {
            return Err(DomainError::duplicate(
                self.id,
                format!("message {causation_id} already applied"),
            ));
        }
        if let (Some(reported), Some(active)) = (session_id, self.session_id.as_deref()) {
            if reported != active {
                return Err(DomainError::Validation(format!(
                    "settlement for session {reported} does not match session {active}"
                )));
            }
        }

        let target = settlement.status();
        match self.status {
            PaymentStatus::Pending => {}
            current if current == target => {
                return Err(DomainError::duplicate(
                    self.id,
                    format!("payment already {current}"),
                ));
            }
            current => {
                return Err(DomainError::InvalidTransition {
                    aggregate_id: self.id,
                    from: current.to_string(),
                    to: target.to_string(),
                });
            }
        }

        let (event_type, kind) = match settlement {
            Settlement::Succeeded => (
                SESSION_SUCCEEDED_EVENT_TYPE,
                PaymentEventKind::SessionSucceeded(SessionSucceeded {}),
            ),
            Settlement::Failed { reason } => (
                SESSION_FAILED_EVENT_TYPE,
                PaymentEventKind::SessionFailed(SessionFailed { reason }),
            ),
        };
        self.record(event_type, kind, correlation_id, causation_id, clock);
        Ok(())
    }
}

impl AggregateRoot for PaymentSession {
    type Event = PaymentEvent;

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(&mut self, event: &Self::Event) {
        let at = event.metadata.occurred_at;
        match &event.kind {
            PaymentEventKind::SessionOpened(payload) => {
                self.status = PaymentStatus::Pending;
                self.details = Some(SessionDetails {
                    user_id: payload.user_id.clone(),
                    driver_id: payload.driver_id.clone(),
                    amount_in_cents: payload.amount_in_cents,
                    currency: payload.currency.clone(),
                });
                self.session_id = Some(payload.session_id.clone());
                self.mocked = payload.mocked;
                self.opened_at = Some(at);
            }
            PaymentEventKind::SessionSucceeded(_) => {
                self.status = PaymentStatus::Succeeded;
                self.settled_at = Some(at);
            }
            PaymentEventKind::SessionFailed(payload) => {
                self.status = PaymentStatus::Failed;
                self.failure_reason = Some(payload.reason.clone());
                self.settled_at = Some(at);
            }
        }
        self.handled_messages.insert(event.metadata.causation_id);
        self.version += 1;
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn clear_uncommitted_events(&mut self) {
        self.uncommitted_events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rideshare_core::event::DomainEvent;
    use rideshare_test_support::FixedClock;

    fn clock() -> FixedClock {
        FixedClock::at_unix(1_768_471_200)
    }

    fn details() -> SessionDetails {
        SessionDetails {
            user_id: "u1".into(),
            driver_id: "D1".into(),
            amount_in_cents: 1250,
            currency: "usd".into(),
        }
    }

    fn commit(session: &mut PaymentSession) {
        for event in session.uncommitted_events().to_vec() {
            session.apply(&event);
        }
        session.clear_uncommitted_events();
    }

    fn pending() -> PaymentSession {
        let mut session = PaymentSession::new(Uuid::new_v4());
        session
            .open(details(), "cs_1", false, Uuid::new_v4(), Uuid::new_v4(), &clock())
            .unwrap();
        commit(&mut session);
        session
    }

    #[test]
    fn test_open_records_session_opened() {
        // Arrange
        let trip_id = Uuid::new_v4();
        let mut session = PaymentSession::new(trip_id);

        // Act
        session
            .open(details(), "cs_1", true, Uuid::new_v4(), Uuid::new_v4(), &clock())
            .unwrap();

        // Assert
        let events = session.uncommitted_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), SESSION_OPENED_EVENT_TYPE);
        assert_eq!(events[0].metadata().aggregate_id, trip_id);
        commit(&mut session);
        assert_eq!(session.status(), PaymentStatus::Pending);
        assert!(session.mocked);
    }

    #[test]
    fn test_open_rejects_non_positive_amount() {
        let mut session = PaymentSession::new(Uuid::new_v4());
        let mut free = details();
        free.amount_in_cents = 0;

        let result = session.open(free, "cs_1", false, Uuid::new_v4(), Uuid::new_v4(), &clock());

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_second_open_is_duplicate() {
        let mut session = pending();

        let result = session.open(details(), "cs_2", false, Uuid::new_v4(), Uuid::new_v4(), &clock());

        assert!(matches!(result, Err(DomainError::DuplicateEvent { .. })));
        assert_eq!(session.session_id(), Some("cs_1"));
    }

    #[test]
    fn test_settle_unopened_session_is_not_found() {
        let mut session = PaymentSession::new(Uuid::new_v4());

        let result = session.settle(Settlement::Succeeded, None, Uuid::new_v4(), Uuid::new_v4(), &clock());

        assert!(matches!(result, Err(DomainError::AggregateNotFound(_))));
    }

    #[test]
    fn test_settle_with_other_session_is_rejected() {
        let mut session = pending();

        let result = session.settle(
            Settlement::Succeeded,
            Some("cs_other"),
            Uuid::new_v4(),
            Uuid::new_v4(),
            &clock(),
        );

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_failed_session_keeps_reason() {
        // Arrange
        let mut session = pending();

        // Act
        session
            .settle(
                Settlement::Failed {
                    reason: "checkout.session.expired".into(),
                },
                Some("cs_1"),
                Uuid::new_v4(),
                Uuid::new_v4(),
                &clock(),
            )
            .unwrap();
        commit(&mut session);

        // Assert
        assert_eq!(session.status(), PaymentStatus::Failed);
        assert_eq!(
            session.failure_reason.as_deref(),
            Some("checkout.session.expired")
        );
        assert_eq!(session.settled_at, Some(clock().0));
    }

    #[test]
    fn test_repeated_and_contradicting_settlements() {
        // Arrange
        let mut session = pending();
        session
            .settle(Settlement::Succeeded, None, Uuid::new_v4(), Uuid::new_v4(), &clock())
            .unwrap();
        commit(&mut session);

        // Act
        let again = session.settle(Settlement::Succeeded, None, Uuid::new_v4(), Uuid::new_v4(), &clock());
        let contradicting = session.settle(
            Settlement::Failed {
                reason: "late failure".into(),
            },
            None,
            Uuid::new_v4(),
            Uuid::new_v4(),
            &clock(),
        );

        // Assert
        assert!(matches!(again, Err(DomainError::DuplicateEvent { .. })));
        assert!(matches!(
            contradicting,
            Err(DomainError::InvalidTransition { .. })
        ));
        assert_eq!(session.status(), PaymentStatus::Succeeded);
    }
}
