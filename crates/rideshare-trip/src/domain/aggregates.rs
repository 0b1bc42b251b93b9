//! Aggregate roots for the trip context.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use rideshare_core::aggregate::AggregateRoot;
use rideshare_core::clock::Clock;
use rideshare_core::error::DomainError;
use rideshare_core::event::EventMetadata;
use rideshare_core::geo::Coordinate;
use serde::Serialize;
use uuid::Uuid;

use super::events::{
    AssignedDriver, DRIVER_ASSIGNED_EVENT_TYPE, DriverAssigned, PAYMENT_FAILED_EVENT_TYPE,
    PAYMENT_SESSION_OPENED_EVENT_TYPE, PAYMENT_SUCCEEDED_EVENT_TYPE, PaymentFailed,
    PaymentSessionOpened, PaymentSucceeded, TRIP_CANCELLED_EVENT_TYPE, TRIP_STARTED_EVENT_TYPE,
    TripCancelled, TripEvent, TripEventKind, TripStarted,
};
use super::pricing::RideFare;

/// Lifecycle of a trip.
///
/// `Created` and `Previewed` never reach the event store. `PaymentSucceeded`,
/// `PaymentFailed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    /// In memory only, before the start event.
    Created,
    /// Fares computed for a preview; never persisted.
    Previewed,
    /// Persisted, waiting for a driver.
    Started,
    /// A driver accepted.
    DriverAssigned,
    /// A payment session is open.
    PaymentPending,
    /// Payment confirmed.
    PaymentSucceeded,
    /// Payment failed or expired.
    PaymentFailed,
    /// Cancelled by the rider or by compensation.
    Cancelled,
}

impl TripStatus {
    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Previewed => "previewed",
            Self::Started => "started",
            Self::DriverAssigned => "driver_assigned",
            Self::PaymentPending => "payment_pending",
            Self::PaymentSucceeded => "payment_succeeded",
            Self::PaymentFailed => "payment_failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns `true` if no transition may leave this state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::PaymentSucceeded | Self::PaymentFailed | Self::Cancelled
        )
    }

    /// Returns `true` if trips in this state exist in the event store.
    #[must_use]
    pub fn is_persistent(self) -> bool {
        !matches!(self, Self::Created | Self::Previewed)
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a payment attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// The provider confirmed payment.
    Succeeded {
        /// The session that settled, when known.
        session_id: Option<String>,
    },
    /// The provider reported failure or expiry.
    Failed {
        /// Provider event type or error summary.
        reason: String,
    },
}

/// When each transition happened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TripTimestamps {
    /// Entered `Started`.
    pub started_at: Option<DateTime<Utc>>,
    /// Entered `DriverAssigned`.
    pub driver_assigned_at: Option<DateTime<Utc>>,
    /// Entered `PaymentPending`.
    pub payment_pending_at: Option<DateTime<Utc>>,
    /// Entered `PaymentSucceeded` or `PaymentFailed`.
    pub settled_at: Option<DateTime<Utc>>,
    /// Entered `Cancelled`.
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// The aggregate root for a trip.
#[derive(Debug)]
pub struct Trip {
    /// Aggregate identifier.
    pub id: Uuid,
    /// Current version (event count).
    pub(crate) version: i64,
    pub(crate) status: TripStatus,
    pub(crate) user_id: String,
    pub(crate) pickup: Option<Coordinate>,
    pub(crate) destination: Option<Coordinate>,
    pub(crate) fare: Option<RideFare>,
    pub(crate) driver: Option<AssignedDriver>,
    pub(crate) payment_session_id: Option<String>,
    pub(crate) cancel_reason: Option<String>,
    pub(crate) failure_reason: Option<String>,
    pub(crate) timestamps: TripTimestamps,
    /// Causation IDs (broker message IDs) already applied.
    handled_messages: HashSet<Uuid>,
    /// Uncommitted events pending persistence.
    uncommitted_events: Vec<TripEvent>,
}

impl Trip {
    /// Creates an empty trip in `Created`.
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            version: 0,
            status: TripStatus::Created,
            user_id: String::new(),
            pickup: None,
            destination: None,
            fare: None,
            driver: None,
            payment_session_id: None,
            cancel_reason: None,
            failure_reason: None,
            timestamps: TripTimestamps::default(),
            handled_messages: HashSet::new(),
            uncommitted_events: Vec::new(),
        }
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> TripStatus {
        self.status
    }

    /// Returns the next sequence number for a new event.
    #[allow(clippy::cast_possible_wrap)]
    fn next_sequence_number(&self) -> i64 {
        self.version + self.uncommitted_events.len() as i64 + 1
    }

    fn record(
        &mut self,
        event_type: &str,
        kind: TripEventKind,
        correlation_id: Uuid,
        causation_id: Uuid,
        clock: &dyn Clock,
    ) {
        let event = TripEvent {
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

    fn ensure_exists(&self) -> Result<(), DomainError> {
        if self.status.is_persistent() {
            Ok(())
        } else {
            Err(DomainError::AggregateNotFound(self.id))
        }
    }

    fn ensure_unhandled(&self, causation_id: Uuid) -> Result<(), DomainError> {
        if self.handled_messages.contains(&causation_id) {
            return Err(DomainError::duplicate(
                self.id,
                format!("message {causation_id} already applied"),
            ));
        }
        Ok(())
    }

    fn already_past(&self, step: &str) -> DomainError {
        DomainError::duplicate(self.id, format!("trip is {} and past {step}", self.status))
    }

    /// Marks a fresh trip as previewed (`Created → Previewed`). Records no
    /// event; a previewed trip is never persisted.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for a blank user or invalid
    /// coordinates and `DomainError::DuplicateEvent` if the trip is past
    /// `Created`.
    pub fn preview(
        &mut self,
        user_id: &str,
        pickup: Coordinate,
        destination: Coordinate,
    ) -> Result<(), DomainError> {
        if self.status != TripStatus::Created {
            return Err(self.already_past("preview"));
        }
        if user_id.trim().is_empty() {
            return Err(DomainError::Validation("user_id must not be empty".into()));
        }
        pickup.validate()?;
        destination.validate()?;

        self.status = TripStatus::Previewed;
        self.user_id = user_id.to_owned();
        self.pickup = Some(pickup);
        self.destination = Some(destination);
        Ok(())
    }

    /// Starts the trip, producing a `TripStarted` event. A previewed trip may
    /// be started.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::DuplicateEvent` if the trip already exists and
    /// `DomainError::Validation` for a blank user or invalid coordinates.
    pub fn start(
        &mut self,
        user_id: &str,
        pickup: Coordinate,
        destination: Coordinate,
        fare: RideFare,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if !self.is_new() {
            return Err(DomainError::duplicate(self.id, "trip already started"));
        }
        if user_id.trim().is_empty() {
            return Err(DomainError::Validation("user_id must not be empty".into()));
        }
        pickup.validate()?;
        destination.validate()?;

        self.record(
            TRIP_STARTED_EVENT_TYPE,
            TripEventKind::TripStarted(TripStarted {
                user_id: user_id.to_owned(),
                pickup,
                destination,
                fare,
            }),
            correlation_id,
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Records the assigned driver (`Started → DriverAssigned`).
    ///
    /// # Errors
    ///
    /// Returns `DomainError::DuplicateEvent` if the message was already applied
    /// or the trip is past this step, and `DomainError::AggregateNotFound` if
    /// the trip was never started.
    pub fn assign_driver(
        &mut self,
        driver: AssignedDriver,
        correlation_id: Uuid,
        causation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_exists()?;
        self.ensure_unhandled(causation_id)?;
        if self.status != TripStatus::Started {
            return Err(self.already_past("driver assignment"));
        }
        if driver.driver_id.trim().is_empty() {
            return Err(DomainError::Validation("driver_id must not be empty".into()));
        }

        self.record(
            DRIVER_ASSIGNED_EVENT_TYPE,
            TripEventKind::DriverAssigned(DriverAssigned { driver }),
            correlation_id,
            causation_id,
            clock,
        );
        Ok(())
    }

    /// Attaches the payment session (`DriverAssigned → PaymentPending`).
    ///
    /// # Errors
    ///
    /// Returns `DomainError::OutOfOrder` while no driver is assigned,
    /// `DomainError::Validation` if a different session is already active, and
    /// `DomainError::DuplicateEvent` for repeats and settled trips.
    pub fn record_payment_session(
        &mut self,
        session_id: &str,
        correlation_id: Uuid,
        causation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_exists()?;
        self.ensure_unhandled(causation_id)?;
        if session_id.trim().is_empty() {
            return Err(DomainError::Validation("session_id must not be empty".into()));
        }
        match self.status {
            TripStatus::Started => {
                return Err(DomainError::out_of_order(
                    self.id,
                    "payment session arrived before driver assignment",
                ));
            }
            TripStatus::DriverAssigned => {}
            TripStatus::PaymentPending => {
                return match self.payment_session_id.as_deref() {
                    Some(active) if active != session_id => Err(DomainError::Validation(
                        format!("trip {} already has active payment session {active}", self.id),
                    )),
                    _ => Err(DomainError::duplicate(
                        self.id,
                        "payment session already recorded",
                    )),
                };
            }
            _ => return Err(self.already_past("payment session")),
        }

        self.record(
            PAYMENT_SESSION_OPENED_EVENT_TYPE,
            TripEventKind::PaymentSessionOpened(PaymentSessionOpened {
                session_id: session_id.to_owned(),
            }),
            correlation_id,
            causation_id,
            clock,
        );
        Ok(())
    }

    /// Settles payment (`DriverAssigned | PaymentPending → PaymentSucceeded |
    /// PaymentFailed`).
    ///
    /// # Errors
    ///
    /// Returns `DomainError::OutOfOrder` while no driver is assigned,
    /// `DomainError::Validation` if the settlement names a session other than
    /// the active one, and `DomainError::DuplicateEvent` for repeats and
    /// terminal trips.
    pub fn settle_payment(
        &mut self,
        outcome: PaymentOutcome,
        correlation_id: Uuid,
        causation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_exists()?;
        self.ensure_unhandled(causation_id)?;
        match self.status {
            TripStatus::Started => {
                return Err(DomainError::out_of_order(
                    self.id,
                    "payment settled before driver assignment",
                ));
            }
            TripStatus::DriverAssigned | TripStatus::PaymentPending => {}
            _ => return Err(self.already_past("payment settlement")),
        }
        if let PaymentOutcome::Succeeded {
            session_id: Some(reported),
        } = &outcome
        {
            match self.payment_session_id.as_deref() {
                Some(active) if active != reported => {
                    return Err(DomainError::Validation(format!(
                        "settlement names session {reported} but trip {} has active session {active}",
                        self.id
                    )));
                }
                _ => {}
            }
        }

        let (event_type, kind) = match outcome {
            PaymentOutcome::Succeeded { session_id } => (
                PAYMENT_SUCCEEDED_EVENT_TYPE,
                TripEventKind::PaymentSucceeded(PaymentSucceeded { session_id }),
            ),
            PaymentOutcome::Failed { reason } => (
                PAYMENT_FAILED_EVENT_TYPE,
                TripEventKind::PaymentFailed(PaymentFailed { reason }),
            ),
        };
        self.record(event_type, kind, correlation_id, causation_id, clock);
        Ok(())
    }

    /// Cancels the trip from any non-terminal persisted state.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` once payment has settled and
    /// `DomainError::DuplicateEvent` if already cancelled.
    pub fn cancel(
        &mut self,
        reason: &str,
        correlation_id: Uuid,
        causation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_exists()?;
        self.ensure_unhandled(causation_id)?;
        match self.status {
            TripStatus::Cancelled => {
                return Err(DomainError::duplicate(self.id, "trip already cancelled"));
            }
            TripStatus::PaymentSucceeded | TripStatus::PaymentFailed => {
                return Err(DomainError::InvalidTransition {
                    aggregate_id: self.id,
                    from: self.status.to_string(),
                    to: TripStatus::Cancelled.to_string(),
                });
            }
            _ => {}
        }

        self.record(
            TRIP_CANCELLED_EVENT_TYPE,
            TripEventKind::TripCancelled(TripCancelled {
                reason: reason.to_owned(),
            }),
            correlation_id,
            causation_id,
            clock,
        );
        Ok(())
    }

    /// Compensates a failed match: only a `Started` trip is cancelled.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::DuplicateEvent` if the trip already moved on.
    pub fn cancel_for_missing_driver(
        &mut self,
        package_slug: &str,
        correlation_id: Uuid,
        causation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_exists()?;
        if self.status != TripStatus::Started {
            return Err(self.already_past("driver matching"));
        }
        self.cancel(
            &format!("no driver available for package {package_slug}"),
            correlation_id,
            causation_id,
            clock,
        )
    }
}

impl AggregateRoot for Trip {
    type Event = TripEvent;

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(&mut self, event: &Self::Event) {
        let at = event.metadata.occurred_at;
        match &event.kind {
            TripEventKind::TripStarted(payload) => {
                self.status = TripStatus::Started;
                self.user_id.clone_from(&payload.user_id);
                self.pickup = Some(payload.pickup);
                self.destination = Some(payload.destination);
                self.fare = Some(payload.fare.clone());
                self.timestamps.started_at = Some(at);
            }
            TripEventKind::DriverAssigned(payload) => {
                self.status = TripStatus::DriverAssigned;
                self.driver = Some(payload.driver.clone());
                self.timestamps.driver_assigned_at = Some(at);
            }
            TripEventKind::PaymentSessionOpened(payload) => {
                self.status = TripStatus::PaymentPending;
                self.payment_session_id = Some(payload.session_id.clone());
                self.timestamps.payment_pending_at = Some(at);
            }
            TripEventKind::PaymentSucceeded(payload) => {
                self.status = TripStatus::PaymentSucceeded;
                if self.payment_session_id.is_none() {
                    self.payment_session_id.clone_from(&payload.session_id);
                }
                self.timestamps.settled_at = Some(at);
            }
            TripEventKind::PaymentFailed(payload) => {
                self.status = TripStatus::PaymentFailed;
                self.failure_reason = Some(payload.reason.clone());
                self.timestamps.settled_at = Some(at);
            }
            TripEventKind::TripCancelled(payload) => {
                self.status = TripStatus::Cancelled;
                self.cancel_reason = Some(payload.reason.clone());
                self.timestamps.cancelled_at = Some(at);
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
