//! Domain events for the trip context.

use rideshare_core::event::{DomainEvent, EventMetadata};
use rideshare_core::geo::Coordinate;
use serde::{Deserialize, Serialize};

use super::pricing::RideFare;

/// Event type for a trip entering `Started`.
pub const TRIP_STARTED_EVENT_TYPE: &str = "trip.started";
/// Event type for a driver assignment.
pub const DRIVER_ASSIGNED_EVENT_TYPE: &str = "trip.driver_assigned";
/// Event type for a payment session being attached.
pub const PAYMENT_SESSION_OPENED_EVENT_TYPE: &str = "trip.payment_session_opened";
/// Event type for a confirmed payment.
pub const PAYMENT_SUCCEEDED_EVENT_TYPE: &str = "trip.payment_succeeded";
/// Event type for a failed payment.
pub const PAYMENT_FAILED_EVENT_TYPE: &str = "trip.payment_failed";
/// Event type for a cancellation.
pub const TRIP_CANCELLED_EVENT_TYPE: &str = "trip.cancelled";

/// The driver recorded on a trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedDriver {
    /// Driver identifier.
    pub driver_id: String,
    /// Display name.
    pub name: String,
    /// Vehicle plate.
    pub car_plate: String,
}

/// Emitted when a trip is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripStarted {
    /// The rider.
    pub user_id: String,
    /// Pickup location.
    pub pickup: Coordinate,
    /// Destination.
    pub destination: Coordinate,
    /// The selected fare.
    pub fare: RideFare,
}

/// Emitted when a driver accepts the trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverAssigned {
    /// The driver.
    pub driver: AssignedDriver,
}

/// Emitted when a payment session is attached to the trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSessionOpened {
    /// Provider or placeholder session ID.
    pub session_id: String,
}

/// Emitted when the provider confirms payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSucceeded {
    /// The session that settled, when known.
    pub session_id: Option<String>,
}

/// Emitted when payment fails or expires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentFailed {
    /// Provider event type or error summary.
    pub reason: String,
}

/// Emitted when a trip is cancelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripCancelled {
    /// Why the trip was cancelled.
    pub reason: String,
}

/// Event payload variants for the trip context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TripEventKind {
    /// The trip was started.
    TripStarted(TripStarted),
    /// A driver was assigned.
    DriverAssigned(DriverAssigned),
    /// A payment session was attached.
    PaymentSessionOpened(PaymentSessionOpened),
    /// Payment succeeded.
    PaymentSucceeded(PaymentSucceeded),
    /// Payment failed.
    PaymentFailed(PaymentFailed),
    /// The trip was cancelled.
    TripCancelled(TripCancelled),
}

/// Domain event envelope for the trip context.
#[derive(Debug, Clone)]
pub struct TripEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: TripEventKind,
}

impl DomainEvent for TripEvent {
    fn event_type(&self) -> &'static str {
        match &self.kind {
            TripEventKind::TripStarted(_) => TRIP_STARTED_EVENT_TYPE,
            TripEventKind::DriverAssigned(_) => DRIVER_ASSIGNED_EVENT_TYPE,
            TripEventKind::PaymentSessionOpened(_) => PAYMENT_SESSION_OPENED_EVENT_TYPE,
            TripEventKind::PaymentSucceeded(_) => PAYMENT_SUCCEEDED_EVENT_TYPE,
            TripEventKind::PaymentFailed(_) => PAYMENT_FAILED_EVENT_TYPE,
            TripEventKind::TripCancelled(_) => TRIP_CANCELLED_EVENT_TYPE,
        }
    }

    fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(&self.kind).unwrap_or_default()
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
