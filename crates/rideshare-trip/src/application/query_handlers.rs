//! Query handlers for the trip context.

use rideshare_core::error::DomainError;
use rideshare_core::geo::Coordinate;
use rideshare_core::repository::EventRepository;
use serde::Serialize;
use uuid::Uuid;

use crate::application::command_handlers;
use crate::domain::aggregates::{Trip, TripStatus, TripTimestamps};
use crate::domain::events::AssignedDriver;
use crate::domain::pricing::RideFare;

/// Read-only view of a trip aggregate.
#[derive(Debug, Clone, Serialize)]
pub struct TripView {
    /// The trip identifier.
    pub trip_id: Uuid,
    /// The rider.
    pub user_id: String,
    /// Current status.
    pub status: TripStatus,
    /// Pickup location.
    pub pickup: Option<Coordinate>,
    /// Destination.
    pub destination: Option<Coordinate>,
    /// The selected fare.
    pub fare: Option<RideFare>,
    /// The assigned driver, once matched.
    pub driver: Option<AssignedDriver>,
    /// The active payment session.
    pub payment_session_id: Option<String>,
    /// Set when cancelled.
    pub cancel_reason: Option<String>,
    /// Set when payment failed.
    pub failure_reason: Option<String>,
    /// Transition times.
    pub timestamps: TripTimestamps,
    /// Current version (event count).
    pub version: i64,
}

impl From<&Trip> for TripView {
    fn from(trip: &Trip) -> Self {
        Self {
            trip_id: trip.id,
            user_id: trip.user_id.clone(),
            status: trip.status,
            pickup: trip.pickup,
            destination: trip.destination,
            fare: trip.fare.clone(),
            driver: trip.driver.clone(),
            payment_session_id: trip.payment_session_id.clone(),
            cancel_reason: trip.cancel_reason.clone(),
            failure_reason: trip.failure_reason.clone(),
            timestamps: trip.timestamps.clone(),
            version: trip.version,
        }
    }
}

/// Retrieves a trip by its aggregate ID.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if no events exist for the ID.
/// Returns `DomainError::Dependency` if loading or deserialization fails.
pub async fn get_trip_by_id(
    trip_id: Uuid,
    repo: &dyn EventRepository,
) -> Result<TripView, DomainError> {
    let stored_events = repo.load_events(trip_id).await?;
    if stored_events.is_empty() {
        return Err(DomainError::AggregateNotFound(trip_id));
    }
    let trip = command_handlers::reconstitute(trip_id, &stored_events)?;
    Ok(TripView::from(&trip))
}
