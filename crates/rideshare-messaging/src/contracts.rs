//! Payload contracts, one per topic.
//!
//! Every payload names the trip it concerns, which together with the
//! envelope's message ID is enough for a consumer to detect a redelivery.

use rideshare_core::geo::Coordinate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The fare a trip was started with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FareContract {
    /// Fare identifier.
    pub fare_id: Uuid,
    /// Ride package (`sedan`, `suv`, ...).
    pub package_slug: String,
    /// Total price in the currency's minor unit.
    pub total_price_in_cents: i64,
    /// ISO 4217 currency code, lowercase.
    pub currency: String,
}

/// Payload of `trip.created`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripCreatedData {
    /// The new trip.
    pub trip_id: Uuid,
    /// The rider.
    pub user_id: String,
    /// Pickup location.
    pub pickup: Coordinate,
    /// Destination.
    pub destination: Coordinate,
    /// The selected fare.
    pub fare: FareContract,
}

/// The driver side of an assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverContract {
    /// Driver identifier.
    pub driver_id: String,
    /// Display name.
    pub name: String,
    /// Vehicle plate.
    pub car_plate: String,
    /// Ride package the driver serves.
    pub package_slug: String,
}

/// Payload of `driver.assigned`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverAssignedData {
    /// The trip.
    pub trip_id: Uuid,
    /// The rider.
    pub user_id: String,
    /// The assigned driver.
    pub driver: DriverContract,
    /// The fare the rider will be charged.
    pub fare: FareContract,
}

/// Payload of `driver.not_found`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverNotFoundData {
    /// The trip.
    pub trip_id: Uuid,
    /// The rider.
    pub user_id: String,
    /// The package nobody could serve.
    pub package_slug: String,
}

/// Payload of `payment.session_created`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSessionCreatedData {
    /// The trip.
    pub trip_id: Uuid,
    /// The rider.
    pub user_id: String,
    /// The driver.
    pub driver_id: String,
    /// Provider session ID, or a mock placeholder.
    pub session_id: String,
    /// Amount in minor units.
    pub amount_in_cents: i64,
    /// Currency code.
    pub currency: String,
    /// `true` when `session_id` is a mock placeholder.
    pub mocked: bool,
}

/// Payload of `payment.success`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatusUpdateData {
    /// The trip.
    pub trip_id: Uuid,
    /// The rider.
    pub user_id: String,
    /// The driver.
    pub driver_id: String,
    /// Provider session that settled, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Payload of `payment.failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFailedData {
    /// The trip.
    pub trip_id: Uuid,
    /// The rider.
    pub user_id: String,
    /// The driver.
    pub driver_id: String,
    /// Provider session that failed, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Provider event type or error summary.
    pub reason: String,
}
