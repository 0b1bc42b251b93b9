//! Wire messages of `rideshare.trip.TripService`.
//!
//! Hand-written prost messages; tags are the wire contract and never reused.

use rideshare_core::error::DomainError;
use rideshare_core::geo;
use serde::Serialize;

use crate::application::command_handlers::TripPreview;
use crate::application::query_handlers::TripView;
use crate::domain::pricing;

/// `CreateTrip` method path.
pub const CREATE_TRIP_PATH: &str = "/rideshare.trip.TripService/CreateTrip";
/// `PreviewTrip` method path.
pub const PREVIEW_TRIP_PATH: &str = "/rideshare.trip.TripService/PreviewTrip";
/// `GetTrip` method path.
pub const GET_TRIP_PATH: &str = "/rideshare.trip.TripService/GetTrip";
/// `CancelTrip` method path.
pub const CANCEL_TRIP_PATH: &str = "/rideshare.trip.TripService/CancelTrip";

#[derive(Clone, Copy, PartialEq, Serialize, prost::Message)]
pub struct Coordinate {
    #[prost(double, tag = "1")]
    pub latitude: f64,
    #[prost(double, tag = "2")]
    pub longitude: f64,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct RideFare {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub package_slug: String,
    #[prost(int64, tag = "3")]
    pub total_price_in_cents: i64,
    #[prost(string, tag = "4")]
    pub currency: String,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct Route {
    #[prost(double, tag = "1")]
    pub distance_meters: f64,
    #[prost(double, tag = "2")]
    pub duration_seconds: f64,
    #[prost(message, repeated, tag = "3")]
    pub geometry: Vec<Coordinate>,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct Driver {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub car_plate: String,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct Trip {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub user_id: String,
    /// Lowercase status name, e.g. `driver_assigned`.
    #[prost(string, tag = "3")]
    pub status: String,
    #[prost(message, optional, tag = "4")]
    pub pickup: Option<Coordinate>,
    #[prost(message, optional, tag = "5")]
    pub destination: Option<Coordinate>,
    #[prost(message, optional, tag = "6")]
    pub selected_fare: Option<RideFare>,
    #[prost(message, optional, tag = "7")]
    pub driver: Option<Driver>,
    #[prost(string, optional, tag = "8")]
    pub payment_session_id: Option<String>,
    #[prost(string, optional, tag = "9")]
    pub cancel_reason: Option<String>,
    #[prost(string, optional, tag = "10")]
    pub failure_reason: Option<String>,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct CreateTripRequest {
    #[prost(string, tag = "1")]
    pub user_id: String,
    #[prost(message, optional, tag = "2")]
    pub pickup: Option<Coordinate>,
    #[prost(message, optional, tag = "3")]
    pub destination: Option<Coordinate>,
    #[prost(string, tag = "4")]
    pub package_slug: String,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct CreateTripResponse {
    #[prost(message, optional, tag = "1")]
    pub trip: Option<Trip>,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct PreviewTripRequest {
    #[prost(string, tag = "1")]
    pub user_id: String,
    #[prost(message, optional, tag = "2")]
    pub pickup: Option<Coordinate>,
    #[prost(message, optional, tag = "3")]
    pub destination: Option<Coordinate>,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct PreviewTripResponse {
    #[prost(message, optional, tag = "1")]
    pub route: Option<Route>,
    #[prost(message, repeated, tag = "2")]
    pub ride_fares: Vec<RideFare>,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct GetTripRequest {
    #[prost(string, tag = "1")]
    pub trip_id: String,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct GetTripResponse {
    #[prost(message, optional, tag = "1")]
    pub trip: Option<Trip>,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct CancelTripRequest {
    #[prost(string, tag = "1")]
    pub trip_id: String,
    #[prost(string, tag = "2")]
    pub reason: String,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct CancelTripResponse {
    #[prost(message, optional, tag = "1")]
    pub trip: Option<Trip>,
}

impl From<geo::Coordinate> for Coordinate {
    fn from(c: geo::Coordinate) -> Self {
        Self {
            latitude: c.latitude,
            longitude: c.longitude,
        }
    }
}

impl Coordinate {
    /// Converts a required wire coordinate into a validated domain one.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the field is absent or out of range.
    pub fn require(
        value: Option<Self>,
        field: &'static str,
    ) -> Result<geo::Coordinate, DomainError> {
        let value =
            value.ok_or_else(|| DomainError::Validation(format!("{field} is required")))?;
        geo::Coordinate::new(value.latitude, value.longitude)
    }
}

impl From<&pricing::RideFare> for RideFare {
    fn from(fare: &pricing::RideFare) -> Self {
        Self {
            id: fare.id.to_string(),
            package_slug: fare.package_slug.clone(),
            total_price_in_cents: fare.total_price_in_cents,
            currency: fare.currency.clone(),
        }
    }
}

impl From<&pricing::Route> for Route {
    fn from(route: &pricing::Route) -> Self {
        Self {
            distance_meters: route.distance_meters,
            duration_seconds: route.duration_seconds,
            geometry: route.geometry.iter().copied().map(Coordinate::from).collect(),
        }
    }
}

impl From<&TripPreview> for PreviewTripResponse {
    fn from(preview: &TripPreview) -> Self {
        Self {
            route: Some(Route::from(&preview.route)),
            ride_fares: preview.ride_fares.iter().map(RideFare::from).collect(),
        }
    }
}

impl From<&TripView> for Trip {
    fn from(view: &TripView) -> Self {
        Self {
            id: view.trip_id.to_string(),
            user_id: view.user_id.clone(),
            status: view.status.as_str().to_owned(),
            pickup: view.pickup.map(Coordinate::from),
            destination: view.destination.map(Coordinate::from),
            selected_fare: view.fare.as_ref().map(RideFare::from),
            driver: view.driver.as_ref().map(|d| Driver {
                id: d.driver_id.clone(),
                name: d.name.clone(),
                car_plate: d.car_plate.clone(),
            }),
            payment_session_id: view.payment_session_id.clone(),
            cancel_reason: view.cancel_reason.clone(),
            failure_reason: view.failure_reason.clone(),
        }
    }
}
