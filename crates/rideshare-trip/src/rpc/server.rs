//! Server side of `rideshare.trip.TripService`.

use axum::Router;
use axum::extract::{Request, State};
use axum::response::Response;
use axum::routing::post;
use rideshare_core::error::DomainError;
use rideshare_transport::rpc::{self, status_from_domain};
use tonic::Status;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::proto::{
    CANCEL_TRIP_PATH, CREATE_TRIP_PATH, CancelTripRequest, CancelTripResponse, Coordinate,
    CreateTripRequest, CreateTripResponse, GET_TRIP_PATH, GetTripRequest, GetTripResponse,
    PREVIEW_TRIP_PATH, PreviewTripRequest, PreviewTripResponse, Trip,
};
use crate::application::{command_handlers, query_handlers};
use crate::domain::commands::{CancelTrip, CreateTrip, PreviewTrip};
use crate::state::AppState;

/// Returns the RPC router for the trip service, state applied.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(CREATE_TRIP_PATH, post(create_trip))
        .route(PREVIEW_TRIP_PATH, post(preview_trip))
        .route(GET_TRIP_PATH, post(get_trip))
        .route(CANCEL_TRIP_PATH, post(cancel_trip))
        .with_state(state)
}

fn to_status(err: &DomainError) -> Status {
    if matches!(err, DomainError::Dependency(_)) {
        warn!(error = %err, "trip rpc failed on a dependency");
    }
    status_from_domain(err)
}

fn parse_trip_id(raw: &str) -> Result<Uuid, Status> {
    Uuid::parse_str(raw)
        .map_err(|_| Status::invalid_argument(format!("trip_id {raw:?} is not a valid id")))
}

#[instrument(skip(state, request))]
async fn create_trip(State(state): State<AppState>, request: Request) -> Response {
    rpc::unary(request, move |message: CreateTripRequest| async move {
        let command = CreateTrip {
            correlation_id: Uuid::new_v4(),
            trip_id: Uuid::now_v7(),
            user_id: message.user_id,
            pickup: Coordinate::require(message.pickup, "pickup").map_err(|e| to_status(&e))?,
            destination: Coordinate::require(message.destination, "destination")
                .map_err(|e| to_status(&e))?,
            package_slug: message.package_slug,
        };

        info!(
            correlation_id = %command.correlation_id,
            trip_id = %command.trip_id,
            "handling create_trip command"
        );

        let result = command_handlers::handle_create_trip(
            &command,
            state.clock.as_ref(),
            state.event_repository.as_ref(),
            state.publisher.as_ref(),
            state.route_planner.as_ref(),
            state.fare_estimator.as_ref(),
        )
        .await
        .map_err(|e| to_status(&e))?;

        Ok(CreateTripResponse {
            trip: Some(Trip::from(&result.trip)),
        })
    })
    .await
}

#[instrument(skip(state, request))]
async fn preview_trip(State(state): State<AppState>, request: Request) -> Response {
    rpc::unary(request, move |message: PreviewTripRequest| async move {
        let command = PreviewTrip {
            correlation_id: Uuid::new_v4(),
            user_id: message.user_id,
            pickup: Coordinate::require(message.pickup, "pickup").map_err(|e| to_status(&e))?,
            destination: Coordinate::require(message.destination, "destination")
                .map_err(|e| to_status(&e))?,
        };

        let preview = command_handlers::handle_preview_trip(
            &command,
            state.route_planner.as_ref(),
            state.fare_estimator.as_ref(),
        )
        .await
        .map_err(|e| to_status(&e))?;

        Ok(PreviewTripResponse::from(&preview))
    })
    .await
}

#[instrument(skip(state, request))]
async fn get_trip(State(state): State<AppState>, request: Request) -> Response {
    rpc::unary(request, move |message: GetTripRequest| async move {
        let trip_id = parse_trip_id(&message.trip_id)?;
        let view = query_handlers::get_trip_by_id(trip_id, state.event_repository.as_ref())
            .await
            .map_err(|e| to_status(&e))?;

        Ok(GetTripResponse {
            trip: Some(Trip::from(&view)),
        })
    })
    .await
}

#[instrument(skip(state, request))]
async fn cancel_trip(State(state): State<AppState>, request: Request) -> Response {
    rpc::unary(request, move |message: CancelTripRequest| async move {
        let command = CancelTrip {
            correlation_id: Uuid::new_v4(),
            trip_id: parse_trip_id(&message.trip_id)?,
            reason: message.reason,
        };

        info!(
            correlation_id = %command.correlation_id,
            trip_id = %command.trip_id,
            "handling cancel_trip command"
        );

        let _guard = state.locks.lock(command.trip_id).await;
        let result = command_handlers::handle_cancel_trip(
            &command,
            state.clock.as_ref(),
            state.event_repository.as_ref(),
        )
        .await
        .map_err(|e| to_status(&e))?;

        Ok(CancelTripResponse {
            trip: Some(Trip::from(&result.trip)),
        })
    })
    .await
}
