//! `POST /api/preview`: stateless route and fare preview.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use rideshare_core::geo::Coordinate;
use rideshare_transport::http::{ApiError, ValidJson};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::application::command_handlers::{self, TripPreview};
use crate::domain::commands::PreviewTrip;
use crate::domain::pricing::CarPackage;
use crate::state::AppState;

/// Request body for POST /api/preview.
#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    /// The rider.
    pub user_id: String,
    /// Pickup location.
    pub pickup: Coordinate,
    /// Destination.
    pub destination: Coordinate,
    /// Preferred ride package. Every package is priced regardless.
    #[serde(default)]
    pub ride_type: Option<String>,
}

/// POST /api/preview
#[instrument(skip(state, request), fields(user_id = %request.user_id))]
async fn preview(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<PreviewRequest>,
) -> Result<Json<TripPreview>, ApiError> {
    if let Some(ride_type) = request.ride_type.as_deref().filter(|s| !s.is_empty()) {
        ride_type.parse::<CarPackage>()?;
    }
    let command = PreviewTrip {
        correlation_id: Uuid::new_v4(),
        user_id: request.user_id,
        pickup: request.pickup,
        destination: request.destination,
    };

    info!(correlation_id = %command.correlation_id, "handling preview_trip command");

    let preview = command_handlers::handle_preview_trip(
        &command,
        state.route_planner.as_ref(),
        state.fare_estimator.as_ref(),
    )
    .await?;

    Ok(Json(preview))
}

/// Returns the router for the preview endpoint.
pub fn router() -> Router<AppState> {
    Router::new().route("/preview", post(preview))
}
