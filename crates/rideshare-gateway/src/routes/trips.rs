//! Trip routes: start, preview, lookup, cancel and payment status.
//!
//! Every handler opens its own channel to the internal service and drops it
//! when the handler returns.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use rideshare_core::geo::Coordinate;
use rideshare_payment::rpc::client::PaymentServiceClient;
use rideshare_payment::rpc::proto::{GetPaymentSessionRequest, PaymentSession};
use rideshare_transport::http::ValidJson;
use rideshare_transport::rpc;
use rideshare_trip::rpc::client::TripServiceClient;
use rideshare_trip::rpc::proto::{CancelTripRequest, CreateTripRequest, GetTripRequest, Trip};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

use crate::error::GatewayError;
use crate::routes::Data;
use crate::state::AppState;

/// Request body for POST /trips/start.
#[derive(Debug, Deserialize)]
pub struct StartTripRequest {
    /// The rider.
    pub user_id: String,
    /// Pickup location.
    pub pickup: Coordinate,
    /// Destination.
    pub destination: Coordinate,
    /// Ride package the rider picked from the preview.
    #[serde(alias = "ride_type")]
    pub package_slug: String,
}

/// Request body for POST /trips/preview. Forwarded as-is.
#[derive(Debug, Serialize, Deserialize)]
pub struct PreviewTripRequest {
    pub user_id: String,
    pub pickup: Coordinate,
    pub destination: Coordinate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ride_type: Option<String>,
}

/// Request body for POST /trips/{trip_id}/cancel.
#[derive(Debug, Default, Deserialize)]
pub struct CancelTripBody {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
struct DownstreamErrorBody {
    message: String,
}

fn require_user(user_id: &str) -> Result<(), GatewayError> {
    if user_id.trim().is_empty() {
        return Err(GatewayError::Validation("user_id is required".into()));
    }
    Ok(())
}

async fn trip_client(state: &AppState) -> Result<TripServiceClient, GatewayError> {
    Ok(TripServiceClient::connect(&state.endpoints.trip, state.timeouts).await?)
}

/// POST /trips/start
#[instrument(skip(state, request), fields(user_id = %request.user_id))]
async fn start_trip(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<StartTripRequest>,
) -> Result<(StatusCode, Json<Data<Option<Trip>>>), GatewayError> {
    require_user(&request.user_id)?;
    let client = trip_client(&state).await?;
    let response = client
        .create_trip(CreateTripRequest {
            user_id: request.user_id,
            pickup: Some(request.pickup.into()),
            destination: Some(request.destination.into()),
            package_slug: request.package_slug,
        })
        .await?;

    if let Some(trip) = &response.trip {
        info!(trip_id = %trip.id, "trip started");
    }
    Ok((StatusCode::CREATED, Json(Data::new(response.trip))))
}

/// POST /trips/preview
#[instrument(skip(state, request), fields(user_id = %request.user_id))]
async fn preview_trip(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<PreviewTripRequest>,
) -> Result<(StatusCode, Json<Data<Value>>), GatewayError> {
    require_user(&request.user_id)?;
    let url = format!(
        "{}/api/preview",
        rpc::normalize_url(&state.endpoints.trip).trim_end_matches('/')
    );

    let response = state
        .http
        .post(&url)
        .json(&request)
        .send()
        .await
        .map_err(|e| GatewayError::Unreachable(format!("trip service preview: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let message = response
            .json::<DownstreamErrorBody>()
            .await
            .map_or_else(|_| format!("trip service answered {status}"), |b| b.message);
        return Err(GatewayError::Http {
            status: status.as_u16(),
            message,
        });
    }

    let preview: Value = response
        .json()
        .await
        .map_err(|e| GatewayError::Unreachable(format!("trip service preview body: {e}")))?;
    Ok((StatusCode::CREATED, Json(Data::new(preview))))
}

/// GET /trips/{trip_id}
#[instrument(skip(state))]
async fn get_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
) -> Result<Json<Data<Option<Trip>>>, GatewayError> {
    let client = trip_client(&state).await?;
    let response = client.get_trip(GetTripRequest { trip_id }).await?;
    Ok(Json(Data::new(response.trip)))
}

/// POST /trips/{trip_id}/cancel
#[instrument(skip(state, body))]
async fn cancel_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    ValidJson(body): ValidJson<CancelTripBody>,
) -> Result<Json<Data<Option<Trip>>>, GatewayError> {
    let client = trip_client(&state).await?;
    let response = client
        .cancel_trip(CancelTripRequest {
            trip_id,
            reason: body.reason,
        })
        .await?;
    Ok(Json(Data::new(response.trip)))
}

/// GET /trips/{trip_id}/payment
#[instrument(skip(state))]
async fn get_payment(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
) -> Result<Json<Data<Option<PaymentSession>>>, GatewayError> {
    let client = PaymentServiceClient::connect(&state.endpoints.payment, state.timeouts).await?;
    let response = client
        .get_payment_session(GetPaymentSessionRequest { trip_id })
        .await?;
    Ok(Json(Data::new(response.session)))
}

/// Returns the router for the trip endpoints.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/start", post(start_trip))
        .route("/preview", post(preview_trip))
        .route("/{trip_id}", get(get_trip))
        .route("/{trip_id}/cancel", post(cancel_trip))
        .route("/{trip_id}/payment", get(get_payment))
}
