//! Driver routes: bring drivers online and take them offline.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, post};
use axum::{Json, Router};
use rideshare_driver::rpc::client::DriverServiceClient;
use rideshare_driver::rpc::proto::{
    Driver, RegisterDriverRequest, RegisterDriverResponse, UnregisterDriverRequest,
    UnregisterDriverResponse,
};
use rideshare_transport::http::ValidJson;
use serde::Deserialize;
use tracing::{info, instrument};

use crate::error::GatewayError;
use crate::routes::Data;
use crate::state::AppState;

/// Request body for POST /drivers.
#[derive(Debug, Deserialize)]
pub struct RegisterDriverBody {
    pub id: String,
    pub name: String,
    pub car_plate: String,
    /// Ride package the driver serves, e.g. `sedan`.
    pub package_slug: String,
}

async fn driver_client(state: &AppState) -> Result<DriverServiceClient, GatewayError> {
    Ok(DriverServiceClient::connect(&state.endpoints.driver, state.timeouts).await?)
}

/// POST /drivers
#[instrument(skip(state, body), fields(driver_id = %body.id))]
async fn register_driver(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<RegisterDriverBody>,
) -> Result<(StatusCode, Json<Data<RegisterDriverResponse>>), GatewayError> {
    let client = driver_client(&state).await?;
    let response = client
        .register_driver(RegisterDriverRequest {
            driver: Some(Driver {
                id: body.id,
                name: body.name,
                car_plate: body.car_plate,
                package_slug: body.package_slug,
            }),
        })
        .await?;

    info!(online = response.online, "driver registered");
    Ok((StatusCode::CREATED, Json(Data::new(response))))
}

/// DELETE /drivers/{driver_id}
#[instrument(skip(state))]
async fn unregister_driver(
    State(state): State<AppState>,
    Path(driver_id): Path<String>,
) -> Result<Json<Data<UnregisterDriverResponse>>, GatewayError> {
    let client = driver_client(&state).await?;
    let response = client
        .unregister_driver(UnregisterDriverRequest { driver_id })
        .await?;
    Ok(Json(Data::new(response)))
}

/// Returns the router for the driver endpoints.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(register_driver))
        .route("/{driver_id}", delete(unregister_driver))
}
