//! Server side of `rideshare.driver.DriverService`.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Request, State};
use axum::response::Response;
use axum::routing::post;
use rideshare_transport::rpc;
use tonic::Status;
use tracing::{info, instrument};

use super::proto::{
    REGISTER_DRIVER_PATH, RegisterDriverRequest, RegisterDriverResponse, UNREGISTER_DRIVER_PATH,
    UnregisterDriverRequest, UnregisterDriverResponse,
};
use crate::domain::registry::{DriverRegistry, RegistryError};

/// Returns the RPC router for the driver service, registry applied.
pub fn router(registry: Arc<DriverRegistry>) -> Router {
    Router::new()
        .route(REGISTER_DRIVER_PATH, post(register_driver))
        .route(UNREGISTER_DRIVER_PATH, post(unregister_driver))
        .with_state(registry)
}

fn to_status(err: &RegistryError) -> Status {
    match err {
        RegistryError::MissingField { .. } => Status::invalid_argument(err.to_string()),
        RegistryError::UnknownDriver(_) => Status::not_found(err.to_string()),
    }
}

fn online(registry: &DriverRegistry) -> u32 {
    u32::try_from(registry.len()).unwrap_or(u32::MAX)
}

#[instrument(skip_all)]
async fn register_driver(
    State(registry): State<Arc<DriverRegistry>>,
    request: Request,
) -> Response {
    rpc::unary(request, move |message: RegisterDriverRequest| async move {
        let driver = message
            .driver
            .ok_or_else(|| Status::invalid_argument("driver is required"))?;
        let registered = registry
            .register(driver.into())
            .map_err(|e| to_status(&e))?;
        info!(
            driver_id = %registered.id,
            package = %registered.package_slug,
            "driver registered"
        );

        Ok(RegisterDriverResponse {
            driver: Some(registered.into()),
            online: online(&registry),
        })
    })
    .await
}

#[instrument(skip_all)]
async fn unregister_driver(
    State(registry): State<Arc<DriverRegistry>>,
    request: Request,
) -> Response {
    rpc::unary(request, move |message: UnregisterDriverRequest| async move {
        let removed = registry
            .unregister(&message.driver_id)
            .map_err(|e| to_status(&e))?;
        info!(driver_id = %removed.id, "driver unregistered");

        Ok(UnregisterDriverResponse {
            driver: Some(removed.into()),
            online: online(&registry),
        })
    })
    .await
}
