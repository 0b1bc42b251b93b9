//! Route modules of the public HTTP surface.

pub mod drivers;
pub mod trips;
pub mod webhooks;

use axum::Router;
use serde::Serialize;

use crate::state::AppState;

/// Success body: every response payload is wrapped as `{"data": ...}`.
#[derive(Debug, Serialize)]
pub struct Data<T> {
    pub data: T,
}

impl<T> Data<T> {
    #[must_use]
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Returns the gateway's HTTP router, state applied.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/trips", trips::router())
        .nest("/drivers", drivers::router())
        .nest("/webhooks", webhooks::router())
        .with_state(state)
}
