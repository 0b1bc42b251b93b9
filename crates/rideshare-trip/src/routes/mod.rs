//! HTTP routes of the trip service.

pub mod preview;

use axum::Router;

use crate::state::AppState;

/// Returns the HTTP router for the trip service, state applied.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api", preview::router())
        .with_state(state)
}
