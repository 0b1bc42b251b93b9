//! Server side of `rideshare.payment.PaymentService`.

use axum::Router;
use axum::extract::{Request, State};
use axum::response::Response;
use axum::routing::post;
use rideshare_transport::rpc::{self, status_from_domain};
use tonic::Status;
use tracing::instrument;
use uuid::Uuid;

use super::proto::{
    GET_PAYMENT_SESSION_PATH, GetPaymentSessionRequest, GetPaymentSessionResponse, PaymentSession,
};
use crate::application::query_handlers;
use crate::state::AppState;

/// Returns the RPC router for the payment service, state applied.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(GET_PAYMENT_SESSION_PATH, post(get_payment_session))
        .with_state(state)
}

#[instrument(skip(state, request))]
async fn get_payment_session(State(state): State<AppState>, request: Request) -> Response {
    rpc::unary(request, move |message: GetPaymentSessionRequest| async move {
        let trip_id = Uuid::parse_str(&message.trip_id).map_err(|_| {
            Status::invalid_argument(format!("trip_id {:?} is not a valid id", message.trip_id))
        })?;
        let view =
            query_handlers::get_session_by_trip_id(trip_id, state.event_repository.as_ref())
                .await
                .map_err(|e| status_from_domain(&e))?;

        Ok(GetPaymentSessionResponse {
            session: Some(PaymentSession::from(&view)),
        })
    })
    .await
}
