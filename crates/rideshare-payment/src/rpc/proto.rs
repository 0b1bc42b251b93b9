//! Wire messages of `rideshare.payment.PaymentService`.

use serde::Serialize;

use crate::application::query_handlers::PaymentSessionView;

/// `GetPaymentSession` method path.
pub const GET_PAYMENT_SESSION_PATH: &str = "/rideshare.payment.PaymentService/GetPaymentSession";

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct PaymentSession {
    #[prost(string, tag = "1")]
    pub trip_id: String,
    /// Lowercase status name, e.g. `pending`.
    #[prost(string, tag = "2")]
    pub status: String,
    #[prost(string, tag = "3")]
    pub user_id: String,
    #[prost(string, tag = "4")]
    pub driver_id: String,
    #[prost(string, tag = "5")]
    pub session_id: String,
    #[prost(int64, tag = "6")]
    pub amount_in_cents: i64,
    #[prost(string, tag = "7")]
    pub currency: String,
    #[prost(bool, tag = "8")]
    pub mocked: bool,
    #[prost(string, optional, tag = "9")]
    pub failure_reason: Option<String>,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct GetPaymentSessionRequest {
    #[prost(string, tag = "1")]
    pub trip_id: String,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct GetPaymentSessionResponse {
    #[prost(message, optional, tag = "1")]
    pub session: Option<PaymentSession>,
}

impl From<&PaymentSessionView> for PaymentSession {
    fn from(view: &PaymentSessionView) -> Self {
        Self {
            trip_id: view.trip_id.to_string(),
            status: view.status.as_str().to_owned(),
            user_id: view.user_id.clone(),
            driver_id: view.driver_id.clone(),
            session_id: view.session_id.clone().unwrap_or_default(),
            amount_in_cents: view.amount_in_cents,
            currency: view.currency.clone(),
            mocked: view.mocked,
            failure_reason: view.failure_reason.clone(),
        }
    }
}
