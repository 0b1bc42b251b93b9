//! Client side of `rideshare.payment.PaymentService`.

use rideshare_transport::error::RpcError;
use rideshare_transport::rpc::{self, RpcTimeouts};
use tonic::transport::Channel;

use super::proto::{GET_PAYMENT_SESSION_PATH, GetPaymentSessionRequest, GetPaymentSessionResponse};

/// A connected payment-service client.
#[derive(Debug, Clone)]
pub struct PaymentServiceClient {
    channel: Channel,
}

impl PaymentServiceClient {
    /// Connects to the payment service at `url`.
    ///
    /// # Errors
    ///
    /// Returns `RpcError` if the URL is malformed or the connection fails.
    pub async fn connect(url: &str, timeouts: RpcTimeouts) -> Result<Self, RpcError> {
        Ok(Self {
            channel: rpc::connect(url, timeouts).await?,
        })
    }

    /// Calls `GetPaymentSession`.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Status` with the server's status on failure.
    pub async fn get_payment_session(
        &self,
        request: GetPaymentSessionRequest,
    ) -> Result<GetPaymentSessionResponse, RpcError> {
        rpc::call(self.channel.clone(), GET_PAYMENT_SESSION_PATH, request).await
    }
}
