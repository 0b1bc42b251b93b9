//! Client side of `rideshare.driver.DriverService`.

use rideshare_transport::error::RpcError;
use rideshare_transport::rpc::{self, RpcTimeouts};
use tonic::transport::Channel;

use super::proto::{
    REGISTER_DRIVER_PATH, RegisterDriverRequest, RegisterDriverResponse, UNREGISTER_DRIVER_PATH,
    UnregisterDriverRequest, UnregisterDriverResponse,
};

#[derive(Debug, Clone)]
pub struct DriverServiceClient {
    channel: Channel,
}

impl DriverServiceClient {
    /// Connects to the driver service at `url`.
    ///
    /// # Errors
    ///
    /// Returns `RpcError` if the URL is malformed or the connection fails.
    pub async fn connect(url: &str, timeouts: RpcTimeouts) -> Result<Self, RpcError> {
        Ok(Self {
            channel: rpc::connect(url, timeouts).await?,
        })
    }

    /// Calls `RegisterDriver`.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Status` with the server's status on failure.
    pub async fn register_driver(
        &self,
        request: RegisterDriverRequest,
    ) -> Result<RegisterDriverResponse, RpcError> {
        rpc::call(self.channel.clone(), REGISTER_DRIVER_PATH, request).await
    }

    /// Calls `UnregisterDriver`.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Status` with the server's status on failure.
    pub async fn unregister_driver(
        &self,
        request: UnregisterDriverRequest,
    ) -> Result<UnregisterDriverResponse, RpcError> {
        rpc::call(self.channel.clone(), UNREGISTER_DRIVER_PATH, request).await
    }
}
