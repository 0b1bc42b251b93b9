//! Client side of `rideshare.trip.TripService`.

use rideshare_transport::error::RpcError;
use rideshare_transport::rpc::{self, RpcTimeouts};
use tonic::transport::Channel;

use super::proto::{
    CANCEL_TRIP_PATH, CREATE_TRIP_PATH, CancelTripRequest, CancelTripResponse, CreateTripRequest,
    CreateTripResponse, GET_TRIP_PATH, GetTripRequest, GetTripResponse, PREVIEW_TRIP_PATH,
    PreviewTripRequest, PreviewTripResponse,
};

/// A connected trip-service client.
///
/// Callers open one per request and drop it afterwards, so an unavailable
/// trip service fails that request only.
#[derive(Debug, Clone)]
pub struct TripServiceClient {
    channel: Channel,
}

impl TripServiceClient {
    /// Connects to the trip service at `url`.
    ///
    /// # Errors
    ///
    /// Returns `RpcError` if the URL is malformed or the connection fails.
    pub async fn connect(url: &str, timeouts: RpcTimeouts) -> Result<Self, RpcError> {
        Ok(Self {
            channel: rpc::connect(url, timeouts).await?,
        })
    }

    /// Wraps an existing channel.
    #[must_use]
    pub fn from_channel(channel: Channel) -> Self {
        Self { channel }
    }

    /// Calls `CreateTrip`.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Status` with the server's status on failure.
    pub async fn create_trip(
        &self,
        request: CreateTripRequest,
    ) -> Result<CreateTripResponse, RpcError> {
        rpc::call(self.channel.clone(), CREATE_TRIP_PATH, request).await
    }

    /// Calls `PreviewTrip`.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Status` with the server's status on failure.
    pub async fn preview_trip(
        &self,
        request: PreviewTripRequest,
    ) -> Result<PreviewTripResponse, RpcError> {
        rpc::call(self.channel.clone(), PREVIEW_TRIP_PATH, request).await
    }

    /// Calls `GetTrip`.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Status` with the server's status on failure.
    pub async fn get_trip(&self, request: GetTripRequest) -> Result<GetTripResponse, RpcError> {
        rpc::call(self.channel.clone(), GET_TRIP_PATH, request).await
    }

    /// Calls `CancelTrip`.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Status` with the server's status on failure.
    pub async fn cancel_trip(
        &self,
        request: CancelTripRequest,
    ) -> Result<CancelTripResponse, RpcError> {
        rpc::call(self.channel.clone(), CANCEL_TRIP_PATH, request).await
    }
}
