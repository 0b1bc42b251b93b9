//! Trip RPCs over a real socket through the multiplexed runtime.

use std::net::SocketAddr;
use std::sync::Arc;

use rideshare_test_support::{FixedClock, InMemoryEventRepository, RecordingPublisher};
use rideshare_transport::error::RpcError;
use rideshare_transport::rpc::RpcTimeouts;
use rideshare_transport::runtime::ServiceRuntime;
use rideshare_trip::routes;
use rideshare_trip::rpc;
use rideshare_trip::rpc::client::TripServiceClient;
use rideshare_trip::rpc::proto::{
    CancelTripRequest, Coordinate, CreateTripRequest, GetTripRequest, PreviewTripRequest,
};
use rideshare_trip::state::AppState;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

struct Running {
    addr: SocketAddr,
    publisher: Arc<RecordingPublisher>,
    repo: Arc<InMemoryEventRepository>,
    shutdown: CancellationToken,
}

async fn start() -> Running {
    let repo = Arc::new(InMemoryEventRepository::new());
    let publisher = Arc::new(RecordingPublisher::new());
    let state = AppState::new(
        Arc::new(FixedClock::at_unix(1_700_000_000)),
        repo.clone(),
        publisher.clone(),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();

    let runtime = ServiceRuntime::new("Trip Service", routes::router(state.clone()))
        .with_rpc(rpc::server::router(state));
    let token = shutdown.clone();
    tokio::spawn(async move { runtime.serve(listener, token).await });

    Running {
        addr,
        publisher,
        repo,
        shutdown,
    }
}

async fn client(addr: SocketAddr) -> TripServiceClient {
    TripServiceClient::connect(&addr.to_string(), RpcTimeouts::default())
        .await
        .unwrap()
}

fn sf() -> (Option<Coordinate>, Option<Coordinate>) {
    (
        Some(Coordinate {
            latitude: 37.77,
            longitude: -122.41,
        }),
        Some(Coordinate {
            latitude: 37.78,
            longitude: -122.42,
        }),
    )
}

fn create_request(user_id: &str) -> CreateTripRequest {
    let (pickup, destination) = sf();
    CreateTripRequest {
        user_id: user_id.into(),
        pickup,
        destination,
        package_slug: "sedan".into(),
    }
}

fn status_code(err: RpcError) -> tonic::Code {
    match err {
        RpcError::Status(status) => status.code(),
        other => panic!("expected status, got {other:?}"),
    }
}

#[tokio::test]
async fn test_create_trip_over_rpc_persists_and_publishes() {
    // Arrange
    let server = start().await;
    let client = client(server.addr).await;

    // Act
    let response = client.create_trip(create_request("u1")).await.unwrap();

    // Assert
    let trip = response.trip.unwrap();
    assert_eq!(trip.user_id, "u1");
    assert_eq!(trip.status, "started");
    assert_eq!(trip.selected_fare.unwrap().package_slug, "sedan");
    assert_eq!(server.repo.stream_count(), 1);
    let published = server.publisher.published_on("trip.created");
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].owner_id(), "u1");
    server.shutdown.cancel();
}

#[tokio::test]
async fn test_create_trip_with_missing_pickup_is_invalid_argument() {
    // Arrange
    let server = start().await;
    let client = client(server.addr).await;
    let mut request = create_request("u1");
    request.pickup = None;

    // Act
    let err = client.create_trip(request).await.unwrap_err();

    // Assert
    assert_eq!(status_code(err), tonic::Code::InvalidArgument);
    assert_eq!(server.repo.stream_count(), 0);
    assert!(server.publisher.published().is_empty());
    server.shutdown.cancel();
}

#[tokio::test]
async fn test_get_and_cancel_trip_over_rpc() {
    // Arrange
    let server = start().await;
    let client = client(server.addr).await;
    let created = client
        .create_trip(create_request("u1"))
        .await
        .unwrap()
        .trip
        .unwrap();

    // Act
    let fetched = client
        .get_trip(GetTripRequest {
            trip_id: created.id.clone(),
        })
        .await
        .unwrap()
        .trip
        .unwrap();
    let cancelled = client
        .cancel_trip(CancelTripRequest {
            trip_id: created.id.clone(),
            reason: "changed plans".into(),
        })
        .await
        .unwrap()
        .trip
        .unwrap();
    let again = client
        .cancel_trip(CancelTripRequest {
            trip_id: created.id,
            reason: String::new(),
        })
        .await
        .unwrap_err();

    // Assert
    assert_eq!(fetched.status, "started");
    assert_eq!(cancelled.status, "cancelled");
    assert_eq!(cancelled.cancel_reason.as_deref(), Some("changed plans"));
    assert_eq!(status_code(again), tonic::Code::AlreadyExists);
    server.shutdown.cancel();
}

#[tokio::test]
async fn test_get_unknown_trip_is_not_found() {
    let server = start().await;
    let client = client(server.addr).await;

    let err = client
        .get_trip(GetTripRequest {
            trip_id: uuid::Uuid::new_v4().to_string(),
        })
        .await
        .unwrap_err();

    assert_eq!(status_code(err), tonic::Code::NotFound);
    server.shutdown.cancel();
}

#[tokio::test]
async fn test_preview_over_rpc_persists_nothing() {
    // Arrange
    let server = start().await;
    let client = client(server.addr).await;
    let (pickup, destination) = sf();

    // Act
    let preview = client
        .preview_trip(PreviewTripRequest {
            user_id: "u1".into(),
            pickup,
            destination,
        })
        .await
        .unwrap();

    // Assert
    assert!(preview.route.unwrap().distance_meters > 0.0);
    assert_eq!(preview.ride_fares.len(), 4);
    assert_eq!(server.repo.stream_count(), 0);
    server.shutdown.cancel();
}
